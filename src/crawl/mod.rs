// src/crawl/mod.rs
// =============================================================================
// This module handles the live site validation.
//
// Features:
// - Breadth-first crawling starting from a landing page
// - Same-origin restriction (other sites are never crawled)
// - Base-path scoping: pages outside the deployment prefix are reported,
//   not crawled
// - Batched status validation of every page and asset found
// =============================================================================

mod live;
mod queue;

pub use live::run_live;
