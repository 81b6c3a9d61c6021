// src/checker/mod.rs
// =============================================================================
// This module contains the link checking building blocks shared by the
// static and live validators.
//
// Submodules:
// - classify: internal/external, link/asset, base paths
// - html: extracts URL references from HTML pages
// - http: checks URLs over HTTP in bounded batches
// - cache: remembers good external results between runs
// =============================================================================

mod cache;
mod classify;
mod html;
mod http;

pub use cache::ExternalLinkCache;
pub use classify::{extension, BasePath, Classifier, PathScope, RefKind};
pub use html::{extract_references, ExtractOptions, SkipPatterns, UrlReference};
pub use http::{ExternalCheck, HttpChecker};
