// src/dist/mod.rs
// =============================================================================
// Validation of the static build output (dist/).
//
// Submodules:
// - tree: one walk of the output directory, kept in memory
// - resolve: internal reference -> candidate files
// - validate: the static link validator (internal + external)
// - base_paths: base-path consistency warnings
// =============================================================================

mod base_paths;
mod resolve;
mod tree;
mod validate;

pub use base_paths::run_base_paths;
pub use validate::run_static;
