// src/error.rs
// =============================================================================
// Fatal conditions that stop a validation run before any per-link work.
//
// Everything else (a missing page, a 404 on an external URL) is NOT an
// error in this sense: those become ValidationIssues and the run keeps going.
// Application code still uses anyhow::Result everywhere; these typed errors
// exist so callers can tell "the run could not start" apart from "the
// run crashed" and write a proper fatal summary.
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardianError {
    /// The static build output directory does not exist
    #[error("output directory not found: {} (run the site build first)", .0.display())]
    DistMissing(PathBuf),

    /// The live crawler could not load its starting page
    #[error("landing page unreachable: {url} ({reason})")]
    LandingUnreachable { url: String, reason: String },

    /// A URL given on the command line or in config could not be parsed
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The configuration file exists but could not be used
    #[error("invalid configuration in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}
