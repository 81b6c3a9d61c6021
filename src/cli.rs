// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Layout:
//   site-guardian [--config FILE] [--root DIR] [--base-path PATH] <command>
//
// Commands:
//   static      validate dist/ (internal + external references)
//   base-paths  warn about root-relative paths missing the base path
//   live        crawl a running deployment
//   all         run every validator and write an aggregate summary
//
// Without a command, `static` runs.
// =============================================================================

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "site-guardian",
    version,
    about = "Validate the links of a static site build and its live deployment",
    long_about = "site-guardian checks every link and asset reference in a built site (dist/), \
                  warns about paths that ignore the deployment base path, and crawls a live \
                  deployment to confirm every page and asset loads. Exit code 0 means clean, \
                  1 means issues were found, 2 means the tool itself failed."
)]
pub struct Cli {
    /// Configuration file (default: site-guardian.toml in the project root, if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project root; dist/, the cache and logs/ are relative to it
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Override the deployment base path (e.g. /docs)
    #[arg(long, global = true)]
    pub base_path: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate internal and external references in the built site
    ///
    /// Example: site-guardian static --dist build
    Static {
        /// Build output directory (overrides dist_dir)
        #[arg(long)]
        dist: Option<PathBuf>,

        /// Skip external URL checks
        #[arg(long)]
        offline: bool,

        /// Print the summary JSON to stdout when done
        #[arg(long)]
        json: bool,
    },

    /// Warn about root-relative paths that lack the base path
    ///
    /// Example: site-guardian --base-path /docs base-paths
    BasePaths {
        /// Build output directory (overrides dist_dir)
        #[arg(long)]
        dist: Option<PathBuf>,

        /// Print the summary JSON to stdout when done
        #[arg(long)]
        json: bool,
    },

    /// Crawl a live deployment and check every page and asset
    ///
    /// Example: site-guardian live --mode 2 --url https://me.dev/docs/
    Live {
        /// Deployment mode: 1 = root, 2 = subdirectory, 3 = local preview
        #[arg(long)]
        mode: Option<String>,

        /// Landing page URL (default depends on the mode)
        #[arg(long)]
        url: Option<String>,

        /// Never prompt, even on a terminal
        #[arg(long)]
        no_prompt: bool,

        /// Print the summary JSON to stdout when done
        #[arg(long)]
        json: bool,
    },

    /// Run static, base-paths and live validation in sequence
    All {
        /// Skip external URL checks in the static validator
        #[arg(long)]
        offline: bool,

        /// Do not crawl the live deployment
        #[arg(long)]
        skip_live: bool,

        /// Deployment mode for the live validator
        #[arg(long)]
        mode: Option<String>,

        /// Landing page URL for the live validator
        #[arg(long)]
        url: Option<String>,

        /// Never prompt, even on a terminal
        #[arg(long)]
        no_prompt: bool,

        /// Print the aggregate summary JSON to stdout when done
        #[arg(long)]
        json: bool,
    },
}
