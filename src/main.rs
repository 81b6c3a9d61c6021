// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Load site-guardian.toml (if any) and apply command-line overrides
// 3. Dispatch to the validator for the chosen command
// 4. Exit with proper code (0 = clean, 1 = issues found, 2 = internal error)
// =============================================================================

mod aggregate; // src/aggregate.rs - `all`: every validator in sequence
mod checker; // src/checker/ - classification, extraction, HTTP checks, cache
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - site-guardian.toml
mod crawl; // src/crawl/ - live site crawling
mod dist; // src/dist/ - static build validation
mod error; // src/error.rs - fatal conditions
mod logger; // src/logger.rs - run logs and tracing setup
mod prompt; // src/prompt.rs - deployment mode / landing page selection
mod report; // src/report/ - issues, summaries, exit codes

#[cfg(test)]
mod testutil;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use logger::RunLog;
use report::{RunOutcome, Tool};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logger::init_tracing();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            2
        }
    };

    std::process::exit(exit_code);
}

// Application logic
//
// Returns:
//   Ok(0) = no issues
//   Ok(1) = issues found (or the run could not start)
//   Err = internal error, exit code 2
async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = cli.root.clone();

    let mut config = Config::load(&root, cli.config.as_deref())?;
    if let Some(base) = &cli.base_path {
        config.base_path = base.clone();
    }

    let command = cli.command.unwrap_or(Commands::Static {
        dist: None,
        offline: false,
        json: false,
    });

    match command {
        Commands::Static { dist, offline, json } => {
            if let Some(dist) = dist {
                config.dist_dir = dist;
            }
            let mut log = RunLog::create(&config.logs(&root), Tool::StaticLinks)?.quiet(json);
            log.info("Static link validation");
            let outcome = dist::run_static(&config, &root, offline, &mut log).await?;
            finish(outcome, json)
        }
        Commands::BasePaths { dist, json } => {
            if let Some(dist) = dist {
                config.dist_dir = dist;
            }
            let mut log = RunLog::create(&config.logs(&root), Tool::BasePaths)?.quiet(json);
            log.info(format!("Base path validation (base path {})", config.base()));
            let outcome = dist::run_base_paths(&config, &root, &mut log)?;
            finish(outcome, json)
        }
        Commands::Live { mode, url, no_prompt, json } => {
            let target = prompt::choose_target(&config, mode.as_deref(), url.as_deref(), !no_prompt).await?;
            let mut log = RunLog::create(&config.logs(&root), Tool::LiveSite)?.quiet(json);
            log.info("Live site validation");
            let outcome = crawl::run_live(&config, &root, &target, &mut log).await?;
            finish(outcome, json)
        }
        Commands::All { offline, skip_live, mode, url, no_prompt, json } => {
            let target = if skip_live {
                None
            } else {
                Some(prompt::choose_target(&config, mode.as_deref(), url.as_deref(), !no_prompt).await?)
            };
            let mut log = RunLog::create(&config.logs(&root), Tool::All)?.quiet(json);
            log.info("Running all validators");
            let summary = aggregate::run_all(&config, &root, offline, target.as_ref(), &mut log).await?;
            if json {
                print!("{}", summary.to_json()?);
            }
            Ok(summary.exit_code())
        }
    }
}

// Prints the summary JSON when asked and hands back the exit code
fn finish(outcome: RunOutcome, json: bool) -> Result<i32> {
    if json {
        print!("{}", outcome.summary.to_json()?);
    }
    Ok(outcome.exit_code)
}
