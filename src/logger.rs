// src/logger.rs
// =============================================================================
// The human-readable run log.
//
// Every validator run gets one RunLog. Each event becomes one line:
//
//   [2026-10-18 09:12:03] INFO    Scanning 42 HTML file(s) in dist
//
// On the console the level is colored (owo-colors, only when the terminal
// supports it). The same lines are written without color codes to
// logs/<tool>-<timestamp>.log so CI artifacts stay readable.
//
// Debug-level chatter (individual requests, cache hits) goes through
// `tracing` instead and is controlled with RUST_LOG.
// =============================================================================

use crate::report::Tool;
use anyhow::{Context, Result};
use chrono::Local;
use owo_colors::{OwoColorize, Stream::Stdout};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Success,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Success => "SUCCESS",
        }
    }
}

pub struct RunLog {
    file: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    echo: bool,
}

impl RunLog {
    // Opens a fresh log file for one run of `tool`
    //
    // Parameters:
    //   logs_dir: directory for log files (created if missing)
    //   tool: which validator is running, used in the file name
    pub fn create(logs_dir: &Path, tool: Tool) -> Result<Self> {
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("creating log directory {}", logs_dir.display()))?;

        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let path = logs_dir.join(format!("{}-{}.log", tool.slug(), stamp));
        let file = File::create(&path)
            .with_context(|| format!("creating log file {}", path.display()))?;

        Ok(Self {
            file: Some(BufWriter::new(file)),
            path: Some(path),
            echo: true,
        })
    }

    /// A log that only prints to the console
    #[cfg(test)]
    pub fn console() -> Self {
        Self {
            file: None,
            path: None,
            echo: true,
        }
    }

    /// Keeps writing the log file but stops printing to the console
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.echo = !quiet;
        self
    }

    pub fn is_quiet(&self) -> bool {
        !self.echo
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.write(Level::Info, message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.write(Level::Warn, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.write(Level::Error, message.as_ref());
    }

    pub fn success(&mut self, message: impl AsRef<str>) {
        self.write(Level::Success, message.as_ref());
    }

    /// Writes one line to the console and the log file
    pub fn write(&mut self, level: Level, message: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        if self.echo {
            let label = format!("{:<7}", level.label());
            let label = match level {
                Level::Info => label.if_supports_color(Stdout, |t| t.cyan()).to_string(),
                Level::Warn => label.if_supports_color(Stdout, |t| t.yellow()).to_string(),
                Level::Error => label.if_supports_color(Stdout, |t| t.red()).to_string(),
                Level::Success => label.if_supports_color(Stdout, |t| t.green()).to_string(),
            };
            let stamp = format!("[{stamp}]");
            println!("{} {} {}", stamp.if_supports_color(Stdout, |t| t.dimmed()), label, message);
        }

        if let Some(file) = self.file.as_mut() {
            // A failing log write must not take the validation down with it
            if let Err(e) = writeln!(file, "{}", plain_line(&stamp, level, message)) {
                tracing::warn!(error = %e, "failed to write log line");
                self.file = None;
            }
        }
    }

    /// Flushes buffered lines to disk
    pub fn finish(&mut self) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.flush() {
                tracing::warn!(error = %e, "failed to flush log file");
            }
        }
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        self.finish();
    }
}

fn plain_line(stamp: &str, level: Level, message: &str) -> String {
    format!("[{}] {:<7} {}", stamp, level.label(), message)
}

// Sets up `tracing` for debug diagnostics
//
// RUST_LOG=site_guardian=debug shows every request and cache decision.
// Without RUST_LOG only warnings are shown.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // try_init: tests and the aggregate runner may call this more than once
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
