// src/prompt.rs
// =============================================================================
// Picking what the live validator should crawl.
//
// The live validator asks two questions, each with a default:
//
//   1) Root deployment          https://me.dev/
//   2) Subdirectory deployment  https://me.dev/docs/
//   3) Local preview            http://localhost:4321/docs/
//   Deployment mode [1]:
//   Landing page URL [https://me.dev/]:
//
// Anything that is not 1, 2 or 3 means option 1. With --mode/--url on the
// command line, or when stdin is not a terminal (CI), nothing is asked.
// =============================================================================

use crate::checker::BasePath;
use crate::config::Config;
use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Site served from the origin root; base path "/"
    Root,
    /// Site served under the configured base path
    Subdirectory,
    /// `preview` server on localhost, with the configured base path
    LocalPreview,
}

impl DeploymentMode {
    pub const ALL: [DeploymentMode; 3] = [
        DeploymentMode::Root,
        DeploymentMode::Subdirectory,
        DeploymentMode::LocalPreview,
    ];

    /// "1", "2" or "3"; anything else is None
    pub fn parse_choice(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(DeploymentMode::Root),
            "2" => Some(DeploymentMode::Subdirectory),
            "3" => Some(DeploymentMode::LocalPreview),
            _ => None,
        }
    }

    /// Like parse_choice, falling back to option 1
    pub fn from_choice(input: &str) -> Self {
        Self::parse_choice(input).unwrap_or(DeploymentMode::Root)
    }

    pub fn label(self) -> &'static str {
        match self {
            DeploymentMode::Root => "Root deployment",
            DeploymentMode::Subdirectory => "Subdirectory deployment",
            DeploymentMode::LocalPreview => "Local preview",
        }
    }

    pub fn base(self, config: &Config) -> BasePath {
        match self {
            DeploymentMode::Root => BasePath::root(),
            DeploymentMode::Subdirectory | DeploymentMode::LocalPreview => config.base(),
        }
    }

    pub fn default_url(self, config: &Config) -> String {
        let site = config.site_url.as_deref().unwrap_or(&config.local_preview_url);
        match self {
            DeploymentMode::Root | DeploymentMode::Subdirectory => with_base(site, &self.base(config)),
            DeploymentMode::LocalPreview => with_base(&config.local_preview_url, &self.base(config)),
        }
    }
}

/// What the live validator will crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveTarget {
    pub mode: DeploymentMode,
    pub url: String,
    pub base: BasePath,
}

impl LiveTarget {
    fn new(config: &Config, mode: DeploymentMode, url: Option<String>) -> Self {
        Self {
            mode,
            url: url.unwrap_or_else(|| mode.default_url(config)),
            base: mode.base(config),
        }
    }
}

// Builds the target from flags and defaults, never asking
//
// Parameters:
//   mode: --mode value (invalid or missing means option 1)
//   url: --url value (missing means the mode's default URL)
pub fn target_from_flags(config: &Config, mode: Option<&str>, url: Option<&str>) -> LiveTarget {
    let mode = mode.map(DeploymentMode::from_choice).unwrap_or(DeploymentMode::Root);
    LiveTarget::new(config, mode, url.map(str::to_string))
}

// Asks for the deployment mode and landing page when needed
//
// Only prompts when stdin is a terminal, prompting is allowed, and the
// flags leave something open.
pub async fn choose_target(
    config: &Config,
    mode: Option<&str>,
    url: Option<&str>,
    allow_prompt: bool,
) -> Result<LiveTarget> {
    let complete = mode.is_some() && url.is_some();
    if complete || !allow_prompt || !std::io::stdin().is_terminal() {
        return Ok(target_from_flags(config, mode, url));
    }

    let config = config.clone();
    let mode = mode.map(str::to_string);
    let url = url.map(str::to_string);

    // dialoguer blocks on stdin, so keep it off the async runtime
    let target = tokio::task::spawn_blocking(move || -> Result<LiveTarget> {
        let theme = ColorfulTheme::default();

        let mode = match mode {
            Some(choice) => DeploymentMode::from_choice(&choice),
            None => {
                for (i, m) in DeploymentMode::ALL.iter().enumerate() {
                    println!("  {}) {:<26} {}", i + 1, m.label(), m.default_url(&config));
                }
                let choice: String = Input::with_theme(&theme)
                    .with_prompt("Deployment mode")
                    .default("1".to_string())
                    .interact_text()?;
                DeploymentMode::parse_choice(&choice).unwrap_or_else(|| {
                    println!("  Invalid selection '{}', using option 1", choice.trim());
                    DeploymentMode::Root
                })
            }
        };

        let url = match url {
            Some(url) => url,
            None => Input::with_theme(&theme)
                .with_prompt("Landing page URL")
                .default(mode.default_url(&config))
                .interact_text()?,
        };

        Ok(LiveTarget::new(&config, mode, Some(url)))
    })
    .await??;

    Ok(target)
}

fn with_base(origin: &str, base: &BasePath) -> String {
    format!("{}{}", origin.trim_end_matches('/'), base.join(""))
}
