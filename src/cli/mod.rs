//! Command-line interface.
//!
//! ```bash
//! # Annotate (meta mode) and print the document to stdout
//! mdsandbox README.md
//!
//! # Insert edit buttons and rewrite files in place
//! mdsandbox --mode button --write docs/*.md
//!
//! # Replace annotated blocks with embeds, writing to a build directory
//! mdsandbox --mode iframe --out-dir build/ docs/intro.md
//! ```
//!
//! One [`SandboxPipeline`] is shared across all input files, so a template
//! referenced from several documents is fetched once per run. A fragment
//! failure is reported with its file and line but never aborts the rest of
//! the document or the remaining files; the exit code is 1 if anything
//! failed.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::pipeline::{OutputMode, SandboxPipeline};
use crate::registry::HttpRegistry;

/// Publish annotated markdown code blocks as CodeSandbox sandboxes.
#[derive(Parser, Debug)]
#[command(name = "mdsandbox", version, about, long_about = None)]
pub struct Cli {
    /// Markdown files to process
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Output mode: annotate (meta), insert a link (button), or embed (iframe)
    #[arg(short, long, value_enum)]
    mode: Option<OutputMode>,

    /// Configuration file (defaults to ./mdsandbox.toml when present)
    #[arg(short, long, env = "MDSANDBOX_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Base URL for the registry, sandbox links, and embeds
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Rewrite input files in place
    #[arg(short, long)]
    write: bool,

    /// Write rewritten documents into this directory instead
    #[arg(long, value_name = "DIR", conflicts_with = "write")]
    out_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Run the full command.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        let mut config = Config::load_or_default(self.config.as_deref())?;
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }

        if self.files.len() > 1 && !self.write && self.out_dir.is_none() {
            bail!("use --write or --out-dir when processing more than one file");
        }
        if let Some(out_dir) = &self.out_dir {
            std::fs::create_dir_all(out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
        }

        let registry = Arc::new(HttpRegistry::new(&config.base_url));
        let pipeline = SandboxPipeline::new(
            registry,
            config.templates.clone(),
            &config.base_url,
            config.mode,
        );

        let mut any_failed = false;
        for file in &self.files {
            let source = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;

            let outcome = pipeline.process_document(&source).await;

            for fragment in &outcome.published {
                info!(
                    "{}:{} -> {}",
                    file.display(),
                    fragment.line,
                    fragment.artifact.url
                );
            }
            for failure in &outcome.failures {
                any_failed = true;
                eprintln!("{}:{}: {:#}", file.display(), failure.line, failure.error);
            }

            if self.write {
                std::fs::write(file, &outcome.rendered)
                    .with_context(|| format!("failed to write {}", file.display()))?;
            } else if let Some(out_dir) = &self.out_dir {
                let name = file
                    .file_name()
                    .with_context(|| format!("{} has no file name", file.display()))?;
                let target = out_dir.join(name);
                std::fs::write(&target, &outcome.rendered)
                    .with_context(|| format!("failed to write {}", target.display()))?;
            } else {
                print!("{}", outcome.rendered);
            }
        }

        if any_failed {
            bail!("one or more code blocks failed to publish");
        }
        Ok(())
    }

    fn init_logging(&self) {
        let default_level = if self.verbose {
            "mdsandbox=debug"
        } else if self.quiet {
            "mdsandbox=error"
        } else {
            "mdsandbox=info"
        };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::parse_from(["mdsandbox", "README.md"]);
        assert_eq!(cli.files.len(), 1);
        assert_eq!(cli.mode, None);
        assert!(!cli.write);
    }

    #[test]
    fn test_parse_mode_values() {
        for (flag, expected) in [
            ("meta", OutputMode::Meta),
            ("button", OutputMode::Button),
            ("iframe", OutputMode::Iframe),
        ] {
            let cli = Cli::parse_from(["mdsandbox", "--mode", flag, "a.md"]);
            assert_eq!(cli.mode, Some(expected));
        }
    }

    #[test]
    fn test_write_conflicts_with_out_dir() {
        let result = Cli::try_parse_from(["mdsandbox", "--write", "--out-dir", "out", "a.md"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_files_required() {
        assert!(Cli::try_parse_from(["mdsandbox"]).is_err());
    }
}
