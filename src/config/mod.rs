//! Configuration loading for mdsandbox.
//!
//! Configuration lives in an optional `mdsandbox.toml` next to the
//! documents being processed (or wherever `--config` points). Every field
//! has a default, and `[templates.*]` tables merge over the built-in
//! custom templates instead of replacing them:
//!
//! ```toml
//! mode = "button"
//! base-url = "https://codesandbox.io"
//!
//! [templates.docs-demo]
//! extends = "new"
//! entry = "src/Demo.js"
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::core::{Result, SandboxError};
use crate::pipeline::OutputMode;
use crate::template::OverrideTable;

/// Default registry and site base URL.
pub const DEFAULT_BASE_URL: &str = "https://codesandbox.io";

/// The file name probed in the working directory when `--config` is not
/// given.
pub const CONFIG_FILE_NAME: &str = "mdsandbox.toml";

/// Effective configuration after defaults and file merging.
#[derive(Debug, Clone)]
pub struct Config {
    /// Output mode applied to every processed document
    pub mode: OutputMode,
    /// Base URL for the registry API, sandbox links, and embeds
    pub base_url: String,
    /// Custom template table (built-ins plus file entries)
    pub templates: OverrideTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            templates: OverrideTable::builtin(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    mode: Option<OutputMode>,
    base_url: Option<String>,
    templates: Option<OverrideTable>,
}

impl Config {
    /// Parse configuration TOML, merging over the defaults.
    pub fn parse(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| SandboxError::Config {
            message: format!("invalid configuration: {e}"),
        })?;

        let mut config = Self::default();
        if let Some(mode) = file.mode {
            config.mode = mode;
        }
        if let Some(base_url) = file.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(templates) = file.templates {
            config.templates.merge(templates);
        }
        Ok(config)
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SandboxError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::parse(&content)
    }

    /// Load from an explicit path, else probe the working directory, else
    /// fall back to defaults.
    ///
    /// A missing explicit path is an error; a missing probed file is not.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let probe = Path::new(CONFIG_FILE_NAME);
                if probe.exists() {
                    Self::load(probe)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
