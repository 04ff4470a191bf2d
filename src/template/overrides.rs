//! Locally-defined custom templates layered on top of fetched bases.
//!
//! A custom template is a named patch: it optionally re-targets which base
//! template it extends and overrides top-level fields of the resolved base.
//! The table ships with two built-ins mirroring the upstream defaults
//! (`react` and `react-component`, both extending the `new` sandbox) and
//! can be extended or overridden from `mdsandbox.toml`:
//!
//! ```toml
//! [templates.my-docs]
//! extends = "vanilla"
//! entry = "src/demo.js"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::core::{Result, SandboxError};
use crate::template::{ResolvedTemplate, TemplateFiles};

/// A single custom template: an optional base reference plus field patches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateOverride {
    /// Base template this override extends: a registry sandbox id or
    /// another custom template name. `None` means the override's own name
    /// is fetched as the base.
    #[serde(default)]
    pub extends: Option<String>,
    /// Replacement entry path
    #[serde(default)]
    pub entry: Option<String>,
    /// Replacement title
    #[serde(default)]
    pub title: Option<String>,
    /// Replacement file set; rarely used, the base's files are shared
    /// by reference when absent
    #[serde(default)]
    pub files: Option<TemplateFiles>,
}

impl TemplateOverride {
    /// Shallow-merge this override onto a resolved base template.
    ///
    /// Non-destructive: the base is read, never mutated, and its file set
    /// is inherited via `Arc::clone` unless the override carries its own.
    pub fn compose(&self, base: &ResolvedTemplate) -> ResolvedTemplate {
        ResolvedTemplate {
            entry: self.entry.clone().unwrap_or_else(|| base.entry.clone()),
            title: self.title.clone().or_else(|| base.title.clone()),
            files: match &self.files {
                Some(files) => Arc::new(files.clone()),
                None => Arc::clone(&base.files),
            },
        }
    }
}

/// Named table of custom templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideTable {
    entries: HashMap<String, TemplateOverride>,
}

impl Default for OverrideTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl OverrideTable {
    /// The built-in custom templates shipped with mdsandbox.
    #[must_use]
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "react".to_string(),
            TemplateOverride {
                extends: Some("new".to_string()),
                ..Default::default()
            },
        );
        entries.insert(
            "react-component".to_string(),
            TemplateOverride {
                extends: Some("new".to_string()),
                entry: Some("src/App.js".to_string()),
                ..Default::default()
            },
        );
        Self { entries }
    }

    /// An empty table, useful for tests and fully custom setups.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Look up a custom template by name.
    pub fn get(&self, name: &str) -> Option<&TemplateOverride> {
        self.entries.get(name)
    }

    /// Whether `name` is a custom template.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, name: impl Into<String>, spec: TemplateOverride) {
        self.entries.insert(name.into(), spec);
    }

    /// Merge `other` over this table; entries in `other` win.
    ///
    /// Configuration files merge over the built-ins this way.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Validate that `name`'s extends chain is acyclic.
    ///
    /// The chain is followed only while it targets other custom templates;
    /// the first name that is not in the table is the fetchable base and
    /// ends the walk. Revisiting any name fails with
    /// [`SandboxError::OverrideCycle`].
    pub fn check_chain(&self, name: &str) -> Result<()> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = name;

        while let Some(spec) = self.entries.get(current) {
            if !visited.insert(current) {
                return Err(SandboxError::OverrideCycle {
                    name: name.to_string(),
                });
            }
            match spec.extends.as_deref() {
                // A null extends terminates the chain at the override's own
                // name, which is fetched directly.
                None => break,
                Some(next) if next == current => {
                    return Err(SandboxError::OverrideCycle {
                        name: name.to_string(),
                    });
                }
                Some(next) => current = next,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::FileContent;

    fn base() -> ResolvedTemplate {
        let mut files = TemplateFiles::new();
        files.insert("/index.js".to_string(), FileContent::new("base code"));
        ResolvedTemplate {
            entry: "/index.js".to_string(),
            title: Some("Base".to_string()),
            files: Arc::new(files),
        }
    }

    #[test]
    fn test_builtin_table() {
        let table = OverrideTable::builtin();
        assert_eq!(table.get("react").unwrap().extends.as_deref(), Some("new"));
        let component = table.get("react-component").unwrap();
        assert_eq!(component.extends.as_deref(), Some("new"));
        assert_eq!(component.entry.as_deref(), Some("src/App.js"));
    }

    #[test]
    fn test_compose_overrides_entry_only() {
        let base = base();
        let spec = TemplateOverride {
            entry: Some("src/App.js".to_string()),
            ..Default::default()
        };

        let composed = spec.compose(&base);
        assert_eq!(composed.entry, "src/App.js");
        assert_eq!(composed.title.as_deref(), Some("Base"));
        // Base untouched, files shared by reference.
        assert_eq!(base.entry, "/index.js");
        assert!(Arc::ptr_eq(&base.files, &composed.files));
    }

    #[test]
    fn test_compose_with_own_files() {
        let base = base();
        let mut files = TemplateFiles::new();
        files.insert("/main.js".to_string(), FileContent::new("patched"));
        let spec = TemplateOverride {
            files: Some(files),
            ..Default::default()
        };

        let composed = spec.compose(&base);
        assert!(!Arc::ptr_eq(&base.files, &composed.files));
        assert_eq!(composed.files["/main.js"].content, "patched");
        assert_eq!(base.files["/index.js"].content, "base code");
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut table = OverrideTable::builtin();
        let mut custom = OverrideTable::empty();
        custom.insert(
            "react",
            TemplateOverride {
                extends: Some("custom-base".to_string()),
                ..Default::default()
            },
        );
        table.merge(custom);

        assert_eq!(
            table.get("react").unwrap().extends.as_deref(),
            Some("custom-base")
        );
        // Untouched builtin survives the merge.
        assert!(table.contains("react-component"));
    }

    #[test]
    fn test_chain_through_other_overrides() {
        let mut table = OverrideTable::empty();
        table.insert(
            "a",
            TemplateOverride {
                extends: Some("b".to_string()),
                ..Default::default()
            },
        );
        table.insert(
            "b",
            TemplateOverride {
                extends: Some("new".to_string()),
                ..Default::default()
            },
        );
        assert!(table.check_chain("a").is_ok());
    }

    #[test]
    fn test_chain_cycle_detected() {
        let mut table = OverrideTable::empty();
        table.insert(
            "a",
            TemplateOverride {
                extends: Some("b".to_string()),
                ..Default::default()
            },
        );
        table.insert(
            "b",
            TemplateOverride {
                extends: Some("a".to_string()),
                ..Default::default()
            },
        );
        let err = table.check_chain("a").unwrap_err();
        assert!(matches!(err, SandboxError::OverrideCycle { name } if name == "a"));
    }

    #[test]
    fn test_self_extends_is_a_cycle() {
        let mut table = OverrideTable::empty();
        table.insert(
            "a",
            TemplateOverride {
                extends: Some("a".to_string()),
                ..Default::default()
            },
        );
        assert!(table.check_chain("a").is_err());
    }
}
