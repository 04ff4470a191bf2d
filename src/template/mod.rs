//! Template data model and the resolution primitives built on it.
//!
//! A *template* is a named base sandbox fetched from the registry: a flat
//! graph of directory and file nodes plus top-level metadata (entry path,
//! title). This module owns the wire shapes ([`RawTemplate`] and its nodes)
//! and the canonical resolved form ([`ResolvedTemplate`]), and hosts the
//! three pure stages that turn one into the other:
//!
//! - [`path`] - reconstructs slash-joined paths from the flat node graph
//! - [`normalize`] - converts a raw template into a path -> content mapping
//! - [`overrides`] - layers locally-defined custom templates on top of a
//!   resolved base
//!
//! The registry serves nodes with `shortid` identifiers and a
//! `directory_shortid` parent reference; `None` marks a root-level node.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub mod normalize;
pub mod overrides;
pub mod path;

pub use normalize::normalize;
pub use overrides::{OverrideTable, TemplateOverride};
pub use path::NodeGraph;

/// A directory node in a raw template's flat graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Unique identifier within the template
    pub shortid: String,
    /// Parent directory identifier, `None` for root-level directories
    #[serde(default)]
    pub directory_shortid: Option<String>,
    /// Directory name, one path segment
    pub title: String,
}

/// A file node in a raw template's flat graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleNode {
    /// Unique identifier within the template
    pub shortid: String,
    /// Parent directory identifier, `None` for root-level files
    #[serde(default)]
    pub directory_shortid: Option<String>,
    /// File name, one path segment
    pub title: String,
    /// File content; the registry serves `null` for binary modules
    #[serde(default)]
    pub code: Option<String>,
}

/// A template as served by the registry, before path reconstruction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTemplate {
    /// Sandbox title
    #[serde(default)]
    pub title: Option<String>,
    /// Entry file path, e.g. `/index.js`
    #[serde(default)]
    pub entry: Option<String>,
    /// Flat list of directory nodes
    #[serde(default)]
    pub directories: Vec<DirectoryNode>,
    /// Flat list of file nodes
    #[serde(default)]
    pub modules: Vec<ModuleNode>,
}

/// The content of a single file in a resolved template or outgoing bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// Raw file content
    pub content: String,
}

impl FileContent {
    /// Convenience constructor.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Mapping from fully-qualified slash-joined path to file content.
pub type TemplateFiles = HashMap<String, FileContent>;

/// A template in canonical form: full paths, entry file, title.
///
/// The resolution cache owns resolved templates and hands out `Arc` views;
/// the file set is itself behind an `Arc` so override composition can share
/// it without copying. Resolved templates are immutable once cached.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    /// Path of the entry file consumers open (and replace) by default
    pub entry: String,
    /// Sandbox title, if the registry declared one
    pub title: Option<String>,
    /// Full file set, keyed by slash-joined path
    pub files: Arc<TemplateFiles>,
}
