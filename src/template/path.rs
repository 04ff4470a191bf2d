//! Path reconstruction over a template's flat node graph.
//!
//! The registry serves directories and files as flat lists where each node
//! references its parent by `shortid`. [`NodeGraph`] indexes the union of
//! both lists and walks parent references to rebuild full slash-joined
//! paths in root-to-leaf order.
//!
//! A node missing from the graph (either the requested id or any ancestor)
//! is not an error: the walk yields `None` and the caller drops that file
//! from the output set. A parent cycle, on the other hand, is a malformed
//! template and fails the whole resolution with
//! [`SandboxError::CyclicGraph`].

use std::collections::{HashMap, HashSet};

use crate::core::{Result, SandboxError};
use crate::template::RawTemplate;

struct GraphNode<'a> {
    name: &'a str,
    parent: Option<&'a str>,
}

/// Index over a raw template's directory and file nodes.
pub struct NodeGraph<'a> {
    template: &'a str,
    nodes: HashMap<&'a str, GraphNode<'a>>,
}

impl<'a> NodeGraph<'a> {
    /// Build the id -> node index from a raw template.
    ///
    /// Identifiers are unique within a template; if the registry ever
    /// serves a duplicate shortid the later node wins, matching the
    /// later-overwrite-is-authoritative rule for resolved paths.
    pub fn from_template(template_id: &'a str, raw: &'a RawTemplate) -> Self {
        let mut nodes = HashMap::with_capacity(raw.directories.len() + raw.modules.len());

        for dir in &raw.directories {
            nodes.insert(
                dir.shortid.as_str(),
                GraphNode {
                    name: dir.title.as_str(),
                    parent: dir.directory_shortid.as_deref(),
                },
            );
        }
        for file in &raw.modules {
            nodes.insert(
                file.shortid.as_str(),
                GraphNode {
                    name: file.title.as_str(),
                    parent: file.directory_shortid.as_deref(),
                },
            );
        }

        Self {
            template: template_id,
            nodes,
        }
    }

    /// Reconstruct the full path for `shortid`, root segment first.
    ///
    /// Returns `Ok(None)` when `shortid` or any ancestor on its chain does
    /// not exist in the graph; the corresponding file is unresolvable and
    /// must be skipped rather than failing the template. A revisited id on
    /// the parent chain means the graph is cyclic and aborts the
    /// resolution.
    pub fn resolve_path(&self, shortid: &str) -> Result<Option<String>> {
        let mut segments: Vec<&str> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = shortid;

        loop {
            if !visited.insert(current) {
                return Err(SandboxError::CyclicGraph {
                    template: self.template.to_string(),
                });
            }

            let Some(node) = self.nodes.get(current) else {
                return Ok(None);
            };
            segments.push(node.name);

            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        segments.reverse();
        Ok(Some(segments.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{DirectoryNode, ModuleNode};

    fn template_with(dirs: Vec<(&str, Option<&str>, &str)>, files: Vec<(&str, Option<&str>, &str)>) -> RawTemplate {
        RawTemplate {
            title: None,
            entry: None,
            directories: dirs
                .into_iter()
                .map(|(id, parent, name)| DirectoryNode {
                    shortid: id.to_string(),
                    directory_shortid: parent.map(String::from),
                    title: name.to_string(),
                })
                .collect(),
            modules: files
                .into_iter()
                .map(|(id, parent, name)| ModuleNode {
                    shortid: id.to_string(),
                    directory_shortid: parent.map(String::from),
                    title: name.to_string(),
                    code: Some(String::new()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_nested_path() {
        let raw = template_with(
            vec![("d1", None, "src")],
            vec![("f1", Some("d1"), "App.js")],
        );
        let graph = NodeGraph::from_template("t", &raw);
        assert_eq!(graph.resolve_path("f1").unwrap(), Some("src/App.js".to_string()));
    }

    #[test]
    fn test_root_level_file() {
        let raw = template_with(vec![], vec![("f1", None, "index.js")]);
        let graph = NodeGraph::from_template("t", &raw);
        assert_eq!(graph.resolve_path("f1").unwrap(), Some("index.js".to_string()));
    }

    #[test]
    fn test_missing_node_yields_none() {
        let raw = template_with(vec![], vec![("f1", None, "index.js")]);
        let graph = NodeGraph::from_template("t", &raw);
        assert_eq!(graph.resolve_path("nope").unwrap(), None);
    }

    #[test]
    fn test_missing_ancestor_yields_none() {
        let raw = template_with(vec![], vec![("f1", Some("gone"), "index.js")]);
        let graph = NodeGraph::from_template("t", &raw);
        assert_eq!(graph.resolve_path("f1").unwrap(), None);
    }

    #[test]
    fn test_cycle_is_an_error() {
        let raw = template_with(
            vec![("d1", Some("d2"), "a"), ("d2", Some("d1"), "b")],
            vec![("f1", Some("d1"), "index.js")],
        );
        let graph = NodeGraph::from_template("looped", &raw);
        let err = graph.resolve_path("f1").unwrap_err();
        assert!(matches!(err, SandboxError::CyclicGraph { template } if template == "looped"));
    }

    #[test]
    fn test_deep_chain() {
        let raw = template_with(
            vec![
                ("d1", None, "a"),
                ("d2", Some("d1"), "b"),
                ("d3", Some("d2"), "c"),
            ],
            vec![("f1", Some("d3"), "deep.js")],
        );
        let graph = NodeGraph::from_template("t", &raw);
        assert_eq!(graph.resolve_path("f1").unwrap(), Some("a/b/c/deep.js".to_string()));
    }
}
