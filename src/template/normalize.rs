//! Conversion of raw registry templates into canonical resolved form.

use std::sync::Arc;

use tracing::debug;

use crate::core::{Result, SandboxError};
use crate::template::{NodeGraph, RawTemplate, ResolvedTemplate, TemplateFiles};

/// Normalize a fetched template into a path -> content mapping plus
/// top-level metadata.
///
/// Pure over its inputs: every file node gets its path reconstructed via
/// [`NodeGraph::resolve_path`]; unresolvable files are dropped with a debug
/// log, a cyclic graph aborts the whole template. Two nodes resolving to
/// the same path is undefined behavior per the registry contract; the later
/// module wins.
///
/// The registry guarantees an entry path for well-formed sandboxes, so a
/// missing `entry` is reported as an invalid template rather than defaulted.
pub fn normalize(id: &str, raw: &RawTemplate) -> Result<ResolvedTemplate> {
    let entry = raw
        .entry
        .clone()
        .ok_or_else(|| SandboxError::TemplateInvalid {
            id: id.to_string(),
            reason: "missing entry path".to_string(),
        })?;

    let graph = NodeGraph::from_template(id, raw);
    let mut files = TemplateFiles::with_capacity(raw.modules.len());

    for module in &raw.modules {
        match graph.resolve_path(&module.shortid)? {
            Some(path) => {
                files.insert(
                    path,
                    crate::template::FileContent {
                        content: module.code.clone().unwrap_or_default(),
                    },
                );
            }
            None => {
                debug!(
                    template = id,
                    shortid = %module.shortid,
                    name = %module.title,
                    "dropping file with unresolvable path"
                );
            }
        }
    }

    Ok(ResolvedTemplate {
        entry,
        title: raw.title.clone(),
        files: Arc::new(files),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{DirectoryNode, ModuleNode};

    fn raw_react_like() -> RawTemplate {
        RawTemplate {
            title: Some("React".to_string()),
            entry: Some("/index.js".to_string()),
            directories: vec![DirectoryNode {
                shortid: "d-src".to_string(),
                directory_shortid: None,
                title: "src".to_string(),
            }],
            modules: vec![
                ModuleNode {
                    shortid: "m-index".to_string(),
                    directory_shortid: None,
                    title: "index.js".to_string(),
                    code: Some("render()".to_string()),
                },
                ModuleNode {
                    shortid: "m-app".to_string(),
                    directory_shortid: Some("d-src".to_string()),
                    title: "App.js".to_string(),
                    code: Some("export default App".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_normalize_builds_path_mapping() {
        let resolved = normalize("react", &raw_react_like()).unwrap();

        assert_eq!(resolved.entry, "/index.js");
        assert_eq!(resolved.title.as_deref(), Some("React"));
        assert_eq!(resolved.files.len(), 2);
        assert_eq!(resolved.files["index.js"].content, "render()");
        assert_eq!(resolved.files["src/App.js"].content, "export default App");
    }

    #[test]
    fn test_unresolvable_file_is_dropped() {
        let mut raw = raw_react_like();
        raw.modules.push(ModuleNode {
            shortid: "m-orphan".to_string(),
            directory_shortid: Some("d-missing".to_string()),
            title: "orphan.js".to_string(),
            code: Some("".to_string()),
        });

        let resolved = normalize("react", &raw).unwrap();
        assert_eq!(resolved.files.len(), 2);
        assert!(!resolved.files.keys().any(|p| p.contains("orphan")));
    }

    #[test]
    fn test_duplicate_path_later_module_wins() {
        let mut raw = raw_react_like();
        raw.modules.push(ModuleNode {
            shortid: "m-index-dup".to_string(),
            directory_shortid: None,
            title: "index.js".to_string(),
            code: Some("overwritten()".to_string()),
        });

        let resolved = normalize("react", &raw).unwrap();
        assert_eq!(resolved.files["index.js"].content, "overwritten()");
    }

    #[test]
    fn test_null_code_becomes_empty_content() {
        let mut raw = raw_react_like();
        raw.modules[0].code = None;

        let resolved = normalize("react", &raw).unwrap();
        assert_eq!(resolved.files["index.js"].content, "");
    }

    #[test]
    fn test_missing_entry_is_invalid() {
        let mut raw = raw_react_like();
        raw.entry = None;

        let err = normalize("react", &raw).unwrap_err();
        assert!(matches!(err, SandboxError::TemplateInvalid { id, .. } if id == "react"));
    }

    #[test]
    fn test_cyclic_graph_fails_normalization() {
        let mut raw = raw_react_like();
        raw.directories = vec![
            DirectoryNode {
                shortid: "d-a".to_string(),
                directory_shortid: Some("d-b".to_string()),
                title: "a".to_string(),
            },
            DirectoryNode {
                shortid: "d-b".to_string(),
                directory_shortid: Some("d-a".to_string()),
                title: "b".to_string(),
            },
        ];
        raw.modules[1].directory_shortid = Some("d-a".to_string());

        let err = normalize("react", &raw).unwrap_err();
        assert!(matches!(err, SandboxError::CyclicGraph { .. }));
    }
}
