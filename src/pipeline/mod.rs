//! End-to-end document processing: resolve, inject, publish, render.
//!
//! [`SandboxPipeline`] is the orchestration core. For each annotated code
//! block it resolves the named template through the cache, injects the
//! block's content at the template's entry path (the fragment always wins,
//! even when the template already defines that file), publishes the bundle,
//! and applies the configured [`OutputMode`] to the document:
//!
//! - `meta` - the sandbox URL is attached to the code block out of band;
//!   the rendered document is unchanged
//! - `button` - an "Edit on CodeSandbox" link paragraph is inserted
//!   immediately after the code block
//! - `iframe` - the code block is replaced in place with an embed viewer
//!
//! Blocks are processed strictly in source order, one at a time. A fatal
//! error (fetch, publish, malformed template) is recorded against that
//! block's source line and processing continues with its siblings.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::Result;
use crate::document::directive::Query;
use crate::document::{Block, Document, SandboxDirective};
use crate::registry::SandboxRegistry;
use crate::resolver::TemplateResolver;
use crate::template::{FileContent, OverrideTable, TemplateFiles};

/// How a published sandbox is reflected in the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Attach the URL as out-of-band metadata; no visible change
    #[default]
    Meta,
    /// Insert a link paragraph after the code block
    Button,
    /// Replace the code block with an embedded viewer
    Iframe,
}

/// One code block's worth of work.
#[derive(Debug, Clone)]
pub struct ArtifactRequest<'a> {
    /// Template name or registry sandbox id from the directive
    pub template: &'a str,
    /// Query overrides from the directive
    pub query: Query,
    /// The code block's content, injected at the entry path
    pub content: &'a str,
    /// Document-level title; wins over the template's own title
    pub document_title: Option<&'a str>,
}

/// A successfully published sandbox.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Remote sandbox id returned by the registry
    pub sandbox_id: String,
    /// Full sandbox URL including the merged query string
    pub url: String,
    /// Effective title (document title, else template title)
    pub title: Option<String>,
    /// The merged query (directive overrides plus defaulted `module`)
    pub query: Query,
}

/// A published fragment with its source position.
#[derive(Debug)]
pub struct PublishedFragment {
    /// 1-based source line of the code block's opening fence
    pub line: usize,
    /// The published artifact
    pub artifact: Artifact,
}

/// A fragment whose pipeline failed.
#[derive(Debug)]
pub struct FragmentFailure {
    /// 1-based source line of the code block's opening fence
    pub line: usize,
    /// The error, with the source location in its context chain
    pub error: anyhow::Error,
}

/// Result of processing one document.
#[derive(Debug)]
pub struct DocumentOutcome {
    /// The final document tree, including out-of-band `meta` annotations
    pub document: Document,
    /// The rewritten document source, `document.render()` for convenience
    pub rendered: String,
    /// Fragments published, in source order
    pub published: Vec<PublishedFragment>,
    /// Fragments that failed, in source order
    pub failures: Vec<FragmentFailure>,
}

impl DocumentOutcome {
    /// Whether any fragment failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// The resolve -> inject -> publish -> format orchestrator.
pub struct SandboxPipeline {
    resolver: TemplateResolver,
    registry: Arc<dyn SandboxRegistry>,
    base_url: String,
    mode: OutputMode,
}

impl SandboxPipeline {
    /// Build a pipeline sharing one registry between resolution and
    /// publishing. The resolution cache lives as long as the pipeline, so
    /// reuse one pipeline across documents to span the whole process.
    #[must_use]
    pub fn new(
        registry: Arc<dyn SandboxRegistry>,
        overrides: OverrideTable,
        base_url: impl Into<String>,
        mode: OutputMode,
    ) -> Self {
        Self {
            resolver: TemplateResolver::new(Arc::clone(&registry), overrides),
            registry,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            mode,
        }
    }

    /// Resolve a template, inject the fragment, publish, and compose the
    /// final sandbox URL.
    pub async fn synthesize(&self, request: &ArtifactRequest<'_>) -> Result<Artifact> {
        let template = self.resolver.resolve(request.template).await?;

        let mut query = request.query.clone();
        query.insert_default("module", format!("/{}", template.entry.trim_start_matches('/')));

        let mut files: TemplateFiles = (*template.files).clone();
        files.insert(template.entry.clone(), FileContent::new(request.content));

        let sandbox_id = self.registry.define_sandbox(&files).await?;
        let url = format!("{}/s/{}?{}", self.base_url, sandbox_id, query.serialize());

        let title = request
            .document_title
            .map(str::to_string)
            .or_else(|| template.title.clone());

        debug!(template = request.template, sandbox = %sandbox_id, "fragment published");

        Ok(Artifact {
            sandbox_id,
            url,
            title,
            query,
        })
    }

    /// Process a whole markdown document.
    ///
    /// Code blocks without a `codesandbox` directive pass through
    /// untouched. Failures are per-fragment: siblings still publish and
    /// the document is still rendered with every successful rewrite
    /// applied.
    pub async fn process_document(&self, source: &str) -> DocumentOutcome {
        let mut doc = Document::parse(source);
        let document_title = doc.title().map(str::to_string);

        // Snapshot the work list first; mode application below shifts
        // block indices.
        let targets: Vec<(usize, SandboxDirective, String, usize)> = doc
            .blocks
            .iter()
            .enumerate()
            .filter_map(|(idx, block)| match block {
                Block::Code(code) => SandboxDirective::from_meta(code.meta())
                    .map(|directive| (idx, directive, code.value.clone(), code.line)),
                _ => None,
            })
            .collect();

        let mut published = Vec::new();
        let mut failures = Vec::new();
        let mut inserted = 0usize;

        for (idx, directive, content, line) in targets {
            let request = ArtifactRequest {
                template: &directive.template,
                query: directive.query.clone(),
                content: &content,
                document_title: document_title.as_deref(),
            };

            match self.synthesize(&request).await {
                Ok(artifact) => {
                    inserted += self.apply_mode(&mut doc, idx + inserted, &artifact);
                    published.push(PublishedFragment { line, artifact });
                }
                Err(err) => {
                    warn!(line, template = %directive.template, "fragment failed: {err}");
                    failures.push(FragmentFailure {
                        line,
                        error: anyhow::Error::new(err)
                            .context(format!("processing code block at line {line}")),
                    });
                }
            }
        }

        DocumentOutcome {
            rendered: doc.render(),
            document: doc,
            published,
            failures,
        }
    }

    /// Apply the output mode for one published block; returns how many
    /// blocks were inserted before subsequent indices.
    fn apply_mode(&self, doc: &mut Document, idx: usize, artifact: &Artifact) -> usize {
        match self.mode {
            OutputMode::Meta => {
                if let Block::Code(code) = &mut doc.blocks[idx] {
                    code.sandbox_url = Some(artifact.url.clone());
                }
                0
            }
            OutputMode::Button => {
                let button = format!(
                    "\n[![Edit on CodeSandbox]({}/static/img/play-codesandbox.svg)]({})",
                    self.base_url, artifact.url
                );
                doc.blocks.insert(idx + 1, Block::Raw { value: button });
                1
            }
            OutputMode::Iframe => {
                let mut embed_query = Query::default();
                embed_query.set("fontsize", "14px");
                embed_query.set("hidenavigation", "1");
                embed_query.set("theme", "dark");
                for (key, value) in artifact.query.iter() {
                    embed_query.set(key, value);
                }

                let value = format!(
                    "<iframe\n  src=\"{}/embed/{}?{}\"\n  style=\"width:100%; height:500px; border:0; border-radius: 4px; overflow:hidden;\"\n  title=\"{}\"\n  allow=\"geolocation; microphone; camera; midi; vr; accelerometer; gyroscope; payment; ambient-light-sensor; encrypted-media; usb\"\n  sandbox=\"allow-modals allow-forms allow-popups allow-scripts allow-same-origin\"\n></iframe>",
                    self.base_url,
                    artifact.sandbox_id,
                    embed_query.serialize(),
                    artifact.title.as_deref().unwrap_or_default(),
                );
                doc.blocks[idx] = Block::Html { value };
                0
            }
        }
    }
}
