//! mdsandbox - publish annotated markdown code blocks as CodeSandbox
//! sandboxes.
//!
//! A fenced code block carrying a `codesandbox` directive names a template
//! (a base set of files fetched from the registry, optionally patched by a
//! locally-defined custom template). mdsandbox resolves the template,
//! injects the block's content at the template's entry path, publishes the
//! bundle through the registry's define endpoint, and reflects the
//! resulting sandbox URL back into the document.
//!
//! ````markdown
//! # My Demo
//!
//! ```js codesandbox=react?module=/index.js
//! console.log(1)
//! ```
//! ````
//!
//! # Core Modules
//!
//! - [`template`] - template data model: flat node graph, path
//!   reconstruction, normalization, and custom-template composition
//! - [`resolver`] - process-lifetime resolution cache with single-flight
//!   fetch coalescing
//! - [`registry`] - the remote fetch/publish interface and its HTTP
//!   implementation
//! - [`pipeline`] - bundle synthesis and the per-document orchestration,
//!   including the three output modes (`meta`, `button`, `iframe`)
//!
//! # Supporting Modules
//!
//! - [`document`] - block-level markdown model and directive parsing
//! - [`config`] - `mdsandbox.toml` loading with built-in defaults
//! - [`core`] - error types and user-facing error formatting
//! - [`cli`] - the `mdsandbox` command
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mdsandbox::pipeline::{OutputMode, SandboxPipeline};
//! use mdsandbox::registry::HttpRegistry;
//! use mdsandbox::template::OverrideTable;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = Arc::new(HttpRegistry::new("https://codesandbox.io"));
//! let pipeline = SandboxPipeline::new(
//!     registry,
//!     OverrideTable::builtin(),
//!     "https://codesandbox.io",
//!     OutputMode::Button,
//! );
//!
//! let outcome = pipeline.process_document("# Demo\n\n```js codesandbox=react\nconsole.log(1)\n```\n").await;
//! println!("{}", outcome.rendered);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod document;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod template;

// Available to both unit tests and integration tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
