//! Test utilities shared by unit and integration tests.
//!
//! Available to integration tests through the `test-utils` feature (the
//! crate depends on itself with that feature in `[dev-dependencies]`).
//! The centerpiece is [`MockRegistry`], an in-memory [`SandboxRegistry`]
//! with canned templates, per-id fetch counters, and a recorded publish
//! log, so resolution and synthesis behavior can be asserted without any
//! network.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::core::{Result, SandboxError};
use crate::registry::SandboxRegistry;
use crate::template::{DirectoryNode, ModuleNode, RawTemplate, TemplateFiles};

/// Initialize tracing for tests; safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared handle over the mock's per-template fetch counts.
#[derive(Clone, Default)]
pub struct FetchCounter(Arc<DashMap<String, usize>>);

impl FetchCounter {
    /// Fetches recorded for one template id.
    #[must_use]
    pub fn count(&self, id: &str) -> usize {
        self.0.get(id).map(|entry| *entry).unwrap_or(0)
    }

    /// Fetches recorded across all template ids.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.iter().map(|entry| *entry.value()).sum()
    }

    fn record(&self, id: &str) {
        *self.0.entry(id.to_string()).or_insert(0) += 1;
    }
}

/// Shared handle over the mock's recorded publish bodies.
#[derive(Clone, Default)]
pub struct PublishLog(Arc<Mutex<Vec<TemplateFiles>>>);

impl PublishLog {
    /// The most recently published file set.
    #[must_use]
    pub fn last(&self) -> Option<TemplateFiles> {
        self.0.lock().unwrap().last().cloned()
    }

    /// Number of publishes recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Whether nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, files: TemplateFiles) {
        self.0.lock().unwrap().push(files);
    }
}

/// In-memory registry double with canned templates.
pub struct MockRegistry {
    templates: HashMap<String, RawTemplate>,
    fetches: FetchCounter,
    publishes: PublishLog,
    next_id: AtomicUsize,
    fetch_delay: Option<Duration>,
}

impl MockRegistry {
    /// An empty registry; every fetch fails.
    #[must_use]
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
            fetches: FetchCounter::default(),
            publishes: PublishLog::default(),
            next_id: AtomicUsize::new(1),
            fetch_delay: None,
        }
    }

    /// A registry serving the canonical `new` template fixture: entry
    /// `index.js` at the root plus `src/`, `public/`, and `package.json`.
    #[must_use]
    pub fn with_new_template() -> Self {
        let mut registry = Self::new();
        registry.insert_template("new", new_template_fixture());
        registry
    }

    /// Add or replace a canned template.
    pub fn insert_template(&mut self, id: impl Into<String>, raw: RawTemplate) {
        self.templates.insert(id.into(), raw);
    }

    /// Delay every fetch, for exercising concurrent resolution.
    #[must_use]
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Handle for asserting fetch counts after the registry moves into an
    /// `Arc`.
    #[must_use]
    pub fn fetch_counter(&self) -> FetchCounter {
        self.fetches.clone()
    }

    /// Handle for asserting published bundles.
    #[must_use]
    pub fn publish_log(&self) -> PublishLog {
        self.publishes.clone()
    }
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxRegistry for MockRegistry {
    async fn fetch_template(&self, id: &str) -> Result<RawTemplate> {
        self.fetches.record(id);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| SandboxError::TemplateFetch {
                id: id.to_string(),
                reason: "registry returned 404 Not Found".to_string(),
            })
    }

    async fn define_sandbox(&self, files: &TemplateFiles) -> Result<String> {
        self.publishes.record(files.clone());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mock{id:04}"))
    }
}

/// The `new` template the way the registry would serve it.
#[must_use]
pub fn new_template_fixture() -> RawTemplate {
    RawTemplate {
        title: Some("new".to_string()),
        entry: Some("index.js".to_string()),
        directories: vec![
            DirectoryNode {
                shortid: "d-src".to_string(),
                directory_shortid: None,
                title: "src".to_string(),
            },
            DirectoryNode {
                shortid: "d-public".to_string(),
                directory_shortid: None,
                title: "public".to_string(),
            },
        ],
        modules: vec![
            ModuleNode {
                shortid: "m-index".to_string(),
                directory_shortid: None,
                title: "index.js".to_string(),
                code: Some("import App from './src/App';\n".to_string()),
            },
            ModuleNode {
                shortid: "m-app".to_string(),
                directory_shortid: Some("d-src".to_string()),
                title: "App.js".to_string(),
                code: Some("export default function App() {}\n".to_string()),
            },
            ModuleNode {
                shortid: "m-html".to_string(),
                directory_shortid: Some("d-public".to_string()),
                title: "index.html".to_string(),
                code: Some("<div id=\"root\"></div>\n".to_string()),
            },
            ModuleNode {
                shortid: "m-pkg".to_string(),
                directory_shortid: None,
                title: "package.json".to_string(),
                code: Some("{\n  \"name\": \"sandbox\"\n}\n".to_string()),
            },
        ],
    }
}
