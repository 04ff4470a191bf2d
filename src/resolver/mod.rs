//! Memoized template resolution with single-flight fetch coalescing.
//!
//! [`TemplateResolver`] owns the process-lifetime cache of resolved
//! templates. A name is resolved at most once: the first caller installs a
//! `Pending` placeholder and performs the fetch/normalize/compose work,
//! while concurrent callers for the same name wait on a
//! [`tokio::sync::Notify`] handle instead of issuing duplicate requests.
//! The naive check-then-fetch pattern would race exactly there, so the
//! placeholder goes in under the same map entry lock as the lookup.
//!
//! Cache entries are immutable once `Ready` and are never evicted. Failed
//! resolutions are not cached: the placeholder is removed and waiters are
//! woken so a later request retries from scratch.
//!
//! Resolution of a name follows the custom-template table first: if `name`
//! is a custom template, its `extends` target is the base (fetched, or
//! taken from the cache, or itself resolved as another custom template)
//! and the override is composed on top; otherwise `name` is fetched
//! directly from the registry.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

use crate::core::Result;
use crate::registry::SandboxRegistry;
use crate::template::{OverrideTable, ResolvedTemplate, normalize};

/// State of one cache slot.
///
/// `Pending` carries the notify handle waiters subscribe to; `Ready` holds
/// the immutable resolved template shared with every caller.
enum TemplateState {
    Pending(Arc<Notify>),
    Ready(Arc<ResolvedTemplate>),
}

/// Process-scoped template resolution cache.
///
/// Cheap to share: wrap in an [`Arc`] and clone across tasks. All interior
/// state lives in a [`DashMap`], so `resolve` takes `&self` and is safe to
/// call concurrently.
pub struct TemplateResolver {
    registry: Arc<dyn SandboxRegistry>,
    overrides: OverrideTable,
    cache: DashMap<String, TemplateState>,
}

impl TemplateResolver {
    /// Create a resolver over a registry and a custom-template table.
    #[must_use]
    pub fn new(registry: Arc<dyn SandboxRegistry>, overrides: OverrideTable) -> Self {
        Self {
            registry,
            overrides,
            cache: DashMap::new(),
        }
    }

    /// Resolve `name` into a cached template, fetching it on first use.
    ///
    /// Repeat calls for the same name return the same `Arc`; the registry
    /// is hit at most once per name regardless of call concurrency.
    pub async fn resolve(&self, name: &str) -> Result<Arc<ResolvedTemplate>> {
        let notify = Arc::new(Notify::new());

        loop {
            match self.cache.entry(name.to_string()) {
                Entry::Occupied(entry) => match entry.get() {
                    TemplateState::Ready(template) => {
                        debug!(template = name, "cache hit");
                        return Ok(Arc::clone(template));
                    }
                    TemplateState::Pending(existing) => {
                        // Subscribe before releasing the entry lock so a
                        // notify_waiters racing with the drop is not missed.
                        let existing = Arc::clone(existing);
                        let notified = existing.notified();
                        drop(entry);

                        debug!(template = name, "waiting for in-flight resolution");
                        notified.await;
                    }
                },
                Entry::Vacant(entry) => {
                    entry.insert(TemplateState::Pending(Arc::clone(&notify)));
                    break;
                }
            }
        }

        // This caller owns the Pending slot and performs the resolution.
        match self.resolve_uncached(name).await {
            Ok(template) => {
                self.cache
                    .insert(name.to_string(), TemplateState::Ready(Arc::clone(&template)));
                notify.notify_waiters();
                Ok(template)
            }
            Err(err) => {
                // Errors are not cached; waiters retry and refetch.
                self.cache.remove(name);
                notify.notify_waiters();
                Err(err)
            }
        }
    }

    /// Resolve `name` without consulting its own cache slot.
    async fn resolve_uncached(&self, name: &str) -> Result<Arc<ResolvedTemplate>> {
        let spec = self.overrides.get(name);
        if spec.is_some() {
            self.overrides.check_chain(name)?;
        }
        let base_name = spec.and_then(|s| s.extends.as_deref()).unwrap_or(name);

        let base = if base_name == name {
            let raw = self.registry.fetch_template(name).await?;
            Arc::new(normalize(name, &raw)?)
        } else if let Some(cached) = self.cached(base_name) {
            debug!(template = name, base = base_name, "composing onto cached base");
            cached
        } else if self.overrides.contains(base_name) {
            // The base is itself a custom template; resolve it through the
            // cache so intermediate chain links are memoized too. The
            // chain was cycle-checked above, so this recursion terminates.
            Box::pin(self.resolve(base_name)).await?
        } else {
            let raw = self.registry.fetch_template(base_name).await?;
            let resolved = Arc::new(normalize(base_name, &raw)?);
            // Publish the base under its own name too, so sibling custom
            // templates extending the same base reuse this fetch. Vacant-only:
            // an in-flight resolve(base_name) owns any Pending slot.
            if let Entry::Vacant(slot) = self.cache.entry(base_name.to_string()) {
                slot.insert(TemplateState::Ready(Arc::clone(&resolved)));
            }
            resolved
        };

        Ok(match spec {
            Some(spec) => Arc::new(spec.compose(&base)),
            None => base,
        })
    }

    fn cached(&self, name: &str) -> Option<Arc<ResolvedTemplate>> {
        self.cache.get(name).and_then(|entry| match entry.value() {
            TemplateState::Ready(template) => Some(Arc::clone(template)),
            TemplateState::Pending(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SandboxError;
    use crate::template::TemplateOverride;
    use crate::test_utils::MockRegistry;
    use std::time::Duration;

    fn resolver_with(registry: MockRegistry, overrides: OverrideTable) -> TemplateResolver {
        TemplateResolver::new(Arc::new(registry), overrides)
    }

    #[tokio::test]
    async fn test_repeat_resolution_is_idempotent() {
        let registry = MockRegistry::with_new_template();
        let fetches = registry.fetch_counter();
        let resolver = resolver_with(registry, OverrideTable::empty());

        let first = resolver.resolve("new").await.unwrap();
        let second = resolver.resolve("new").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetches.count("new"), 1);
    }

    #[tokio::test]
    async fn test_override_extends_base() {
        let registry = MockRegistry::with_new_template();
        let fetches = registry.fetch_counter();
        let resolver = resolver_with(registry, OverrideTable::builtin());

        let react = resolver.resolve("react-component").await.unwrap();

        assert_eq!(react.entry, "src/App.js");
        assert_eq!(fetches.count("new"), 1);
        assert_eq!(fetches.count("react-component"), 0);
    }

    #[tokio::test]
    async fn test_sibling_overrides_share_fetched_base() {
        let registry = MockRegistry::with_new_template();
        let fetches = registry.fetch_counter();
        let resolver = resolver_with(registry, OverrideTable::builtin());

        // Neither override was resolved before; the first fetch of `new`
        // must serve both.
        let react = resolver.resolve("react").await.unwrap();
        let component = resolver.resolve("react-component").await.unwrap();

        assert_eq!(fetches.count("new"), 1);
        assert!(Arc::ptr_eq(&react.files, &component.files));
    }

    #[tokio::test]
    async fn test_cached_base_satisfies_override() {
        let registry = MockRegistry::with_new_template();
        let fetches = registry.fetch_counter();
        let resolver = resolver_with(registry, OverrideTable::builtin());

        let base = resolver.resolve("new").await.unwrap();
        let react = resolver.resolve("react").await.unwrap();

        // One fetch total; the override composed onto the cached base and
        // shares its file set.
        assert_eq!(fetches.count("new"), 1);
        assert!(Arc::ptr_eq(&base.files, &react.files));
    }

    #[tokio::test]
    async fn test_chained_overrides_memoize_links() {
        let registry = MockRegistry::with_new_template();
        let fetches = registry.fetch_counter();
        let mut overrides = OverrideTable::empty();
        overrides.insert(
            "outer",
            TemplateOverride {
                extends: Some("inner".to_string()),
                entry: Some("src/Outer.js".to_string()),
                ..Default::default()
            },
        );
        overrides.insert(
            "inner",
            TemplateOverride {
                extends: Some("new".to_string()),
                title: Some("Inner".to_string()),
                ..Default::default()
            },
        );
        let resolver = resolver_with(registry, overrides);

        let outer = resolver.resolve("outer").await.unwrap();
        assert_eq!(outer.entry, "src/Outer.js");
        assert_eq!(outer.title.as_deref(), Some("Inner"));
        assert_eq!(fetches.count("new"), 1);

        // The intermediate link was cached along the way.
        let inner = resolver.resolve("inner").await.unwrap();
        assert_eq!(inner.title.as_deref(), Some("Inner"));
        assert_eq!(fetches.count("new"), 1);
    }

    #[tokio::test]
    async fn test_override_cycle_fails() {
        let registry = MockRegistry::with_new_template();
        let mut overrides = OverrideTable::empty();
        overrides.insert(
            "a",
            TemplateOverride {
                extends: Some("b".to_string()),
                ..Default::default()
            },
        );
        overrides.insert(
            "b",
            TemplateOverride {
                extends: Some("a".to_string()),
                ..Default::default()
            },
        );
        let resolver = resolver_with(registry, overrides);

        let err = resolver.resolve("a").await.unwrap_err();
        assert!(matches!(err, SandboxError::OverrideCycle { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_resolution_fetches_once() {
        let registry = MockRegistry::with_new_template().with_fetch_delay(Duration::from_millis(50));
        let fetches = registry.fetch_counter();
        let resolver = Arc::new(resolver_with(registry, OverrideTable::empty()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve("new").await })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap().unwrap());
        }

        assert_eq!(fetches.count("new"), 1);
        for pair in results.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let registry = MockRegistry::with_new_template();
        let fetches = registry.fetch_counter();
        let resolver = resolver_with(registry, OverrideTable::empty());

        let err = resolver.resolve("missing").await.unwrap_err();
        assert!(matches!(err, SandboxError::TemplateFetch { .. }));
        assert_eq!(fetches.count("missing"), 1);

        // A later attempt hits the registry again rather than a poisoned
        // cache slot.
        let err = resolver.resolve("missing").await.unwrap_err();
        assert!(matches!(err, SandboxError::TemplateFetch { .. }));
        assert_eq!(fetches.count("missing"), 2);
    }
}
