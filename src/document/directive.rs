//! Code block directive parsing.
//!
//! Directives live in the fence info string as a space-separated
//! `key=value` list, e.g.:
//!
//! ````text
//! ```js codesandbox=react?module=/index.js&fontsize=12
//! ````
//!
//! The parser is deliberately forgiving: a key without `=value` maps to an
//! absent value, unknown keys are ignored, and anything that fails to parse
//! is treated as "no directive" so the code block is skipped rather than
//! failing the document.

use std::collections::HashMap;

/// Parse a directive string into a key -> optional-value mapping.
///
/// Never fails; tokens without `=` get a `None` value.
#[must_use]
pub fn parse_meta(meta: &str) -> HashMap<String, Option<String>> {
    meta.split_whitespace()
        .map(|token| match token.split_once('=') {
            Some((key, value)) => (key.to_string(), Some(value.to_string())),
            None => (token.to_string(), None),
        })
        .collect()
}

/// An ordered URL query string.
///
/// Keys keep their insertion order, which the synthesizer relies on when
/// serializing the final sandbox URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    /// Parse a `&`-separated query string, percent-decoding pairs.
    #[must_use]
    pub fn parse(query_string: &str) -> Self {
        Self(
            url::form_urlencoded::parse(query_string.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Append `key=value` only when `key` is absent.
    pub fn insert_default(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.contains(&key) {
            self.0.push((key, value.into()));
        }
    }

    /// Set `key=value`, replacing an existing key in place or appending.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Serialize to a percent-encoded query string in insertion order.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.0 {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// Iterate pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A parsed `codesandbox` directive: the template name and any query
/// parameters to carry onto the final sandbox URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxDirective {
    /// Template name or registry sandbox id
    pub template: String,
    /// Query overrides from the directive
    pub query: Query,
}

impl SandboxDirective {
    /// Extract the directive from a code block's metadata string.
    ///
    /// Returns `None` when there is no usable `codesandbox` key: absent,
    /// valueless, or with an empty template name. All of those mean "skip
    /// this block".
    #[must_use]
    pub fn from_meta(meta: &str) -> Option<Self> {
        let entries = parse_meta(meta);
        let value = entries.get("codesandbox")?.clone()?;

        let (template, query_string) = match value.split_once('?') {
            Some((template, query_string)) => (template, query_string),
            None => (value.as_str(), ""),
        };
        if template.is_empty() {
            return None;
        }

        Some(Self {
            template: template.to_string(),
            query: Query::parse(query_string),
        })
    }
}
