//! Error handling for mdsandbox.
//!
//! Two layers make up the error system:
//! - [`SandboxError`] - strongly-typed failure cases for template resolution
//!   and publishing, used for precise matching in code
//! - [`ErrorContext`] - a display wrapper that adds actionable suggestions
//!   for CLI users
//!
//! Fatal errors inside a document are scoped to a single code block: the
//! pipeline attaches the block's source line through [`anyhow`] context and
//! keeps processing sibling blocks. Only two conditions are deliberately
//! swallowed, and both are specified as recoverable: a file whose path chain
//! cannot be reconstructed (the file is dropped from the bundle) and a
//! directive that does not parse (the block is skipped).

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for template resolution and bundle publishing.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The template's directory/file graph contains a parent cycle.
    ///
    /// The registry never produces this for well-formed sandboxes, but the
    /// path walk refuses to follow a cycle rather than recurse forever.
    #[error("template '{template}' contains a cyclic directory graph")]
    CyclicGraph {
        /// The template id whose node graph is malformed
        template: String,
    },

    /// A custom template's `extends` chain loops back on itself.
    #[error("custom template '{name}' has a cyclic extends chain")]
    OverrideCycle {
        /// The custom template name where the cycle was detected
        name: String,
    },

    /// Fetching a template from the registry failed.
    #[error("failed to fetch template '{id}': {reason}")]
    TemplateFetch {
        /// The template id that was requested
        id: String,
        /// Transport or HTTP status detail
        reason: String,
    },

    /// The registry returned a template the resolver cannot use.
    #[error("template '{id}' is invalid: {reason}")]
    TemplateInvalid {
        /// The template id that was fetched
        id: String,
        /// What was wrong with the payload
        reason: String,
    },

    /// Publishing a synthesized bundle failed.
    #[error("failed to publish sandbox: {reason}")]
    Publish {
        /// Transport or HTTP status detail
        reason: String,
    },

    /// Configuration file problems.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// The error message
        message: String,
    },
}

/// User-facing error wrapper pairing a [`SandboxError`] with optional
/// suggestion and details lines.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: SandboxError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: SandboxError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion, shown in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add explanatory details, shown in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details, and suggestion to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with contextual suggestions.
///
/// Downcasts to [`SandboxError`] where possible so known failure modes get
/// specific guidance; everything else falls back to a generic message that
/// still preserves the anyhow context chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    match error.downcast::<SandboxError>() {
        Ok(err) => {
            // Guidance strings are built before the error moves into the
            // context.
            let (details, suggestion) = match &err {
                SandboxError::TemplateFetch { id, .. } => (
                    Some(format!("the registry could not serve template '{id}'")),
                    Some(
                        "Check your network connection and that the template id exists \
                         (e.g. 'new', 'vanilla', or a sandbox id)"
                            .to_string(),
                    ),
                ),
                SandboxError::Publish { .. } => (
                    None,
                    Some(
                        "Check your network connection; the define endpoint may be \
                         temporarily down"
                            .to_string(),
                    ),
                ),
                SandboxError::OverrideCycle { name } => (
                    Some(format!(
                        "the extends chain starting at '{name}' never reaches a fetchable template"
                    )),
                    None,
                ),
                SandboxError::Config { .. } => (
                    None,
                    Some("Check the syntax of your mdsandbox.toml".to_string()),
                ),
                _ => (None, None),
            };

            let mut context = ErrorContext::new(err);
            context.details = details;
            context.suggestion = suggestion;
            context
        }
        Err(err) => ErrorContext::new(SandboxError::Other {
            message: format!("{err:#}"),
        }),
    }
}
