//! # Loader Errors
//!
//! This module defines the error taxonomy shared by every loader, the count
//! query, collections and the event dispatcher. Each variant carries the model
//! type, command and arguments involved so a failing call can be reproduced
//! from the error alone.
//!
//! [`LoadError`] is `Clone` because a single failed fetch is observed by every
//! accessor waiting on the same model.

use crate::event::EventKind;

/// Error reported by a [`Transport`](crate::Transport) when a command fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("command `{command}` failed{}: {message}", status_suffix(.status))]
pub struct CommandError {
    /// Name of the command that failed.
    pub command: String,
    /// Response status code, when the transport has one.
    pub status: Option<u16>,
    /// Human-readable failure reason.
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|status| format!(" with status {status}")).unwrap_or_default()
}

impl CommandError {
    pub fn new(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Attaches a response status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Errors that can occur while loading models and collections.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// The count query failed or returned a non-numeric value.
    #[error("Count query `{command}` for {model_type} failed (count args: {args}): {reason}")]
    Count {
        model_type: String,
        command: String,
        args: String,
        reason: String,
        #[source]
        source: Option<CommandError>,
    },

    /// The underlying command was rejected and the exception handler wrapped it.
    #[error("{message}: {model_type} via `{command}` (args: {args})")]
    Fetch {
        message: String,
        model_type: String,
        command: String,
        args: String,
        #[source]
        source: CommandError,
    },

    /// A model or collection is misconfigured.
    #[error("Invalid configuration for {model_type}: {reason}")]
    Setup { model_type: String, reason: String },

    /// An item of the wrong type was added to a collection.
    #[error("Collection {collection} expects {expected} items, got {actual}")]
    InvalidItem {
        collection: String,
        expected: String,
        actual: String,
    },

    /// A pending load was abandoned before it started.
    #[error("Load of {model_type} cancelled (args: {args}, clear_cache: {clear_cache}): {reason}")]
    Cancelled {
        model_type: String,
        args: String,
        clear_cache: bool,
        reason: String,
    },

    /// A listener returned an error and aborted the operation.
    #[error("Listener for {event} failed: {message}")]
    Listener { event: EventKind, message: String },

    /// The raw response could not be turned into model data.
    #[error("Could not finalize {model_type} from `{command}`: {reason}")]
    Finalize {
        model_type: String,
        command: String,
        reason: String,
    },

    /// A field of loaded data could not be decoded into the requested type.
    #[error("Could not decode `{path}` of {model_type}: {reason}")]
    Decode {
        model_type: String,
        path: String,
        reason: String,
    },

    /// No factory is registered for the requested type tag.
    #[error("No model registered for type `{0}`")]
    Unregistered(String),
}

impl LoadError {
    pub(crate) fn setup(model_type: &str, reason: impl Into<String>) -> Self {
        LoadError::Setup {
            model_type: model_type.to_string(),
            reason: reason.into(),
        }
    }

    /// The model type named by this error, when it has one.
    pub fn model_type(&self) -> Option<&str> {
        match self {
            LoadError::Count { model_type, .. }
            | LoadError::Fetch { model_type, .. }
            | LoadError::Setup { model_type, .. }
            | LoadError::Cancelled { model_type, .. }
            | LoadError::Finalize { model_type, .. }
            | LoadError::Decode { model_type, .. } => Some(model_type),
            LoadError::InvalidItem { collection, .. } => Some(collection),
            LoadError::Listener { .. } | LoadError::Unregistered(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display_includes_status() {
        let err = CommandError::new("GetIssue", "not found").with_status(404);
        assert_eq!(
            err.to_string(),
            "command `GetIssue` failed with status 404: not found"
        );

        let err = CommandError::new("GetIssue", "connection reset");
        assert_eq!(err.to_string(), "command `GetIssue` failed: connection reset");
    }

    #[test]
    fn test_fetch_error_carries_context() {
        let err = LoadError::Fetch {
            message: "Unable to load model data".into(),
            model_type: "Issue".into(),
            command: "GetIssue".into(),
            args: r#"{"number":7}"#.into(),
            source: CommandError::new("GetIssue", "boom"),
        };
        let text = err.to_string();
        assert!(text.contains("Issue"));
        assert!(text.contains("GetIssue"));
        assert!(text.contains(r#""number":7"#));
        assert_eq!(err.model_type(), Some("Issue"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
