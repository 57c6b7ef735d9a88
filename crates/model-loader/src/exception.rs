//! # Exception Handling
//!
//! When a command is rejected, the loader hands a [`FetchFailure`] to an
//! [`ExceptionHandler`]. The handler either:
//!
//! - returns `Err(LoadError)`: the load fails with that error, usually built
//!   with [`FetchFailure::wrap`] so the model type, command and arguments travel
//!   with it, or
//! - returns `Ok(raw)`: a substitute raw response that goes through the normal
//!   finalization as if the command had answered it. Substitutes are never
//!   written to the response cache.
//!
//! The handler in effect is the per-call override when one was given, else the
//! type's configured handler, else [`PassThrough`].

use crate::data::{describe_args, Args};
use crate::error::{CommandError, LoadError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Message used by [`PassThrough`] when none is configured.
pub const DEFAULT_MESSAGE: &str = "Unable to load model data";

/// Everything known about a rejected command.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub model_type: String,
    pub command: String,
    pub args: Args,
    pub error: CommandError,
}

impl FetchFailure {
    pub fn status(&self) -> Option<u16> {
        self.error.status
    }

    /// Builds a [`LoadError::Fetch`] whose message is `messages` joined with `": "`.
    pub fn wrap<I, S>(self, messages: I) -> LoadError
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let message = messages
            .into_iter()
            .map(|m| m.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(": ");
        LoadError::Fetch {
            message,
            model_type: self.model_type,
            command: self.command,
            args: describe_args(&self.args),
            source: self.error,
        }
    }
}

/// Maps a rejected command to a load error or a substitute raw response.
pub trait ExceptionHandler: Send + Sync {
    fn handle(&self, failure: FetchFailure) -> Result<Value, LoadError>;
}

impl<F> ExceptionHandler for F
where
    F: Fn(FetchFailure) -> Result<Value, LoadError> + Send + Sync,
{
    fn handle(&self, failure: FetchFailure) -> Result<Value, LoadError> {
        self(failure)
    }
}

/// Wraps every failure with a fixed message chain.
#[derive(Debug, Clone)]
pub struct PassThrough {
    messages: Vec<String>,
}

impl PassThrough {
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for PassThrough {
    fn default() -> Self {
        Self::new([DEFAULT_MESSAGE])
    }
}

impl ExceptionHandler for PassThrough {
    fn handle(&self, failure: FetchFailure) -> Result<Value, LoadError> {
        Err(failure.wrap(&self.messages))
    }
}

#[derive(Debug, Clone)]
enum Rule {
    Wrap(Vec<String>),
    Substitute(Value),
}

/// Picks a reaction by response status, falling back to a message chain.
///
/// ```rust,ignore
/// let handler = StatusAware::new(["Issue lookup failed"])
///     .on_status_wrap(404, ["Issue not found"])
///     .on_status_substitute(503, json!({ "issues": [] }));
/// ```
#[derive(Debug, Clone)]
pub struct StatusAware {
    rules: HashMap<u16, Rule>,
    fallback: Vec<String>,
}

impl StatusAware {
    pub fn new<I, S>(fallback: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rules: HashMap::new(),
            fallback: fallback.into_iter().map(Into::into).collect(),
        }
    }

    pub fn on_status_wrap<I, S>(mut self, status: u16, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let messages = messages.into_iter().map(Into::into).collect();
        self.rules.insert(status, Rule::Wrap(messages));
        self
    }

    /// Answers failures with `status` by a substitute raw response.
    pub fn on_status_substitute(mut self, status: u16, raw: Value) -> Self {
        self.rules.insert(status, Rule::Substitute(raw));
        self
    }
}

impl ExceptionHandler for StatusAware {
    fn handle(&self, failure: FetchFailure) -> Result<Value, LoadError> {
        match failure.status().and_then(|status| self.rules.get(&status)) {
            Some(Rule::Substitute(raw)) => Ok(raw.clone()),
            Some(Rule::Wrap(messages)) => Err(failure.wrap(messages)),
            None => Err(failure.wrap(&self.fallback)),
        }
    }
}

/// The handler in effect: the per-call override, else the configured default, else [`PassThrough`].
pub(crate) fn resolve(
    call_override: Option<&Arc<dyn ExceptionHandler>>,
    configured: Option<&Arc<dyn ExceptionHandler>>,
) -> Arc<dyn ExceptionHandler> {
    call_override
        .or(configured)
        .cloned()
        .unwrap_or_else(|| Arc::new(PassThrough::default()))
}
