//! # Mock Transport & Testing Guide
//!
//! [`MockTransport`] implements [`Transport`] entirely in memory. Tests declare
//! which commands they expect and what each returns, then hand a clone of the
//! mock to [`Client::new`](crate::Client::new) and inspect the recorded calls
//! afterwards.
//!
//! ## When to use the mock vs a fixture transport
//!
//! | Feature | MockTransport | Fixture transport |
//! |---------|---------------|-------------------|
//! | **Speed** | Instant unless `delay` is set | Simulated latency |
//! | **Determinism** | Scripted per call | Whatever the fixture holds |
//! | **Call recording** | Every command and its arguments | None |
//! | **Error injection** | `return_err` / `respond_with` | Only what the fixture models |
//! | **Use Case** | Asserting how many and which commands a load issues | Demo apps and end-to-end flows |
//!
//! ## Expectations
//!
//! - One-shot expectations (`return_ok`, `return_err`) are consumed in the order
//!   they were declared for their command. [`MockTransport::verify`] panics if
//!   any is left unconsumed.
//! - Responders (`respond_with`) answer every matching call and are never
//!   consumed. One-shot expectations win over responders.
//! - `with_args` restricts an expectation to calls with exactly those arguments.
//! - A call nothing matches fails with a `CommandError` instead of panicking, so
//!   the failure surfaces through the loader under test.
//!
//! ```rust,ignore
//! let transport = MockTransport::new();
//! transport.expect_command("CountIssues").return_ok(json!({ "count": 25 }));
//! transport
//!     .expect_command("ListIssues")
//!     .delay(Duration::from_millis(20))
//!     .respond_with(|args| Ok(page(args)));
//!
//! let client = Client::new(transport.clone());
//! // ... load and access a collection ...
//! assert_eq!(transport.calls_to("ListIssues").len(), 3);
//! transport.verify();
//! ```

use crate::client::Transport;
use crate::data::{describe_args, Args};
use crate::error::CommandError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Arc<dyn Fn(&Args) -> Result<Value, CommandError> + Send + Sync>;

enum Reply {
    Once(Result<Value, CommandError>),
    Always(Responder),
}

struct Expectation {
    command: String,
    args: Option<Args>,
    delay: Option<Duration>,
    reply: Reply,
}

impl Expectation {
    fn matches(&self, command: &str, args: &Args) -> bool {
        self.command == command && self.args.as_ref().map_or(true, |expected| expected == args)
    }
}

/// A command issued against the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub command: String,
    pub args: Args,
}

#[derive(Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    calls: Vec<RecordedCall>,
}

/// A scripted [`Transport`] that records every call.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Creates a mock with no expectations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an expectation for `command`.
    pub fn expect_command(&self, command: impl Into<String>) -> ExpectationBuilder {
        ExpectationBuilder {
            state: self.state.clone(),
            command: command.into(),
            args: None,
            delay: None,
        }
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Arguments of every call to `command`, in arrival order.
    pub fn calls_to(&self, command: &str) -> Vec<Args> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.command == command)
            .map(|call| call.args.clone())
            .collect()
    }

    /// Verifies that all one-shot expectations were met.
    pub fn verify(&self) {
        let state = self.state.lock().unwrap();
        let remaining: Vec<_> = state
            .expectations
            .iter()
            .filter(|e| matches!(e.reply, Reply::Once(_)))
            .map(|e| e.command.as_str())
            .collect();
        if !remaining.is_empty() {
            panic!(
                "Not all expectations were met. {} remaining: {:?}",
                remaining.len(),
                remaining
            );
        }
    }

    fn next_reply(&self, command: &str, args: &Args) -> (Option<Duration>, Result<Value, CommandError>) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            command: command.to_string(),
            args: args.clone(),
        });

        let once = state
            .expectations
            .iter()
            .position(|e| matches!(e.reply, Reply::Once(_)) && e.matches(command, args));
        if let Some(index) = once {
            if let Some(Expectation {
                delay,
                reply: Reply::Once(result),
                ..
            }) = state.expectations.remove(index)
            {
                return (delay, result);
            }
        }

        let responder = state.expectations.iter().find_map(|e| match &e.reply {
            Reply::Always(responder) if e.matches(command, args) => Some((e.delay, responder.clone())),
            _ => None,
        });
        drop(state);

        match responder {
            Some((delay, responder)) => (delay, responder(args)),
            None => (
                None,
                Err(CommandError::new(
                    command,
                    format!("unexpected command with args {}", describe_args(args)),
                )),
            ),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, command: &str, args: &Args) -> Result<Value, CommandError> {
        let (delay, reply) = self.next_reply(command, args);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

/// Builder for one expectation.
pub struct ExpectationBuilder {
    state: Arc<Mutex<MockState>>,
    command: String,
    args: Option<Args>,
    delay: Option<Duration>,
}

impl ExpectationBuilder {
    /// Only matches calls with exactly these arguments.
    pub fn with_args(mut self, args: Args) -> Self {
        self.args = Some(args);
        self
    }

    /// Sleeps before answering.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, value: Value) {
        self.push(Reply::Once(Ok(value)));
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: CommandError) {
        self.push(Reply::Once(Err(error)));
    }

    /// Answers every matching call with `responder`.
    pub fn respond_with<F>(self, responder: F)
    where
        F: Fn(&Args) -> Result<Value, CommandError> + Send + Sync + 'static,
    {
        self.push(Reply::Always(Arc::new(responder)));
    }

    fn push(self, reply: Reply) {
        self.state.lock().unwrap().expectations.push_back(Expectation {
            command: self.command,
            args: self.args,
            delay: self.delay,
            reply,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(number: u64) -> Args {
        [("number".to_string(), json!(number))].into_iter().collect()
    }

    #[tokio::test]
    async fn test_mock_one_shot_expectations_in_order() {
        let mock = MockTransport::new();
        mock.expect_command("GetIssue").return_ok(json!(1));
        mock.expect_command("GetIssue").return_ok(json!(2));

        assert_eq!(mock.execute("GetIssue", &args(1)).await.unwrap(), json!(1));
        assert_eq!(mock.execute("GetIssue", &args(1)).await.unwrap(), json!(2));
        assert!(mock.execute("GetIssue", &args(1)).await.is_err());
        assert_eq!(mock.call_count(), 3);
        mock.verify();
    }

    #[tokio::test]
    async fn test_mock_with_args_selects_expectation() {
        let mock = MockTransport::new();
        mock.expect_command("GetIssue").with_args(args(2)).return_ok(json!("two"));
        mock.expect_command("GetIssue").with_args(args(1)).return_ok(json!("one"));

        assert_eq!(mock.execute("GetIssue", &args(1)).await.unwrap(), json!("one"));
        assert_eq!(mock.execute("GetIssue", &args(2)).await.unwrap(), json!("two"));
        mock.verify();
    }

    #[tokio::test]
    async fn test_mock_responder_is_reusable() {
        let mock = MockTransport::new();
        mock.expect_command("Echo").respond_with(|args| Ok(Value::Object(args.clone())));

        for n in 0..3 {
            assert_eq!(mock.execute("Echo", &args(n)).await.unwrap(), json!({ "number": n }));
        }
        assert_eq!(mock.calls_to("Echo").len(), 3);
        mock.verify();
    }

    #[tokio::test]
    async fn test_mock_return_err() {
        let mock = MockTransport::new();
        mock.expect_command("GetIssue")
            .return_err(CommandError::new("GetIssue", "not found").with_status(404));

        let err = mock.execute("GetIssue", &args(1)).await.unwrap_err();
        assert_eq!(err.status, Some(404));
    }

    #[test]
    #[should_panic(expected = "Not all expectations were met")]
    fn test_verify_panics_on_leftovers() {
        let mock = MockTransport::new();
        mock.expect_command("GetIssue").return_ok(json!(null));
        mock.verify();
    }
}
