//! # Fixture Transport
//!
//! An in-process stand-in for the issue tracker API. It answers the four
//! commands the sample models use from fixed data, with optional simulated
//! latency and a maintenance switch that makes listing commands fail.
//!
//! | Command | Arguments | Answer |
//! |---------|-----------|--------|
//! | `GetRepository` | `owner`, `name` | `{ "repository": {..} }` or 404 |
//! | `GetIssue` | `repository`, `number` | `{ "issue": {..} }` or 404 |
//! | `CountIssues` | `repository`, optional `state` | `{ "total": n }` or 404 |
//! | `ListIssues` | `repository`, optional `state`, `offset`, `limit` | `{ "issues": [..] }`, 503 during maintenance |
//!
//! Missing or mistyped arguments answer 400; unknown commands answer 501.

use async_trait::async_trait;
use model_loader::{Args, CommandError, Transport};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

struct Fixtures {
    repositories: HashMap<String, Value>,
    issues: HashMap<String, Vec<Value>>,
    latency: Duration,
    maintenance: AtomicBool,
    calls: AtomicUsize,
}

/// In-memory issue tracker. Clones share the same fixtures and counters.
#[derive(Clone)]
pub struct FixtureTransport {
    fixtures: Arc<Fixtures>,
}

impl FixtureTransport {
    pub fn builder() -> FixtureBuilder {
        FixtureBuilder::default()
    }

    /// Two repositories: `octo/loader` with 70 issues (every third one closed)
    /// and `octo/empty` with none.
    pub fn demo() -> Self {
        let issues = (1..=70u64)
            .map(|number| {
                let state = if number % 3 == 0 { "closed" } else { "open" };
                let labels: &[&str] = match number % 4 {
                    0 => &["bug"],
                    1 => &["enhancement"],
                    2 => &["bug", "docs"],
                    _ => &[],
                };
                json!({
                    "number": number,
                    "title": format!("Issue #{number}"),
                    "state": state,
                    "labels": labels,
                })
            })
            .collect();

        Self::builder()
            .repository("octo", "loader", 512, Some("Lazy model loading"))
            .issues("octo/loader", issues)
            .repository("octo", "empty", 0, None)
            .latency(Duration::from_millis(15))
            .build()
    }

    /// While on, `ListIssues` answers 503.
    pub fn set_maintenance(&self, on: bool) {
        self.fixtures.maintenance.store(on, Ordering::SeqCst);
    }

    /// Number of commands received so far.
    pub fn call_count(&self) -> usize {
        self.fixtures.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, command: &str, args: &Args) -> Result<Value, CommandError> {
        let fixtures = &self.fixtures;
        match command {
            "GetRepository" => {
                let full_name = format!("{}/{}", str_arg(command, args, "owner")?, str_arg(command, args, "name")?);
                let repository = fixtures
                    .repositories
                    .get(&full_name)
                    .ok_or_else(|| not_found(command, &full_name))?;
                Ok(json!({ "repository": repository }))
            }
            "GetIssue" => {
                let repository = str_arg(command, args, "repository")?;
                let number = u64_arg(command, args, "number")?;
                let issue = self
                    .issues_of(command, repository)?
                    .find(|issue| issue["number"] == json!(number))
                    .ok_or_else(|| not_found(command, &format!("{repository}#{number}")))?;
                Ok(json!({ "issue": issue }))
            }
            "CountIssues" => {
                let repository = str_arg(command, args, "repository")?;
                let state = optional_str_arg(command, args, "state")?;
                let total = self
                    .issues_of(command, repository)?
                    .filter(|issue| matches_state(issue, state))
                    .count();
                Ok(json!({ "total": total }))
            }
            "ListIssues" => {
                if fixtures.maintenance.load(Ordering::SeqCst) {
                    return Err(CommandError::new(command, "tracker under maintenance").with_status(503));
                }
                let repository = str_arg(command, args, "repository")?;
                let state = optional_str_arg(command, args, "state")?;
                let offset = u64_arg(command, args, "offset")? as usize;
                let limit = u64_arg(command, args, "limit")? as usize;
                let page: Vec<&Value> = self
                    .issues_of(command, repository)?
                    .filter(|issue| matches_state(issue, state))
                    .skip(offset)
                    .take(limit)
                    .collect();
                Ok(json!({ "issues": page }))
            }
            _ => Err(CommandError::new(command, "unknown command").with_status(501)),
        }
    }

    fn issues_of<'a>(
        &'a self,
        command: &str,
        repository: &str,
    ) -> Result<impl Iterator<Item = &'a Value> + 'a, CommandError> {
        if !self.fixtures.repositories.contains_key(repository) {
            return Err(not_found(command, repository));
        }
        Ok(self
            .fixtures
            .issues
            .get(repository)
            .into_iter()
            .flatten())
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    #[instrument(skip(self, args))]
    async fn execute(&self, command: &str, args: &Args) -> Result<Value, CommandError> {
        self.fixtures.calls.fetch_add(1, Ordering::SeqCst);
        if !self.fixtures.latency.is_zero() {
            tokio::time::sleep(self.fixtures.latency).await;
        }
        let answer = self.answer(command, args);
        debug!(ok = answer.is_ok(), "Fixture answered");
        answer
    }
}

/// Fluent builder for [`FixtureTransport`].
#[derive(Default)]
pub struct FixtureBuilder {
    repositories: HashMap<String, Value>,
    issues: HashMap<String, Vec<Value>>,
    latency: Duration,
}

impl FixtureBuilder {
    pub fn repository(mut self, owner: &str, name: &str, stars: u64, description: Option<&str>) -> Self {
        self.repositories.insert(
            format!("{owner}/{name}"),
            json!({
                "owner": owner,
                "name": name,
                "stars": stars,
                "description": description,
            }),
        );
        self
    }

    /// Issues of `full_name`, each an object with at least `number` and `state`.
    pub fn issues(mut self, full_name: &str, issues: Vec<Value>) -> Self {
        self.issues.entry(full_name.to_string()).or_default().extend(issues);
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn build(self) -> FixtureTransport {
        FixtureTransport {
            fixtures: Arc::new(Fixtures {
                repositories: self.repositories,
                issues: self.issues,
                latency: self.latency,
                maintenance: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }),
        }
    }
}

fn matches_state(issue: &Value, state: Option<&str>) -> bool {
    match state {
        None => true,
        Some(wanted) => issue["state"].as_str() == Some(wanted),
    }
}

fn bad_request(command: &str, message: String) -> CommandError {
    CommandError::new(command, message).with_status(400)
}

fn not_found(command: &str, what: &str) -> CommandError {
    CommandError::new(command, format!("{what} not found")).with_status(404)
}

fn str_arg<'a>(command: &str, args: &'a Args, name: &str) -> Result<&'a str, CommandError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| bad_request(command, format!("missing string argument `{name}`")))
}

fn optional_str_arg<'a>(command: &str, args: &'a Args, name: &str) -> Result<Option<&'a str>, CommandError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(bad_request(command, format!("argument `{name}` must be a string"))),
    }
}

fn u64_arg(command: &str, args: &Args, name: &str) -> Result<u64, CommandError> {
    args.get(name)
        .and_then(Value::as_u64)
        .ok_or_else(|| bad_request(command, format!("missing integer argument `{name}`")))
}
