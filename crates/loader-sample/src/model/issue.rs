use model_loader::{
    CollectionConfig, CollectionResource, LoadError, Model, ModelConfig, Resource, StatusAware,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// A single issue, fetched by repository and number.
pub struct Issue;

impl Resource for Issue {
    const TYPE: &'static str = "Issue";

    fn config() -> ModelConfig {
        ModelConfig::builder("GetIssue").result_path("issue").build()
    }
}

/// The issues of one repository, paged 25 at a time.
///
/// While the tracker is under maintenance the listing answers 503; those pages
/// are treated as empty instead of failing the whole collection.
pub struct IssueList;

impl IssueList {
    pub const PAGE_SIZE: usize = 25;
    pub const DEFAULT_MAX: usize = 100;
}

impl CollectionResource for IssueList {
    const TYPE: &'static str = "IssueList";
    type Item = Issue;

    fn config() -> CollectionConfig {
        CollectionConfig::builder("ListIssues")
            .count_command("CountIssues")
            .count_path("total")
            .items_path("issues")
            .per_command_max(Self::PAGE_SIZE)
            .max_results(Self::DEFAULT_MAX)
            .exception_handler(
                StatusAware::new(["Issue listing failed"])
                    .on_status_substitute(503, json!({ "issues": [] })),
            )
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueInfo {
    pub number: u64,
    pub title: String,
    pub state: IssueState,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl IssueInfo {
    pub async fn of(model: &Model<Issue>) -> Result<Self, LoadError> {
        model.decode("").await
    }
}
