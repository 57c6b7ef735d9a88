//! # Issue Tracker Models
//!
//! The resource declarations of the demo issue tracker:
//!
//! | Type | Kind | Command | Count command |
//! |------|------|---------|---------------|
//! | [`Repository`] | single | `GetRepository` | |
//! | [`Issue`] | single / collection item | `GetIssue` | |
//! | [`IssueList`] | collection of [`Issue`] | `ListIssues` | `CountIssues` |
//!
//! Each declaration comes with a plain serde view ([`RepositoryInfo`],
//! [`IssueInfo`]) for decoding loaded data.

mod issue;
mod repository;

pub use issue::*;
pub use repository::*;
