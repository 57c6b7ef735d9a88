//! # Loader Sample
//!
//! A small issue tracker client built on [`model_loader`].
//!
//! - **[model]**: resource declarations ([`Repository`](model::Repository),
//!   [`Issue`](model::Issue), [`IssueList`](model::IssueList)) and their serde views.
//! - **[transport]**: [`FixtureTransport`](transport::FixtureTransport), an
//!   in-memory tracker API with simulated latency.
//! - **[lifecycle]**: [`TrackerSystem`](lifecycle::TrackerSystem), which wires
//!   client, cache and listeners together.
//!
//! The entry point in `main.rs` walks through a lazy repository load, a paged
//! issue listing and a load by type tag.

pub mod lifecycle;
pub mod model;
pub mod transport;
