//! # Model Loader
//!
//! A lazy, cache-aware loading engine for object models backed by remote API
//! commands. Each model type declares *how* it is fetched; the engine decides:
//!
//! - **when** to fetch: on first data access, never at construction,
//! - **how much** to fetch: collections are paged in chunks sized by a
//!   separate count query,
//! - **whether** a previous response can be reused: responses are cached under
//!   a fingerprint of the model type and arguments,
//! - **what** to do when a command fails: a pluggable [`ExceptionHandler`]
//!   wraps the failure or substitutes a response.
//!
//! Lifecycle events ([`LoadEvent`]) fire at fixed points so cross-cutting
//! concerns like cache invalidation or auditing hook in without the loaders
//! knowing about them.
//!
//! ## Architecture Overview
//!
//! 1. **Declaration Layer** ([`Resource`], [`CollectionResource`]): per-type
//!    command names, response paths, limits and handlers.
//! 2. **Loading Layer** ([`Loader`], [`CollectionLoader`], [`Count`], [`all`]):
//!    builds the deferred fetches and runs them.
//! 3. **Access Layer** ([`Model`], [`Collection`]): lazily populated data,
//!    reachable with `.await` or blocking accessors.
//! 4. **Plumbing** ([`Client`], [`Transport`], [`ResponseCache`],
//!    [`EventDispatcher`], [`ModelRegistry`]).
//!
//! ## Example
//!
//! ```rust,ignore
//! use model_loader::{Client, InMemoryCache, Model, ModelConfig, Resource};
//!
//! struct Repository;
//!
//! impl Resource for Repository {
//!     const TYPE: &'static str = "Repository";
//!
//!     fn config() -> ModelConfig {
//!         ModelConfig::builder("GetRepository").result_path("repository").build()
//!     }
//! }
//!
//! let client = Client::builder(my_transport).cache(InMemoryCache::new()).build();
//! let repo = Model::<Repository>::using(&client)
//!     .arg("owner", "octo")
//!     .arg("name", "loader")
//!     .load_async()
//!     .await?;
//!
//! // Nothing has been sent yet. This triggers the fetch:
//! let name: String = repo.decode("name").await?;
//! ```
//!
//! ## Load States
//!
//! | State | Meaning |
//! |-------|---------|
//! | `Waiting` | a fetch is pending and nobody asked for the data yet |
//! | `Loaded` | the fetch ran on first access |
//! | `LoadedWithData` | built from pre-supplied data, never fetched |
//!
//! ## Concurrency Model
//!
//! - Every fetch is a [`Deferred`]: a boxed future that does nothing until driven.
//! - Concurrent first accessors of a model share one initialization; the
//!   command is issued once.
//! - Collection chunks are fetched concurrently and reassembled in order.
//! - An accessor dropped mid-fetch (timeout, `select!`) leaves the fetch in
//!   flight for the next accessor; only an explicit `cancel` abandons it.
//! - Blocking accessors (`load`, `wait`, `*_blocking`) run the work with a tokio
//!   context, so transports may use tokio timers and IO. They must not be
//!   called from a current-thread runtime's task.
//!
//! ## Testing
//!
//! [`MockTransport`](mock::MockTransport) scripts command responses and records
//! calls. See the [`mock`] module.

pub mod cache;
pub mod cache_hash;
pub mod client;
pub mod collection;
pub mod collection_loader;
pub mod config;
pub mod count;
pub mod data;
pub mod deferred;
pub mod error;
pub mod event;
pub mod exception;
mod lazy;
pub mod load_state;
pub mod loader;
pub mod mock;
pub mod model;
pub mod registry;
pub mod tracing;

// Re-export core types for convenience
pub use cache::{CacheError, InMemoryCache, ResponseCache};
pub use cache_hash::{fingerprint, CacheHash};
pub use client::{Client, ClientBuilder, ClientSettings, Transport};
pub use collection::{Collection, CollectionBuilder, CollectionResource};
pub use collection_loader::{plan_chunks, Chunk, CollectionLoader};
pub use config::{
    CollectionConfig, CollectionLoadConfig, InitCallback, LoadConfig, LoadConfigBuilder,
    ModelConfig,
};
pub use count::Count;
pub use data::{extract, Args};
pub use deferred::{all, defer, Deferred};
pub use error::{CommandError, LoadError};
pub use event::{EventDispatcher, EventKind, Listener, LoadEvent};
pub use exception::{ExceptionHandler, FetchFailure, PassThrough, StatusAware};
pub use load_state::LoadState;
pub use loader::Loader;
pub use model::{AnyModel, Model, ModelBuilder, ParentRef, Resource};
pub use registry::{ModelFactory, ModelRegistry};
