//! # System Lifecycle
//!
//! Builds the shared [`Client`](model_loader::Client) the demo runs on and
//! wires the cross-cutting listeners into it.
//!
//! ## The TrackerSystem Pattern
//!
//! Individual model declarations are simple; wiring the client, its cache and
//! the event listeners together is where the setup lives. [`TrackerSystem`]
//! does it once:
//!
//! 1. **Cache** - an [`InMemoryCache`](model_loader::InMemoryCache) per
//!    [`ClientSettings`](model_loader::ClientSettings), kept by handle so the
//!    system can invalidate and inspect it
//! 2. **Listeners** - the [`AuditLog`] for every event kind, plus count-change
//!    cache invalidation
//! 3. **Registration** - the model types, so they can be loaded by tag
//! 4. **Shutdown** - clears the cache
//!
//! Listeners must be in place before the first load, which is why they are
//! attached through the client builder rather than afterwards.
//!
//! ## Observability
//!
//! Logging is initialized with
//! [`setup_tracing`](model_loader::tracing::setup_tracing):
//!
//! ```bash
//! RUST_LOG=info cargo run      # One line per load and count
//! RUST_LOG=debug cargo run     # Cache hits, chunk plans and fixture answers
//! ```

pub mod audit;
pub mod tracker_system;

pub use audit::*;
pub use tracker_system::*;
