//! # Tracing Setup
//!
//! The loaders log through `tracing` with structured fields:
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `model_type` | the model or collection type being loaded |
//! | `command` | the command issued against the transport |
//! | `total`, `chunks` | count result and number of chunk commands |
//! | `context` | the batch name passed to [`all`](crate::all) |
//!
//! State transitions and cache hits log at `debug`, completed loads at `info`,
//! rejected commands and failing listeners at `warn`.
//!
//! ```bash
//! RUST_LOG=info cargo run -p loader-sample
//! RUST_LOG=model_loader=debug cargo run -p loader-sample
//! ```

/// Initializes the global subscriber with `RUST_LOG` filtering and compact output.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // model_type identifies the source
        .compact()
        .init();
}
