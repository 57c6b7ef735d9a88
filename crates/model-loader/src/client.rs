//! # Client
//!
//! The [`Client`] is the shared handle every model and collection holds. It
//! bundles the command [`Transport`], the [`EventDispatcher`], the optional
//! [`ResponseCache`] and the [`ModelRegistry`]. It is always handed out as an
//! `Arc<Client>` and is cheap to share across tasks.
//!
//! ```rust,ignore
//! let client = Client::builder(transport)
//!     .cache(InMemoryCache::new())
//!     .listen(EventKind::PostCount, |event| { /* ... */ Ok(()) })
//!     .build();
//!
//! let repo = Model::<Repository>::using(&client).arg("owner", "octo").load()?;
//! ```

use crate::cache::{InMemoryCache, ResponseCache};
use crate::data::{describe_args, Args};
use crate::error::CommandError;
use crate::event::{EventDispatcher, EventKind, LoadEvent};
use crate::registry::ModelRegistry;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Executes named commands against the remote API.
///
/// Timeouts and retries are the transport's concern; the loaders only see the
/// final outcome.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, command: &str, args: &Args) -> Result<Value, CommandError>;
}

/// Shared handle used by every loader.
pub struct Client {
    transport: Arc<dyn Transport>,
    events: Arc<EventDispatcher>,
    cache: Option<Arc<dyn ResponseCache>>,
    registry: ModelRegistry,
}

impl Client {
    /// A client without a response cache.
    pub fn new(transport: impl Transport + 'static) -> Arc<Self> {
        Self::builder(transport).build()
    }

    pub fn builder(transport: impl Transport + 'static) -> ClientBuilder {
        ClientBuilder::new(Arc::new(transport))
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    pub fn cache(&self) -> Option<&Arc<dyn ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Returns the pending execution of `command`. Nothing is sent until the future is polled.
    pub fn command(&self, command: &str, args: Args) -> BoxFuture<'static, Result<Value, CommandError>> {
        let transport = self.transport.clone();
        let command = command.to_string();
        async move {
            debug!(command = %command, args = %describe_args(&args), "Executing command");
            transport.execute(&command, &args).await
        }
        .boxed()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("events", &self.events)
            .field("cached", &self.cache.is_some())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Fluent builder for [`Client`].
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    events: EventDispatcher,
    cache: Option<Arc<dyn ResponseCache>>,
}

impl ClientBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            events: EventDispatcher::new(),
            cache: None,
        }
    }

    pub fn cache(self, cache: impl ResponseCache + 'static) -> Self {
        self.shared_cache(Arc::new(cache))
    }

    /// Uses a cache the caller keeps a handle to.
    pub fn shared_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Applies [`ClientSettings`]: installs an [`InMemoryCache`] when caching is enabled.
    pub fn settings(mut self, settings: &ClientSettings) -> Self {
        self.cache = settings
            .in_memory_cache()
            .map(|cache| cache as Arc<dyn ResponseCache>);
        self
    }

    /// Registers a listener before the client is shared.
    pub fn listen<F>(self, kind: EventKind, listener: F) -> Self
    where
        F: Fn(&LoadEvent<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.events.listen(kind, listener);
        self
    }

    pub fn build(self) -> Arc<Client> {
        Arc::new(Client {
            transport: self.transport,
            events: Arc::new(self.events),
            cache: self.cache,
            registry: ModelRegistry::new(),
        })
    }
}

/// Environment-driven client settings.
///
/// | Variable | Meaning | Default |
/// |----------|---------|---------|
/// | `MODEL_LOADER_CACHE` | `on`/`off` (also `1`/`0`, `true`/`false`) | `on` |
/// | `MODEL_LOADER_CACHE_TTL_SECS` | default entry lifetime in seconds | no expiry |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub cache_enabled: bool,
    pub cache_ttl: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: None,
        }
    }
}

impl ClientSettings {
    pub const CACHE_VAR: &'static str = "MODEL_LOADER_CACHE";
    pub const CACHE_TTL_VAR: &'static str = "MODEL_LOADER_CACHE_TTL_SECS";

    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Unparseable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let cache_enabled = lookup(Self::CACHE_VAR)
            .and_then(|raw| parse_switch(&raw))
            .unwrap_or(defaults.cache_enabled);
        let cache_ttl = lookup(Self::CACHE_TTL_VAR)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .or(defaults.cache_ttl);
        Self {
            cache_enabled,
            cache_ttl,
        }
    }

    /// The cache these settings call for, `None` when caching is off. Callers
    /// that need to inspect or invalidate it keep the returned handle and pass
    /// it to [`ClientBuilder::shared_cache`].
    pub fn in_memory_cache(&self) -> Option<Arc<InMemoryCache>> {
        if !self.cache_enabled {
            return None;
        }
        let cache = match self.cache_ttl {
            Some(ttl) => InMemoryCache::with_default_ttl(ttl),
            None => InMemoryCache::new(),
        };
        Some(Arc::new(cache))
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "1" | "true" | "yes" => Some(true),
        "off" | "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ClientSettings::from_lookup(lookup(&[]));
        assert_eq!(settings, ClientSettings::default());
        assert!(settings.in_memory_cache().is_some());
    }

    #[test]
    fn test_builder_settings_control_the_cache() {
        let on = ClientBuilder::new(Arc::new(MockTransport::new()))
            .settings(&ClientSettings::default())
            .build();
        assert!(on.cache().is_some());

        let off = ClientBuilder::new(Arc::new(MockTransport::new()))
            .settings(&ClientSettings::from_lookup(lookup(&[("MODEL_LOADER_CACHE", "no")])))
            .build();
        assert!(off.cache().is_none());
    }

    #[test]
    fn test_settings_parse_switch_and_ttl() {
        let settings = ClientSettings::from_lookup(lookup(&[
            ("MODEL_LOADER_CACHE", "off"),
            ("MODEL_LOADER_CACHE_TTL_SECS", "90"),
        ]));
        assert!(!settings.cache_enabled);
        assert_eq!(settings.cache_ttl, Some(Duration::from_secs(90)));
        assert!(settings.in_memory_cache().is_none());
    }

    #[test]
    fn test_settings_ignore_garbage() {
        let settings = ClientSettings::from_lookup(lookup(&[
            ("MODEL_LOADER_CACHE", "maybe"),
            ("MODEL_LOADER_CACHE_TTL_SECS", "soon"),
        ]));
        assert_eq!(settings, ClientSettings::default());
    }
}
