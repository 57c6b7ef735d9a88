use super::audit::AuditLog;
use crate::model::{Issue, IssueList, IssueState, Repository};
use model_loader::{
    fingerprint, AnyModel, Args, CacheError, Client, ClientSettings, Collection, EventKind,
    InMemoryCache, LoadConfig, LoadError, LoadEvent, Model, ResponseCache, Transport,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Wires a transport, a response cache, the audit log and the tracker's model
/// types into one [`Client`].
///
/// # Wiring
///
/// - Every [`EventKind`] is recorded in the [`AuditLog`].
/// - When a count query for the same collection arguments returns a different
///   number than last time, the whole response cache is dropped so no stale
///   page is served alongside fresh ones.
/// - `Repository`, `Issue` and `IssueList` are registered for loading by tag.
///
/// # Example
///
/// ```ignore
/// let system = TrackerSystem::new(FixtureTransport::demo(), &ClientSettings::from_env())?;
///
/// let repo = system.repository("octo", "loader").await?;
/// let open = system.issues(&repo, Some(IssueState::Open), Some(30)).await?;
/// for issue in open.items().await? { /* ... */ }
///
/// system.shutdown().await?;
/// ```
pub struct TrackerSystem {
    client: Arc<Client>,
    cache: Option<Arc<InMemoryCache>>,
    audit: AuditLog,
}

impl TrackerSystem {
    pub fn new(transport: impl Transport + 'static, settings: &ClientSettings) -> Result<Self, TrackerError> {
        let cache = settings.in_memory_cache();
        let audit = AuditLog::new();

        let mut builder = Client::builder(transport);
        if let Some(cache) = &cache {
            builder = builder
                .shared_cache(cache.clone())
                .listen(EventKind::PostCount, invalidate_on_count_change(cache.clone()));
        }
        for kind in EventKind::ALL {
            let audit = audit.clone();
            builder = builder.listen(kind, move |event| {
                audit.record(event);
                Ok(())
            });
        }
        let client = builder.build();

        let registry = client.registry();
        registry.register::<Repository>()?;
        registry.register::<Issue>()?;
        registry.register_collection::<IssueList>()?;

        info!(
            cache = cache.is_some(),
            models = registry.len(),
            "Tracker system ready"
        );
        Ok(Self { client, cache, audit })
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Number of live cache entries; 0 when caching is off.
    pub fn cache_entries(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.len())
    }

    /// Prepares a repository model. Nothing is fetched until its data is read.
    #[instrument(skip(self))]
    pub async fn repository(&self, owner: &str, name: &str) -> Result<Arc<Model<Repository>>, TrackerError> {
        let model = Model::<Repository>::using(&self.client)
            .arg("owner", owner)
            .arg("name", name)
            .load_async()
            .await?;
        Ok(model)
    }

    /// Prepares the issue list of `repository`, optionally filtered by state.
    ///
    /// Reads the repository's `full_name`, so the repository itself is fetched
    /// here if it was not already.
    #[instrument(skip(self, repository))]
    pub async fn issues(
        &self,
        repository: &Arc<Model<Repository>>,
        state: Option<IssueState>,
        max: Option<usize>,
    ) -> Result<Arc<Collection<IssueList>>, TrackerError> {
        let full_name: String = repository.decode("full_name").await?;

        let mut builder = Collection::<IssueList>::using(&self.client)
            .with_parent(repository)
            .arg("repository", full_name);
        if let Some(state) = state {
            builder = builder.arg("state", state.as_str());
        }
        if let Some(max) = max {
            builder = builder.max_results(max);
        }
        Ok(builder.load_async().await?)
    }

    #[instrument(skip(self))]
    pub async fn issue(&self, full_name: &str, number: u64) -> Result<Arc<Model<Issue>>, TrackerError> {
        let model = Model::<Issue>::using(&self.client)
            .arg("repository", full_name)
            .arg("number", number)
            .load_async()
            .await?;
        Ok(model)
    }

    /// Loads a model by its registered type tag.
    #[instrument(skip(self, args))]
    pub async fn load_by_type(&self, tag: &str, args: Args) -> Result<Arc<dyn AnyModel>, TrackerError> {
        let factory = self.client.registry().factory(tag)?;
        let config = LoadConfig::builder().args(args).build_untyped();
        Ok(factory.load_async(&self.client, config).await?)
    }

    /// Drops every cached response and reports what the system did.
    pub async fn shutdown(self) -> Result<(), TrackerError> {
        info!("Shutting down tracker system...");
        if let Some(cache) = &self.cache {
            let dropped = cache.len();
            cache.clear().await?;
            info!(dropped, "Response cache cleared");
        }
        info!(events = self.audit.entries().len(), "Tracker system shut down");
        Ok(())
    }
}

fn invalidate_on_count_change(
    cache: Arc<InMemoryCache>,
) -> impl Fn(&LoadEvent<'_>) -> Result<(), String> + Send + Sync + 'static {
    let last_counts: Mutex<HashMap<String, usize>> = Mutex::new(HashMap::new());
    move |event: &LoadEvent<'_>| {
        let LoadEvent::PostCount { model_type, args, count } = event else {
            return Ok(());
        };
        let previous = last_counts
            .lock()
            .map_err(|_| "count history poisoned".to_string())?
            .insert(fingerprint(model_type, args), *count);
        if let Some(previous) = previous.filter(|previous| previous != count) {
            info!(model_type, previous, count, "Count changed, invalidating cached responses");
            cache.invalidate_all();
        }
        Ok(())
    }
}
