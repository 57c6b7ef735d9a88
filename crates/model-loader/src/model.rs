//! # Models
//!
//! A [`Model<R>`] is the lazily populated data of one remote resource. The
//! resource type `R` declares how it is fetched by implementing [`Resource`];
//! the model holds the shared [`Client`], its [`LoadState`] and the pending
//! fetch, and only drives that fetch when its data is first read.
//!
//! ```rust,ignore
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
//! let repo = Model::<Repository>::using(&client)
//!     .arg("owner", "octo")
//!     .arg("name", "loader")
//!     .load_async()
//!     .await?;
//! assert!(repo.state().is_waiting());
//!
//! let stars: u64 = repo.decode("stars").await?; // fetches now
//! ```
//!
//! Type-erased access to models and collections goes through [`AnyModel`].

use crate::client::Client;
use crate::config::{LoadConfig, LoadConfigBuilder, ModelConfig};
use crate::data::{lookup, Args};
use crate::deferred::Deferred;
use crate::error::LoadError;
use crate::exception::ExceptionHandler;
use crate::lazy::LazySlot;
use crate::load_state::LoadState;
use crate::loader::Loader;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

/// A remote resource type that can be loaded into a [`Model`].
pub trait Resource: Send + Sync + 'static {
    /// Type identifier used in cache keys, events, errors and the registry.
    const TYPE: &'static str;

    /// Built once per process and validated before the first load.
    fn config() -> ModelConfig;

    /// Turns the raw command response into the model's data.
    fn finalize(raw: Value, config: &ModelConfig) -> Result<Value, LoadError> {
        config.finalize(Self::TYPE, raw)
    }
}

/// Object-safe view shared by models and collections.
pub trait AnyModel: Any + Send + Sync {
    fn model_type(&self) -> &'static str;

    fn load_state(&self) -> LoadState;

    fn parent(&self) -> Option<Arc<dyn AnyModel>>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl fmt::Debug for dyn AnyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyModel")
            .field("model_type", &self.model_type())
            .field("load_state", &self.load_state())
            .finish()
    }
}

/// Non-owning back-reference to a parent model or collection.
#[derive(Clone)]
pub struct ParentRef(Weak<dyn AnyModel>);

impl ParentRef {
    pub fn of<P: AnyModel>(parent: &Arc<P>) -> Self {
        let weak: Weak<P> = Arc::downgrade(parent);
        Self(weak)
    }

    pub(crate) fn from_weak(parent: Weak<dyn AnyModel>) -> Self {
        Self(parent)
    }

    /// `None` once the parent has been dropped.
    pub fn upgrade(&self) -> Option<Arc<dyn AnyModel>> {
        self.0.upgrade()
    }
}

impl From<&Arc<dyn AnyModel>> for ParentRef {
    fn from(parent: &Arc<dyn AnyModel>) -> Self {
        Self(Arc::downgrade(parent))
    }
}

impl fmt::Debug for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(parent) => write!(f, "ParentRef({})", parent.model_type()),
            None => f.write_str("ParentRef(<dropped>)"),
        }
    }
}

/// The lazily populated data of one `R`.
pub struct Model<R: Resource> {
    client: Arc<Client>,
    config: Arc<ModelConfig>,
    parent: Option<ParentRef>,
    args: Args,
    slot: LazySlot<Arc<Value>>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Model<R> {
    /// Starts a fluent load of `R` through `client`.
    pub fn using(client: &Arc<Client>) -> ModelBuilder<R> {
        ModelBuilder {
            client: client.clone(),
            config: LoadConfig::builder(),
            _resource: PhantomData,
        }
    }

    pub(crate) fn waiting(
        client: Arc<Client>,
        config: Arc<ModelConfig>,
        load: &LoadConfig,
        work: Deferred<Arc<Value>>,
    ) -> Self {
        Self {
            client,
            config,
            parent: load.parent().cloned(),
            args: load.args().clone(),
            slot: LazySlot::waiting(R::TYPE, load.args().clone(), load.clear_cache(), work),
            _resource: PhantomData,
        }
    }

    pub(crate) fn with_data(
        client: Arc<Client>,
        config: Arc<ModelConfig>,
        load: &LoadConfig,
        data: Value,
    ) -> Self {
        Self {
            client,
            config,
            parent: load.parent().cloned(),
            args: load.args().clone(),
            slot: LazySlot::with_data(R::TYPE, Arc::new(data)),
            _resource: PhantomData,
        }
    }

    pub fn state(&self) -> LoadState {
        self.slot.state()
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// The model's data, fetching it on first access.
    pub async fn data(&self) -> Result<Arc<Value>, LoadError> {
        self.slot.get().await
    }

    /// Blocking form of [`Model::data`]. Must not be called from inside an async task.
    pub fn data_blocking(&self) -> Result<Arc<Value>, LoadError> {
        self.slot.get_blocking()
    }

    /// The value at a dot path of the data, or `None` when the path does not resolve.
    pub async fn get(&self, path: &str) -> Result<Option<Value>, LoadError> {
        let data = self.data().await?;
        Ok(lookup(&data, path).cloned())
    }

    /// Decodes the value at `path` into `T`.
    pub async fn decode<T: DeserializeOwned>(&self, path: &str) -> Result<T, LoadError> {
        let data = self.data().await?;
        let value = lookup(&data, path).ok_or_else(|| LoadError::Decode {
            model_type: R::TYPE.to_string(),
            path: path.to_string(),
            reason: "no value at path".to_string(),
        })?;
        T::deserialize(value).map_err(|e| LoadError::Decode {
            model_type: R::TYPE.to_string(),
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Abandons the fetch while it has not started. Later accesses fail with
    /// [`LoadError::Cancelled`]. Returns `false` if there was nothing to cancel.
    pub fn cancel(&self, reason: &str) -> bool {
        self.slot.cancel(reason)
    }

    pub fn parent(&self) -> Option<Arc<dyn AnyModel>> {
        self.parent.as_ref().and_then(ParentRef::upgrade)
    }
}

impl<R: Resource> AnyModel for Model<R> {
    fn model_type(&self) -> &'static str {
        R::TYPE
    }

    fn load_state(&self) -> LoadState {
        self.state()
    }

    fn parent(&self) -> Option<Arc<dyn AnyModel>> {
        Model::parent(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<R: Resource> fmt::Debug for Model<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("model_type", &R::TYPE)
            .field("state", &self.state())
            .field("args", &self.args)
            .field("parent", &self.parent)
            .finish()
    }
}

/// Fluent entry point returned by [`Model::using`].
pub struct ModelBuilder<R: Resource> {
    client: Arc<Client>,
    config: LoadConfigBuilder,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> ModelBuilder<R> {
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config = self.config.arg(name, value);
        self
    }

    pub fn args(mut self, args: Args) -> Self {
        self.config = self.config.args(args);
        self
    }

    pub fn with_parent<P: AnyModel>(self, parent: &Arc<P>) -> Self {
        self.parent(ParentRef::of(parent))
    }

    pub fn parent(mut self, parent: ParentRef) -> Self {
        self.config = self.config.parent(parent);
        self
    }

    /// Evicts any cached response and fetches fresh.
    pub fn clear_cache(mut self) -> Self {
        self.config = self.config.clear_cache(true);
        self
    }

    /// Overrides the type's configured exception handler for this load.
    pub fn exception_handler(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.config = self.config.exception_handler(Arc::new(handler));
        self
    }

    /// Builds a model already holding `data`; no command is issued.
    pub fn with_data(self, data: Value) -> Result<Arc<Model<R>>, LoadError> {
        let config = self.config.data(data).build::<R>()?;
        Loader::<R>::new(self.client).build(config)
    }

    pub fn load_async(self) -> Deferred<Arc<Model<R>>> {
        match self.config.build::<R>() {
            Ok(config) => Loader::<R>::new(self.client).load_async(config),
            Err(e) => Deferred::failed(e),
        }
    }

    /// Blocking form of [`ModelBuilder::load_async`].
    pub fn load(self) -> Result<Arc<Model<R>>, LoadError> {
        self.load_async().wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use serde::Deserialize;
    use serde_json::json;

    struct Repository;

    impl Resource for Repository {
        const TYPE: &'static str = "Repository";

        fn config() -> ModelConfig {
            ModelConfig::builder("GetRepository")
                .result_path("repository")
                .build()
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Owner {
        login: String,
    }

    #[tokio::test]
    async fn test_decode_typed_fields() {
        let client = Client::new(MockTransport::new());
        let repo = Model::<Repository>::using(&client)
            .with_data(json!({ "owner": { "login": "octo" }, "stars": 42 }))
            .unwrap();

        let owner: Owner = repo.decode("owner").await.unwrap();
        assert_eq!(owner, Owner { login: "octo".into() });
        assert_eq!(repo.decode::<u64>("stars").await.unwrap(), 42);

        let err = repo.decode::<u64>("owner.login").await.unwrap_err();
        assert!(matches!(err, LoadError::Decode { ref path, .. } if path == "owner.login"));
        assert!(repo.decode::<u64>("forks").await.is_err());
    }

    #[tokio::test]
    async fn test_parent_is_not_owned() {
        let client = Client::new(MockTransport::new());
        let parent = Model::<Repository>::using(&client)
            .with_data(json!({}))
            .unwrap();
        let child = Model::<Repository>::using(&client)
            .with_parent(&parent)
            .with_data(json!({}))
            .unwrap();

        assert_eq!(child.parent().unwrap().model_type(), "Repository");
        drop(parent);
        assert!(child.parent().is_none());
    }

    #[tokio::test]
    async fn test_get_returns_none_for_unknown_path() {
        let client = Client::new(MockTransport::new());
        let repo = Model::<Repository>::using(&client)
            .with_data(json!({ "name": "loader" }))
            .unwrap();
        assert_eq!(repo.get("name").await.unwrap(), Some(json!("loader")));
        assert_eq!(repo.get("missing").await.unwrap(), None);
    }
}
