//! # Registry
//!
//! Two registries live here:
//!
//! - The **configuration registry**: a process-wide map from a resource type's
//!   [`TypeId`] to its validated, immutable configuration. Each entry is built
//!   from [`Resource::config`] / [`CollectionResource::config`] once, on first
//!   use, and shared afterwards.
//! - The **model registry** ([`ModelRegistry`]): a per-client map from type tag
//!   to a [`ModelFactory`], for callers that only know a model's type by name.
//!   Types must be registered explicitly.
//!
//! ```rust,ignore
//! client.registry().register::<Repository>();
//! let repo = client.registry().factory("Repository")?.load(&client, config)?;
//! ```

use crate::client::Client;
use crate::collection::{Collection, CollectionResource};
use crate::config::{CollectionConfig, CollectionLoadConfig, LoadConfig, ModelConfig};
use crate::deferred::Deferred;
use crate::error::LoadError;
use crate::model::{AnyModel, Model, Resource};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

static MODEL_CONFIGS: Lazy<DashMap<TypeId, Arc<ModelConfig>>> = Lazy::new(DashMap::new);
static COLLECTION_CONFIGS: Lazy<DashMap<TypeId, Arc<CollectionConfig>>> = Lazy::new(DashMap::new);

/// The validated configuration of `R`, built on first use.
pub fn model_config<R: Resource>() -> Result<Arc<ModelConfig>, LoadError> {
    let entry = MODEL_CONFIGS
        .entry(TypeId::of::<R>())
        .or_try_insert_with(|| {
            let config = R::config();
            config.validate(R::TYPE)?;
            debug!(model_type = R::TYPE, command = config.command(), "Model configuration registered");
            Ok::<_, LoadError>(Arc::new(config))
        })?;
    Ok(entry.value().clone())
}

/// The validated configuration of collection `C`, built on first use.
pub fn collection_config<C: CollectionResource>() -> Result<Arc<CollectionConfig>, LoadError> {
    let entry = COLLECTION_CONFIGS
        .entry(TypeId::of::<C>())
        .or_try_insert_with(|| {
            let config = C::config();
            config.validate(C::TYPE)?;
            debug!(model_type = C::TYPE, command = config.command(), "Collection configuration registered");
            Ok::<_, LoadError>(Arc::new(config))
        })?;
    Ok(entry.value().clone())
}

/// Creates models of one type without the caller naming that type.
pub trait ModelFactory: Send + Sync {
    fn model_type(&self) -> &'static str;

    fn load_async(&self, client: &Arc<Client>, config: LoadConfig) -> Deferred<Arc<dyn AnyModel>>;

    /// Blocking form of [`ModelFactory::load_async`].
    fn load(&self, client: &Arc<Client>, config: LoadConfig) -> Result<Arc<dyn AnyModel>, LoadError> {
        self.load_async(client, config).wait()
    }

    fn with_data(&self, client: &Arc<Client>, data: serde_json::Value) -> Result<Arc<dyn AnyModel>, LoadError>;
}

struct ResourceFactory<R>(PhantomData<fn() -> R>);

impl<R: Resource> ModelFactory for ResourceFactory<R> {
    fn model_type(&self) -> &'static str {
        R::TYPE
    }

    fn load_async(&self, client: &Arc<Client>, config: LoadConfig) -> Deferred<Arc<dyn AnyModel>> {
        crate::loader::Loader::<R>::new(client.clone())
            .load_async(config)
            .map(|model| Ok(model as Arc<dyn AnyModel>))
    }

    fn with_data(&self, client: &Arc<Client>, data: serde_json::Value) -> Result<Arc<dyn AnyModel>, LoadError> {
        let model = Model::<R>::using(client).with_data(data)?;
        Ok(model)
    }
}

struct CollectionFactory<C>(PhantomData<fn() -> C>);

impl<C: CollectionResource> ModelFactory for CollectionFactory<C> {
    fn model_type(&self) -> &'static str {
        C::TYPE
    }

    fn load_async(&self, client: &Arc<Client>, config: LoadConfig) -> Deferred<Arc<dyn AnyModel>> {
        crate::collection_loader::CollectionLoader::<C>::new(client.clone())
            .load_async(CollectionLoadConfig::from(config))
            .map(|collection| Ok(collection as Arc<dyn AnyModel>))
    }

    fn with_data(&self, client: &Arc<Client>, data: serde_json::Value) -> Result<Arc<dyn AnyModel>, LoadError> {
        let collection = Collection::<C>::using(client).with_data(data)?;
        Ok(collection)
    }
}

/// Type tag → factory map owned by a [`Client`].
#[derive(Default)]
pub struct ModelRegistry {
    factories: DashMap<&'static str, Arc<dyn ModelFactory>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `R` under [`Resource::TYPE`], validating its configuration.
    pub fn register<R: Resource>(&self) -> Result<(), LoadError> {
        model_config::<R>()?;
        self.insert(Arc::new(ResourceFactory::<R>(PhantomData)));
        Ok(())
    }

    /// Registers collection `C` under [`CollectionResource::TYPE`].
    pub fn register_collection<C: CollectionResource>(&self) -> Result<(), LoadError> {
        collection_config::<C>()?;
        model_config::<C::Item>()?;
        self.insert(Arc::new(CollectionFactory::<C>(PhantomData)));
        Ok(())
    }

    fn insert(&self, factory: Arc<dyn ModelFactory>) {
        let tag = factory.model_type();
        if self.factories.insert(tag, factory).is_some() {
            debug!(model_type = tag, "Factory replaced");
        } else {
            debug!(model_type = tag, "Factory registered");
        }
    }

    pub fn factory(&self, tag: &str) -> Result<Arc<dyn ModelFactory>, LoadError> {
        self.factories
            .get(tag)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LoadError::Unregistered(tag.to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.factories.iter().map(|entry| *entry.key()).collect();
        tags.sort_unstable();
        f.debug_struct("ModelRegistry").field("types", &tags).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl Resource for Counted {
        const TYPE: &'static str = "Counted";

        fn config() -> ModelConfig {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            ModelConfig::builder("GetCounted").build()
        }
    }

    struct Broken;

    impl Resource for Broken {
        const TYPE: &'static str = "Broken";

        fn config() -> ModelConfig {
            ModelConfig::builder("").build()
        }
    }

    #[test]
    fn test_config_is_built_once() {
        let first = model_config::<Counted>().unwrap();
        let second = model_config::<Counted>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_config_is_a_setup_failure() {
        let err = model_config::<Broken>().unwrap_err();
        assert!(matches!(err, LoadError::Setup { ref model_type, .. } if model_type == "Broken"));
        assert!(LoadConfig::builder().build::<Broken>().is_err());
    }

    #[tokio::test]
    async fn test_factory_lookup_by_tag() {
        let client = Client::new(MockTransport::new());
        client.registry().register::<Counted>().unwrap();

        let factory = client.registry().factory("Counted").unwrap();
        let model = factory.with_data(&client, json!({ "id": 1 })).unwrap();
        assert_eq!(model.model_type(), "Counted");
        assert!(model.load_state().is_loaded_with_data());
        assert!(model.as_any().downcast_ref::<Model<Counted>>().is_some());

        assert!(matches!(
            client.registry().factory("Nope"),
            Err(LoadError::Unregistered(ref tag)) if tag == "Nope"
        ));
        assert!(client.registry().register::<Broken>().is_err());
        assert!(!client.registry().contains("Broken"));
    }
}
