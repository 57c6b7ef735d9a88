//! # Collections
//!
//! A [`Collection<C>`] is an ordered list of [`Model<C::Item>`]s filled from
//! one or more chunked commands. Like a model it populates lazily: the count
//! query and the chunk commands run on the first call to
//! [`Collection::items`]. Every child is created from its slice of the
//! response with [`LoadState::LoadedWithData`] and holds a weak reference back
//! to the collection.
//!
//! ```rust,ignore
//! struct IssueList;
//!
//! impl CollectionResource for IssueList {
//!     const TYPE: &'static str = "IssueList";
//!     type Item = Issue;
//!
//!     fn config() -> CollectionConfig {
//!         CollectionConfig::builder("ListIssues")
//!             .count_command("CountIssues")
//!             .per_command_max(25)
//!             .build()
//!     }
//! }
//!
//! let issues = Collection::<IssueList>::using(&client)
//!     .arg("repository", "octo/loader")
//!     .max_results(60)
//!     .load_async()
//!     .await?;
//! for issue in issues.items().await? { /* ... */ }
//! ```

use crate::client::Client;
use crate::collection_loader::{slice_items, CollectionLoader};
use crate::config::{CollectionConfig, CollectionLoadConfig, LoadConfigBuilder};
use crate::data::Args;
use crate::deferred::Deferred;
use crate::error::LoadError;
use crate::event::LoadEvent;
use crate::exception::ExceptionHandler;
use crate::lazy::LazySlot;
use crate::load_state::LoadState;
use crate::model::{AnyModel, Model, ParentRef, Resource};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// A collection type whose items are models of [`CollectionResource::Item`].
pub trait CollectionResource: Send + Sync + 'static {
    const TYPE: &'static str;

    type Item: Resource;

    /// Built once per process and validated before the first load.
    fn config() -> CollectionConfig;
}

pub struct Collection<C: CollectionResource> {
    client: Arc<Client>,
    config: Arc<CollectionConfig>,
    this: Weak<Self>,
    parent: Option<ParentRef>,
    args: Args,
    slot: LazySlot<()>,
    items: RwLock<Vec<Arc<Model<C::Item>>>>,
    /// Serializes appends so every add sees a distinct index.
    appending: Mutex<()>,
}

impl<C: CollectionResource> Collection<C> {
    pub fn using(client: &Arc<Client>) -> CollectionBuilder<C> {
        CollectionBuilder {
            client: client.clone(),
            config: LoadConfigBuilder::default(),
            _collection: PhantomData,
        }
    }

    /// A collection that runs `populate(self)` on first item access.
    pub(crate) fn waiting<F>(
        client: Arc<Client>,
        config: Arc<CollectionConfig>,
        load: &CollectionLoadConfig,
        populate: F,
    ) -> Arc<Self>
    where
        F: FnOnce(Weak<Self>) -> Deferred<()>,
    {
        let base = load.base();
        Arc::new_cyclic(|this| Self {
            client,
            config,
            this: this.clone(),
            parent: base.parent().cloned(),
            args: base.args().clone(),
            slot: LazySlot::waiting(C::TYPE, base.args().clone(), base.clear_cache(), populate(this.clone())),
            items: RwLock::new(Vec::new()),
            appending: Mutex::new(()),
        })
    }

    /// A collection filled right away from a chunk-shaped `response`.
    pub(crate) fn from_response(
        client: Arc<Client>,
        config: Arc<CollectionConfig>,
        load: &CollectionLoadConfig,
        response: &Value,
    ) -> Result<Arc<Self>, LoadError> {
        let items = slice_items(C::TYPE, config.command(), response, config.items_path())?;
        let base = load.base();
        let collection = Arc::new_cyclic(|this| Self {
            client,
            config,
            this: this.clone(),
            parent: base.parent().cloned(),
            args: base.args().clone(),
            slot: LazySlot::with_data(C::TYPE, ()),
            items: RwLock::new(Vec::with_capacity(items.len())),
            appending: Mutex::new(()),
        });
        for item in items {
            collection.add_data(item)?;
        }
        Ok(collection)
    }

    pub fn state(&self) -> LoadState {
        self.slot.state()
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// All items, populating the collection on first access.
    pub async fn items(&self) -> Result<Vec<Arc<Model<C::Item>>>, LoadError> {
        self.slot.get().await?;
        Ok(self.snapshot())
    }

    /// Blocking form of [`Collection::items`]. Must not be called from inside an async task.
    pub fn items_blocking(&self) -> Result<Vec<Arc<Model<C::Item>>>, LoadError> {
        self.slot.get_blocking()?;
        Ok(self.snapshot())
    }

    /// Number of items added so far. Does not trigger population.
    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cancel(&self, reason: &str) -> bool {
        self.slot.cancel(reason)
    }

    pub fn parent(&self) -> Option<Arc<dyn AnyModel>> {
        self.parent.as_ref().and_then(ParentRef::upgrade)
    }

    /// Creates a child from an item slice and appends it.
    pub fn add_data(&self, data: Value) -> Result<Arc<Model<C::Item>>, LoadError> {
        let item = Model::<C::Item>::using(&self.client)
            .parent(ParentRef::from_weak(self.this.clone()))
            .with_data(data)?;
        self.push(item.clone())?;
        Ok(item)
    }

    /// Appends a typed item, dispatching the add events around it.
    ///
    /// Appends are serialized; a listener may read the collection but must not
    /// add to it.
    pub fn push(&self, item: Arc<Model<C::Item>>) -> Result<(), LoadError> {
        let _appending = self.appending.lock().unwrap_or_else(PoisonError::into_inner);
        let index = self.len();
        self.client.events().dispatch(&LoadEvent::PreAddToCollection {
            collection_type: C::TYPE,
            config: &self.config,
            index,
            item: item.as_ref(),
        })?;

        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item.clone());

        self.client.events().dispatch(&LoadEvent::PostAddToCollection {
            collection_type: C::TYPE,
            config: &self.config,
            index,
            item: item.as_ref(),
        })
    }

    /// Appends a type-erased item after checking it is a `Model<C::Item>`.
    pub fn add(&self, item: Arc<dyn AnyModel>) -> Result<(), LoadError> {
        let actual = item.model_type();
        let typed = item
            .into_any()
            .downcast::<Model<C::Item>>()
            .map_err(|_| LoadError::InvalidItem {
                collection: C::TYPE.to_string(),
                expected: <C::Item as Resource>::TYPE.to_string(),
                actual: actual.to_string(),
            })?;
        self.push(typed)
    }

    /// Drops every item past `len`.
    pub(crate) fn truncate(&self, len: usize) {
        let _appending = self.appending.lock().unwrap_or_else(PoisonError::into_inner);
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .truncate(len);
    }

    fn snapshot(&self) -> Vec<Arc<Model<C::Item>>> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<C: CollectionResource> AnyModel for Collection<C> {
    fn model_type(&self) -> &'static str {
        C::TYPE
    }

    fn load_state(&self) -> LoadState {
        self.state()
    }

    fn parent(&self) -> Option<Arc<dyn AnyModel>> {
        Collection::parent(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<C: CollectionResource> fmt::Debug for Collection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("model_type", &C::TYPE)
            .field("state", &self.state())
            .field("len", &self.len())
            .field("args", &self.args)
            .finish()
    }
}

/// Fluent entry point returned by [`Collection::using`].
pub struct CollectionBuilder<C: CollectionResource> {
    client: Arc<Client>,
    config: LoadConfigBuilder,
    _collection: PhantomData<fn() -> C>,
}

impl<C: CollectionResource> CollectionBuilder<C> {
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config = self.config.arg(name, value);
        self
    }

    pub fn args(mut self, args: Args) -> Self {
        self.config = self.config.args(args);
        self
    }

    /// Adds an argument sent only to the count command.
    pub fn count_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config = self.config.count_arg(name, value);
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.config = self.config.max_results(max);
        self
    }

    pub fn with_parent<P: AnyModel>(mut self, parent: &Arc<P>) -> Self {
        self.config = self.config.parent(ParentRef::of(parent));
        self
    }

    pub fn clear_cache(mut self) -> Self {
        self.config = self.config.clear_cache(true);
        self
    }

    pub fn exception_handler(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.config = self.config.exception_handler(Arc::new(handler));
        self
    }

    /// Builds a collection from a chunk-shaped response; no command is issued.
    pub fn with_data(self, response: Value) -> Result<Arc<Collection<C>>, LoadError> {
        let config = self.config.data(response).build_collection::<C>()?;
        CollectionLoader::<C>::new(self.client).build(config)
    }

    pub fn load_async(self) -> Deferred<Arc<Collection<C>>> {
        match self.config.build_collection::<C>() {
            Ok(config) => CollectionLoader::<C>::new(self.client).load_async(config),
            Err(e) => Deferred::failed(e),
        }
    }

    /// Blocking form of [`CollectionBuilder::load_async`].
    pub fn load(self) -> Result<Arc<Collection<C>>, LoadError> {
        self.load_async().wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::event::EventKind;
    use crate::mock::MockTransport;
    use serde_json::json;
    use std::sync::Mutex;

    struct Label;

    impl Resource for Label {
        const TYPE: &'static str = "Label";

        fn config() -> ModelConfig {
            ModelConfig::builder("GetLabel").build()
        }
    }

    struct Milestone;

    impl Resource for Milestone {
        const TYPE: &'static str = "Milestone";

        fn config() -> ModelConfig {
            ModelConfig::builder("GetMilestone").build()
        }
    }

    struct LabelList;

    impl CollectionResource for LabelList {
        const TYPE: &'static str = "LabelList";
        type Item = Label;

        fn config() -> CollectionConfig {
            CollectionConfig::builder("ListLabels")
                .items_path("labels")
                .fixed_count(2)
                .build()
        }
    }

    #[test]
    fn test_concurrent_adds_get_distinct_indexes() {
        let client = Client::new(MockTransport::new());
        let indexes = Arc::new(Mutex::new(Vec::new()));
        let seen = indexes.clone();
        client.events().listen(EventKind::PreAddToCollection, move |event| {
            if let LoadEvent::PreAddToCollection { index, .. } = event {
                seen.lock().unwrap().push(*index);
            }
            Ok(())
        });
        let labels = Collection::<LabelList>::using(&client)
            .with_data(json!({ "labels": [] }))
            .unwrap();

        std::thread::scope(|scope| {
            for n in 0..8 {
                let labels = &labels;
                scope.spawn(move || {
                    for _ in 0..4 {
                        labels.add_data(json!({ "name": format!("label-{n}") })).unwrap();
                    }
                });
            }
        });

        let mut indexes = indexes.lock().unwrap().clone();
        indexes.sort_unstable();
        assert_eq!(indexes, (0..32).collect::<Vec<_>>());
        assert_eq!(labels.len(), 32);
    }

    #[tokio::test]
    async fn test_with_data_slices_items_without_transport() {
        let transport = MockTransport::new();
        let client = Client::new(transport.clone());

        let labels = Collection::<LabelList>::using(&client)
            .with_data(json!({ "labels": [ { "name": "bug" }, { "name": "docs" } ] }))
            .unwrap();

        assert!(labels.state().is_loaded_with_data());
        let items = labels.items().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].get("name").await.unwrap(), Some(json!("docs")));
        assert!(items[0].state().is_loaded_with_data());
        assert_eq!(items[0].parent().unwrap().model_type(), "LabelList");
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_add_rejects_foreign_item_type() {
        let client = Client::new(MockTransport::new());
        let labels = Collection::<LabelList>::using(&client)
            .with_data(json!({ "labels": [] }))
            .unwrap();

        let milestone: Arc<dyn AnyModel> = Model::<Milestone>::using(&client)
            .with_data(json!({}))
            .unwrap();
        let err = labels.add(milestone).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidItem { ref expected, ref actual, .. }
                if expected == "Label" && actual == "Milestone"
        ));

        let label: Arc<dyn AnyModel> = Model::<Label>::using(&client)
            .with_data(json!({ "name": "ui" }))
            .unwrap();
        labels.add(label).unwrap();
        assert_eq!(labels.len(), 1);
    }

    #[tokio::test]
    async fn test_add_events_wrap_each_item() {
        let client = Client::new(MockTransport::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::PreAddToCollection, EventKind::PostAddToCollection] {
            let log = log.clone();
            client.events().listen(kind, move |event| {
                if let LoadEvent::PreAddToCollection { index, item, .. }
                | LoadEvent::PostAddToCollection { index, item, .. } = event
                {
                    log.lock().unwrap().push(format!("{}:{index}:{}", event.kind(), item.model_type()));
                }
                Ok(())
            });
        }

        Collection::<LabelList>::using(&client)
            .with_data(json!({ "labels": [ {}, {} ] }))
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "pre-add-to-collection:0:Label",
                "post-add-to-collection:0:Label",
                "pre-add-to-collection:1:Label",
                "post-add-to-collection:1:Label",
            ]
        );
    }
}
