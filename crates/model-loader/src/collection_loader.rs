//! # Collection Loader
//!
//! Loads a [`Collection<C>`] in chunks. On first item access:
//!
//! 1. The total comes from [`Count`], or from the configured fixed count.
//! 2. The overall maximum is the smaller of the total and the requested (or
//!    configured default) maximum.
//! 3. [`plan_chunks`] splits that maximum into chunks of at most
//!    `per_command_max` items.
//! 4. One fetch per chunk is driven concurrently through [`all`], so the
//!    run-all events fire around the batch.
//! 5. The chunk responses are sliced at the items path and concatenated in
//!    chunk order; each slice becomes one child model.
//!
//! | total | per command | max | chunks (offset, limit) |
//! |-------|-------------|-----|------------------------|
//! | 25 | 10 | 25 | (0,10) (10,10) (20,5) |
//! | 25 | 10 | 12 | (0,10) (10,2) |
//! | 0 | 10 | any | none |

use crate::client::Client;
use crate::collection::{Collection, CollectionResource};
use crate::config::{CollectionConfig, CollectionLoadConfig};
use crate::count::Count;
use crate::data::{lookup, merge_args, Args};
use crate::deferred::{all, Deferred};
use crate::error::LoadError;
use crate::exception;
use crate::loader::fetch_raw;
use crate::registry;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use tracing::{debug, info, info_span, warn, Instrument};

/// One page of a collection fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub offset: usize,
    pub limit: usize,
}

impl Chunk {
    /// `base` with the offset and limit inserted under the configured names.
    pub fn apply(&self, base: &Args, offset_arg: &str, limit_arg: &str) -> Args {
        let mut paging = Args::new();
        paging.insert(offset_arg.to_string(), Value::from(self.offset));
        paging.insert(limit_arg.to_string(), Value::from(self.limit));
        merge_args(base, paging)
    }
}

/// Splits `min(total, requested_max)` items into chunks of at most `per_command_max`.
pub fn plan_chunks(total: usize, requested_max: Option<usize>, per_command_max: usize) -> Vec<Chunk> {
    let overall_max = requested_max.map_or(total, |max| max.min(total));
    if overall_max == 0 || per_command_max == 0 {
        return Vec::new();
    }
    (0..overall_max.div_ceil(per_command_max))
        .map(|i| {
            let offset = i * per_command_max;
            Chunk {
                offset,
                limit: per_command_max.min(overall_max - offset),
            }
        })
        .filter(|chunk| chunk.limit > 0)
        .collect()
}

/// The item array at `items_path`. Missing or null means no items.
pub(crate) fn slice_items(
    model_type: &str,
    command: &str,
    response: &Value,
    items_path: &str,
) -> Result<Vec<Value>, LoadError> {
    match lookup(response, items_path) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(LoadError::Finalize {
            model_type: model_type.to_string(),
            command: command.to_string(),
            reason: format!("value at `{items_path}` is not a list: {other}"),
        }),
    }
}

/// Loads collections of type `C` through one client.
pub struct CollectionLoader<C: CollectionResource> {
    client: Arc<Client>,
    _collection: PhantomData<fn() -> C>,
}

impl<C: CollectionResource> CollectionLoader<C> {
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            client,
            _collection: PhantomData,
        }
    }

    pub fn load_async(&self, load: CollectionLoadConfig) -> Deferred<Arc<Collection<C>>> {
        let loader = Self::new(self.client.clone());
        let span = info_span!("load_collection", model_type = C::TYPE);
        Deferred::new(async move { loader.build(load) }.instrument(span))
    }

    /// Blocking form of [`CollectionLoader::load_async`].
    pub fn load(&self, load: CollectionLoadConfig) -> Result<Arc<Collection<C>>, LoadError> {
        self.load_async(load).wait()
    }

    pub(crate) fn build(&self, load: CollectionLoadConfig) -> Result<Arc<Collection<C>>, LoadError> {
        let config = registry::collection_config::<C>()?;
        registry::model_config::<C::Item>()?;

        if let Some(response) = load.base().data() {
            debug!(model_type = C::TYPE, "Collection created with data");
            return Collection::from_response(self.client.clone(), config, &load, response);
        }

        let client = self.client.clone();
        let fetch_config = config.clone();
        let fetch_load = load.clone();
        Ok(Collection::waiting(
            self.client.clone(),
            config,
            &load,
            move |this| Deferred::new(populate(client, fetch_config, fetch_load, this)),
        ))
    }
}

async fn populate<C: CollectionResource>(
    client: Arc<Client>,
    config: Arc<CollectionConfig>,
    load: CollectionLoadConfig,
    this: Weak<Collection<C>>,
) -> Result<(), LoadError> {
    let items = fetch_items::<C>(&client, &config, &load).await?;
    let collection = this.upgrade().ok_or_else(|| LoadError::Cancelled {
        model_type: C::TYPE.to_string(),
        args: crate::data::describe_args(load.base().args()),
        clear_cache: load.base().clear_cache(),
        reason: "collection dropped while loading".to_string(),
    })?;

    let size = items.len();
    let before = collection.len();
    for item in items {
        if let Err(error) = collection.add_data(item) {
            collection.truncate(before);
            warn!(model_type = C::TYPE, error = %error, "Collection population aborted");
            return Err(error);
        }
    }
    info!(model_type = C::TYPE, items = size, "Collection loaded");
    Ok(())
}

async fn fetch_items<C: CollectionResource>(
    client: &Arc<Client>,
    config: &Arc<CollectionConfig>,
    load: &CollectionLoadConfig,
) -> Result<Vec<Value>, LoadError> {
    let total = match config.fixed_count() {
        Some(count) => count,
        None => {
            Count::get_async(client.clone(), config.clone(), C::TYPE, load.count_args().clone())
                .await?
        }
    };

    let requested_max = load.max_results().or(config.max_results());
    let chunks = plan_chunks(total, requested_max, config.per_command_max());
    info!(model_type = C::TYPE, total, chunks = chunks.len(), "Fetching collection");
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let handler = exception::resolve(load.base().exception_handler(), config.exception_handler());
    let clear_cache = load.base().clear_cache();
    let batch = chunks
        .iter()
        .map(|chunk| {
            let args = chunk.apply(load.base().args(), config.offset_arg(), config.limit_arg());
            let client = client.clone();
            let config = config.clone();
            let handler = handler.clone();
            Deferred::new(async move {
                let command = config.command();
                let fetched =
                    fetch_raw(&client, C::TYPE, command, &args, clear_cache, handler.as_ref()).await?;
                let items = slice_items(C::TYPE, command, &fetched.raw, config.items_path())?;
                fetched.commit(&client).await;
                Ok(items)
            })
        })
        .collect();

    let pages = all(batch, C::TYPE, client.events().clone()).await?;
    Ok(pages.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(chunks: &[Chunk]) -> Vec<(usize, usize)> {
        chunks.iter().map(|c| (c.offset, c.limit)).collect()
    }

    #[test]
    fn test_plan_chunks_splits_total() {
        assert_eq!(pairs(&plan_chunks(25, Some(25), 10)), vec![(0, 10), (10, 10), (20, 5)]);
        assert_eq!(pairs(&plan_chunks(25, None, 10)), vec![(0, 10), (10, 10), (20, 5)]);
        assert_eq!(pairs(&plan_chunks(25, Some(12), 10)), vec![(0, 10), (10, 2)]);
        assert_eq!(pairs(&plan_chunks(20, Some(100), 10)), vec![(0, 10), (10, 10)]);
    }

    #[test]
    fn test_plan_chunks_empty_cases() {
        assert!(plan_chunks(0, Some(50), 10).is_empty());
        assert!(plan_chunks(40, Some(0), 10).is_empty());
        assert!(plan_chunks(40, None, 0).is_empty());
    }

    #[test]
    fn test_chunk_args_keep_base_order() {
        let mut base = Args::new();
        base.insert("state".into(), json!("open"));
        let args = Chunk { offset: 20, limit: 5 }.apply(&base, "start", "count");
        let keys: Vec<_> = args.keys().cloned().collect();
        assert_eq!(keys, vec!["state", "start", "count"]);
        assert_eq!(args["start"], json!(20));
        assert_eq!(args["count"], json!(5));
    }

    #[test]
    fn test_slice_items_tolerates_missing_but_not_scalars() {
        assert!(slice_items("L", "List", &json!({}), "items").unwrap().is_empty());
        assert!(slice_items("L", "List", &json!({ "items": null }), "items").unwrap().is_empty());
        assert_eq!(
            slice_items("L", "List", &json!({ "items": [1, 2] }), "items").unwrap(),
            vec![json!(1), json!(2)]
        );
        assert!(slice_items("L", "List", &json!({ "items": 3 }), "items").is_err());
    }
}
