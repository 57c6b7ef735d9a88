//! # Single-item Loader
//!
//! [`Loader<R>`] turns a [`LoadConfig`] into a [`Model<R>`]. Loading never
//! performs I/O by itself: the returned model starts [`LoadState::Waiting`]
//! with its fetch stored as a [`Deferred`], and the fetch runs on first data
//! access.
//!
//! ## Fetch pipeline
//!
//! 1. Look up the raw response in the client's cache by [`CacheHash`]. With
//!    `clear_cache` set the entry is evicted instead.
//! 2. On a miss, execute the configured command with the load arguments.
//! 3. On success, finalize the raw response ([`Resource::finalize`]) and then
//!    store it in the cache.
//! 4. On rejection, hand the failure to the [`ExceptionHandler`] in effect. A
//!    substitute response it returns is finalized but never cached.
//!
//! [`LoadState::Waiting`]: crate::LoadState::Waiting

use crate::cache_hash::CacheHash;
use crate::client::Client;
use crate::config::LoadConfig;
use crate::data::{describe_args, Args};
use crate::deferred::Deferred;
use crate::error::LoadError;
use crate::exception::{self, ExceptionHandler, FetchFailure};
use crate::model::{Model, Resource};
use crate::registry;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

/// Loads models of type `R` through one client.
pub struct Loader<R: Resource> {
    client: Arc<Client>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Loader<R> {
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            client,
            _resource: PhantomData,
        }
    }

    /// Resolves to a model for `load`. Pre-supplied data yields a
    /// `LoadedWithData` model; otherwise the model waits for first access.
    pub fn load_async(&self, load: LoadConfig) -> Deferred<Arc<Model<R>>> {
        let loader = Self::new(self.client.clone());
        let span = info_span!("load", model_type = R::TYPE);
        Deferred::new(async move { loader.build(load) }.instrument(span))
    }

    /// Blocking form of [`Loader::load_async`].
    pub fn load(&self, load: LoadConfig) -> Result<Arc<Model<R>>, LoadError> {
        self.load_async(load).wait()
    }

    #[instrument(skip_all, fields(model_type = R::TYPE))]
    pub(crate) fn build(&self, load: LoadConfig) -> Result<Arc<Model<R>>, LoadError> {
        let config = registry::model_config::<R>()?;

        if let Some(data) = load.data() {
            debug!("Model created with data");
            return Ok(Arc::new(Model::with_data(
                self.client.clone(),
                config,
                &load,
                data.clone(),
            )));
        }

        let client = self.client.clone();
        let model_config = config.clone();
        let handler = exception::resolve(load.exception_handler(), config.exception_handler());
        let args = load.args().clone();
        let clear_cache = load.clear_cache();

        let work = Deferred::new(async move {
            let fetched = fetch_raw(
                &client,
                R::TYPE,
                model_config.command(),
                &args,
                clear_cache,
                handler.as_ref(),
            )
            .await?;
            let data = R::finalize(fetched.raw.clone(), &model_config)?;
            fetched.commit(&client).await;
            info!(model_type = R::TYPE, command = model_config.command(), "Model data loaded");
            Ok(Arc::new(data))
        });

        debug!(args = %describe_args(load.args()), "Model waiting for first access");
        Ok(Arc::new(Model::waiting(self.client.clone(), config, &load, work)))
    }
}

/// A raw response and, when it came from the transport, the key to cache it under.
pub(crate) struct Fetched {
    pub(crate) raw: Value,
    store_as: Option<CacheHash>,
}

impl Fetched {
    /// Writes the response to the cache if it is eligible.
    pub(crate) async fn commit(self, client: &Client) {
        let (Some(key), Some(cache)) = (self.store_as, client.cache()) else {
            return;
        };
        if let Err(error) = cache.set(key, self.raw, None).await {
            warn!(error = %error, "Failed to cache response");
        }
    }
}

/// Runs one command with cache lookup and exception handling.
pub(crate) async fn fetch_raw(
    client: &Client,
    model_type: &str,
    command: &str,
    args: &Args,
    clear_cache: bool,
    handler: &dyn ExceptionHandler,
) -> Result<Fetched, LoadError> {
    let key = CacheHash::new(model_type, args);

    if let Some(cache) = client.cache() {
        if clear_cache {
            if let Err(error) = cache.delete(&key).await {
                warn!(model_type, error = %error, "Failed to evict cached response");
            }
        } else if let Some(raw) = cache.get(&key).await {
            debug!(model_type, command, key = %key, "Cache hit");
            return Ok(Fetched {
                raw,
                store_as: None,
            });
        }
    }

    match client.command(command, args.clone()).await {
        Ok(raw) => Ok(Fetched {
            raw,
            store_as: client.cache().map(|_| key),
        }),
        Err(error) => {
            warn!(model_type, command, error = %error, "Command rejected");
            let raw = handler.handle(FetchFailure {
                model_type: model_type.to_string(),
                command: command.to_string(),
                args: args.clone(),
                error,
            })?;
            debug!(model_type, command, "Exception handler substituted a response");
            Ok(Fetched {
                raw,
                store_as: None,
            })
        }
    }
}
