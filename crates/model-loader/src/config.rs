//! # Configuration
//!
//! Two kinds of configuration flow through the loaders:
//!
//! - **Per-type configuration** ([`ModelConfig`], [`CollectionConfig`]): the
//!   command names, response paths and limits a model type declares once through
//!   [`Resource::config`](crate::Resource::config) /
//!   [`CollectionResource::config`](crate::CollectionResource::config). These are
//!   validated and memoized by the [`registry`](crate::registry).
//! - **Per-call configuration** ([`LoadConfig`], [`CollectionLoadConfig`]): the
//!   arguments, parent, cache flag, handler override and pre-supplied data of a
//!   single load. Built through [`LoadConfigBuilder`], which validates the
//!   target type before producing anything.

use crate::data::Args;
use crate::error::LoadError;
use crate::exception::ExceptionHandler;
use crate::model::ParentRef;
use crate::registry;
use crate::{CollectionResource, Resource};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Post-load initialization callback run on freshly fetched data.
pub type InitCallback = Arc<dyn Fn(&mut Value) -> Result<(), String> + Send + Sync>;

// =============================================================================
// PER-TYPE CONFIGURATION
// =============================================================================

/// Read-only configuration of a single-item model type.
#[derive(Clone)]
pub struct ModelConfig {
    command: String,
    result_path: Option<String>,
    init: Vec<InitCallback>,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
}

impl ModelConfig {
    pub fn builder(command: impl Into<String>) -> ModelConfigBuilder {
        ModelConfigBuilder {
            config: ModelConfig {
                command: command.into(),
                result_path: None,
                init: Vec::new(),
                exception_handler: None,
            },
        }
    }

    /// Name of the command that fetches one model.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Dot path of the model data inside the raw response; `None` keeps the whole response.
    pub fn result_path(&self) -> Option<&str> {
        self.result_path.as_deref()
    }

    pub fn init_callbacks(&self) -> &[InitCallback] {
        &self.init
    }

    pub fn exception_handler(&self) -> Option<&Arc<dyn ExceptionHandler>> {
        self.exception_handler.as_ref()
    }

    pub fn validate(&self, model_type: &str) -> Result<(), LoadError> {
        if self.command.trim().is_empty() {
            return Err(LoadError::setup(model_type, "command name is empty"));
        }
        if matches!(self.result_path.as_deref(), Some(path) if path.trim().is_empty()) {
            return Err(LoadError::setup(model_type, "result path is empty"));
        }
        Ok(())
    }

    /// Default finalization: extract the result path, then run the init callbacks in order.
    pub fn finalize(&self, model_type: &str, raw: Value) -> Result<Value, LoadError> {
        let mut data = match self.result_path() {
            Some(path) => crate::data::lookup(&raw, path).cloned().ok_or_else(|| {
                LoadError::Finalize {
                    model_type: model_type.to_string(),
                    command: self.command.clone(),
                    reason: format!("response has no value at `{path}`"),
                }
            })?,
            None => raw,
        };
        for callback in &self.init {
            callback(&mut data).map_err(|reason| LoadError::Finalize {
                model_type: model_type.to_string(),
                command: self.command.clone(),
                reason,
            })?;
        }
        Ok(data)
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("command", &self.command)
            .field("result_path", &self.result_path)
            .field("init_callbacks", &self.init.len())
            .field("exception_handler", &self.exception_handler.is_some())
            .finish()
    }
}

/// Fluent builder for [`ModelConfig`].
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
    pub fn result_path(mut self, path: impl Into<String>) -> Self {
        self.config.result_path = Some(path.into());
        self
    }

    /// Adds a post-load initialization callback.
    pub fn on_loaded<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.config.init.push(Arc::new(callback));
        self
    }

    pub fn exception_handler(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.config.exception_handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> ModelConfig {
        self.config
    }
}

/// Read-only configuration of a collection type.
#[derive(Clone)]
pub struct CollectionConfig {
    command: String,
    count_command: Option<String>,
    count_path: String,
    items_path: String,
    per_command_max: usize,
    max_results: Option<usize>,
    offset_arg: String,
    limit_arg: String,
    fixed_count: Option<usize>,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
}

impl CollectionConfig {
    pub const DEFAULT_PER_COMMAND_MAX: usize = 100;

    pub fn builder(command: impl Into<String>) -> CollectionConfigBuilder {
        CollectionConfigBuilder {
            config: CollectionConfig {
                command: command.into(),
                count_command: None,
                count_path: "count".to_string(),
                items_path: "items".to_string(),
                per_command_max: Self::DEFAULT_PER_COMMAND_MAX,
                max_results: None,
                offset_arg: "offset".to_string(),
                limit_arg: "limit".to_string(),
                fixed_count: None,
                exception_handler: None,
            },
        }
    }

    /// Command fetching one chunk of items.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Command answering "how many items in total".
    pub fn count_command(&self) -> Option<&str> {
        self.count_command.as_deref()
    }

    pub fn count_path(&self) -> &str {
        &self.count_path
    }

    /// Dot path of the item array inside each chunk response.
    pub fn items_path(&self) -> &str {
        &self.items_path
    }

    /// Most items a single command call may return.
    pub fn per_command_max(&self) -> usize {
        self.per_command_max
    }

    /// Default ceiling on the whole collection when the caller asks for none.
    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }

    pub fn offset_arg(&self) -> &str {
        &self.offset_arg
    }

    pub fn limit_arg(&self) -> &str {
        &self.limit_arg
    }

    /// A fixed total that replaces the count query.
    pub fn fixed_count(&self) -> Option<usize> {
        self.fixed_count
    }

    pub fn exception_handler(&self) -> Option<&Arc<dyn ExceptionHandler>> {
        self.exception_handler.as_ref()
    }

    pub fn validate(&self, model_type: &str) -> Result<(), LoadError> {
        if self.command.trim().is_empty() {
            return Err(LoadError::setup(model_type, "command name is empty"));
        }
        if self.per_command_max == 0 {
            return Err(LoadError::setup(model_type, "per-command max results must be positive"));
        }
        match (&self.count_command, self.fixed_count) {
            (None, None) => {
                return Err(LoadError::setup(
                    model_type,
                    "either a count command or a fixed count is required",
                ))
            }
            (Some(command), _) if command.trim().is_empty() => {
                return Err(LoadError::setup(model_type, "count command name is empty"))
            }
            _ => {}
        }
        if self.offset_arg == self.limit_arg {
            return Err(LoadError::setup(
                model_type,
                "offset and limit arguments must have different names",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for CollectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionConfig")
            .field("command", &self.command)
            .field("count_command", &self.count_command)
            .field("count_path", &self.count_path)
            .field("items_path", &self.items_path)
            .field("per_command_max", &self.per_command_max)
            .field("max_results", &self.max_results)
            .field("fixed_count", &self.fixed_count)
            .finish()
    }
}

/// Fluent builder for [`CollectionConfig`].
pub struct CollectionConfigBuilder {
    config: CollectionConfig,
}

impl CollectionConfigBuilder {
    pub fn count_command(mut self, command: impl Into<String>) -> Self {
        self.config.count_command = Some(command.into());
        self
    }

    pub fn count_path(mut self, path: impl Into<String>) -> Self {
        self.config.count_path = path.into();
        self
    }

    pub fn items_path(mut self, path: impl Into<String>) -> Self {
        self.config.items_path = path.into();
        self
    }

    pub fn per_command_max(mut self, max: usize) -> Self {
        self.config.per_command_max = max;
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.config.max_results = Some(max);
        self
    }

    /// Argument names used for the chunk offset and limit.
    pub fn paging_args(mut self, offset: impl Into<String>, limit: impl Into<String>) -> Self {
        self.config.offset_arg = offset.into();
        self.config.limit_arg = limit.into();
        self
    }

    pub fn fixed_count(mut self, count: usize) -> Self {
        self.config.fixed_count = Some(count);
        self
    }

    pub fn exception_handler(mut self, handler: impl ExceptionHandler + 'static) -> Self {
        self.config.exception_handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> CollectionConfig {
        self.config
    }
}

// =============================================================================
// PER-CALL CONFIGURATION
// =============================================================================

/// Immutable parameters of one single-item load.
#[derive(Clone, Default)]
pub struct LoadConfig {
    args: Args,
    parent: Option<ParentRef>,
    clear_cache: bool,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
    data: Option<Value>,
}

impl LoadConfig {
    pub fn builder() -> LoadConfigBuilder {
        LoadConfigBuilder::default()
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    pub fn clear_cache(&self) -> bool {
        self.clear_cache
    }

    pub fn exception_handler(&self) -> Option<&Arc<dyn ExceptionHandler>> {
        self.exception_handler.as_ref()
    }

    /// Pre-supplied data; when present no command is issued.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

impl fmt::Debug for LoadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadConfig")
            .field("args", &self.args)
            .field("has_parent", &self.parent.is_some())
            .field("clear_cache", &self.clear_cache)
            .field("has_exception_handler", &self.exception_handler.is_some())
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

/// Immutable parameters of one collection load.
#[derive(Clone, Debug, Default)]
pub struct CollectionLoadConfig {
    base: LoadConfig,
    count_args: Args,
    max_results: Option<usize>,
}

impl CollectionLoadConfig {
    /// The fetch arguments, parent, cache flag, handler and data.
    pub fn base(&self) -> &LoadConfig {
        &self.base
    }

    /// Arguments sent to the count command.
    pub fn count_args(&self) -> &Args {
        &self.count_args
    }

    /// Caller-requested ceiling on the number of items.
    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }
}

impl From<LoadConfig> for CollectionLoadConfig {
    /// Counts with the same arguments the fetch uses.
    fn from(base: LoadConfig) -> Self {
        Self {
            count_args: base.args.clone(),
            base,
            max_results: None,
        }
    }
}

/// Fluent builder for [`LoadConfig`] and [`CollectionLoadConfig`].
#[derive(Clone, Default)]
pub struct LoadConfigBuilder {
    config: LoadConfig,
    count_args: Option<Args>,
    max_results: Option<usize>,
}

impl LoadConfigBuilder {
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.args.insert(name.into(), value.into());
        self
    }

    pub fn args(mut self, args: Args) -> Self {
        self.config.args.extend(args);
        self
    }

    pub fn parent(mut self, parent: ParentRef) -> Self {
        self.config.parent = Some(parent);
        self
    }

    pub fn clear_cache(mut self, clear: bool) -> Self {
        self.config.clear_cache = clear;
        self
    }

    pub fn exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.config.exception_handler = Some(handler);
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.config.data = Some(data);
        self
    }

    /// Adds an argument sent only to the count command.
    pub fn count_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.count_args
            .get_or_insert_with(Args::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn count_args(mut self, args: Args) -> Self {
        self.count_args.get_or_insert_with(Args::new).extend(args);
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    /// Produces the load config without naming a target type. The type's
    /// configuration is validated when a loader or factory consumes it.
    pub fn build_untyped(self) -> LoadConfig {
        self.config
    }

    /// Validates `R`'s configuration and produces the load config.
    pub fn build<R: Resource>(self) -> Result<LoadConfig, LoadError> {
        registry::model_config::<R>()?;
        Ok(self.config)
    }

    /// Validates `C`'s configuration and produces the collection load config.
    ///
    /// Without explicit count arguments the count query reuses the fetch arguments.
    pub fn build_collection<C: CollectionResource>(self) -> Result<CollectionLoadConfig, LoadError> {
        registry::collection_config::<C>()?;
        let count_args = self
            .count_args
            .unwrap_or_else(|| self.config.args.clone());
        Ok(CollectionLoadConfig {
            base: self.config,
            count_args,
            max_results: self.max_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_config_requires_positive_chunk_size() {
        let config = CollectionConfig::builder("ListIssues")
            .count_command("CountIssues")
            .per_command_max(0)
            .build();
        let err = config.validate("IssueList").unwrap_err();
        assert!(matches!(err, LoadError::Setup { ref model_type, .. } if model_type == "IssueList"));
    }

    #[test]
    fn test_collection_config_requires_a_count_source() {
        let config = CollectionConfig::builder("ListIssues").build();
        assert!(config.validate("IssueList").is_err());

        let fixed = CollectionConfig::builder("ListIssues").fixed_count(3).build();
        assert!(fixed.validate("IssueList").is_ok());
    }

    #[test]
    fn test_model_config_rejects_empty_command() {
        let config = ModelConfig::builder("  ").build();
        assert!(config.validate("Issue").is_err());
    }

    #[test]
    fn test_finalize_extracts_then_runs_callbacks() {
        let config = ModelConfig::builder("GetIssue")
            .result_path("issue")
            .on_loaded(|data| {
                data["seen"] = json!(true);
                Ok(())
            })
            .build();

        let data = config
            .finalize("Issue", json!({ "issue": { "number": 3 } }))
            .unwrap();
        assert_eq!(data, json!({ "number": 3, "seen": true }));

        let err = config.finalize("Issue", json!({ "other": 1 })).unwrap_err();
        assert!(matches!(err, LoadError::Finalize { .. }));
    }

    #[test]
    fn test_init_callback_failure_is_reported() {
        let config = ModelConfig::builder("GetIssue")
            .on_loaded(|_| Err("missing number".to_string()))
            .build();
        let err = config.finalize("Issue", json!({})).unwrap_err();
        assert!(err.to_string().contains("missing number"));
    }

    #[test]
    fn test_collection_load_config_from_base_counts_with_fetch_args() {
        let base = LoadConfig {
            args: [("state".to_string(), json!("open"))].into_iter().collect(),
            ..LoadConfig::default()
        };
        let config = CollectionLoadConfig::from(base);
        assert_eq!(config.count_args()["state"], json!("open"));
        assert_eq!(config.max_results(), None);
    }
}
