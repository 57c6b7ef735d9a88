//! # Count Query
//!
//! Before a collection is fetched, its total size is asked with a separate
//! count command. The answer decides how many chunk commands are issued.
//!
//! A count failure is never silently defaulted: a rejected command, a missing
//! field or a non-numeric value all surface as [`LoadError::Count`] carrying the
//! model type, command and count arguments.

use crate::client::Client;
use crate::config::CollectionConfig;
use crate::data::{describe_args, lookup, Args};
use crate::deferred::Deferred;
use crate::error::{CommandError, LoadError};
use crate::event::LoadEvent;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Count;

impl Count {
    /// Resolves to the total number of items `model_type` holds for `args`.
    ///
    /// Dispatches [`LoadEvent::PreCount`] before issuing the command and
    /// [`LoadEvent::PostCount`] with the extracted value.
    pub fn get_async(
        client: Arc<Client>,
        config: Arc<CollectionConfig>,
        model_type: &'static str,
        args: Args,
    ) -> Deferred<usize> {
        Deferred::new(async move {
            let Some(command) = config.count_command() else {
                return Err(count_error(model_type, "", &args, "no count command configured", None));
            };

            client.events().dispatch(&LoadEvent::PreCount {
                model_type,
                command,
                args: &args,
            })?;

            let raw = client
                .command(command, args.clone())
                .await
                .map_err(|e| {
                    warn!(model_type, command, error = %e, "Count command rejected");
                    count_error(model_type, command, &args, "command rejected", Some(e))
                })?;

            let count = parse_count(&raw, config.count_path())
                .map_err(|reason| count_error(model_type, command, &args, &reason, None))?;
            debug!(model_type, command, count, "Counted");

            client.events().dispatch(&LoadEvent::PostCount {
                model_type,
                args: &args,
                count,
            })?;
            Ok(count)
        })
    }

    /// Blocking form of [`Count::get_async`].
    pub fn get(
        client: Arc<Client>,
        config: Arc<CollectionConfig>,
        model_type: &'static str,
        args: Args,
    ) -> Result<usize, LoadError> {
        Self::get_async(client, config, model_type, args).wait()
    }
}

fn count_error(
    model_type: &str,
    command: &str,
    args: &Args,
    reason: &str,
    source: Option<CommandError>,
) -> LoadError {
    LoadError::Count {
        model_type: model_type.to_string(),
        command: command.to_string(),
        args: describe_args(args),
        reason: reason.to_string(),
        source,
    }
}

/// Reads a non-negative integer, given as a number or a numeric string.
fn parse_count(raw: &Value, path: &str) -> Result<usize, String> {
    let value = lookup(raw, path).ok_or_else(|| format!("response has no value at `{path}`"))?;
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| format!("value at `{path}` is not a count: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_count_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_count(&json!({ "count": 25 }), "count"), Ok(25));
        assert_eq!(parse_count(&json!({ "meta": { "total": "12" } }), "meta.total"), Ok(12));
        assert_eq!(parse_count(&json!(3), ""), Ok(3));
    }

    #[test]
    fn test_parse_count_rejects_everything_else() {
        assert!(parse_count(&json!({}), "count").is_err());
        assert!(parse_count(&json!({ "count": -1 }), "count").is_err());
        assert!(parse_count(&json!({ "count": 2.5 }), "count").is_err());
        assert!(parse_count(&json!({ "count": "many" }), "count").is_err());
        assert!(parse_count(&json!({ "count": null }), "count").is_err());
    }
}
