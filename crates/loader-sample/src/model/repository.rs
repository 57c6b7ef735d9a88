use model_loader::{LoadError, Model, ModelConfig, Resource, StatusAware};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A hosted repository, fetched by owner and name.
///
/// The loaded data gains a derived `full_name` (`owner/name`) that collection
/// loads use as their `repository` argument.
pub struct Repository;

impl Resource for Repository {
    const TYPE: &'static str = "Repository";

    fn config() -> ModelConfig {
        ModelConfig::builder("GetRepository")
            .result_path("repository")
            .on_loaded(|data| {
                let owner = data.get("owner").and_then(Value::as_str).ok_or("repository without owner")?;
                let name = data.get("name").and_then(Value::as_str).ok_or("repository without name")?;
                data["full_name"] = json!(format!("{owner}/{name}"));
                Ok(())
            })
            .exception_handler(
                StatusAware::new(["Repository lookup failed"])
                    .on_status_wrap(404, ["Repository not found"]),
            )
            .build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub stars: u64,
    #[serde(default)]
    pub description: Option<String>,
}

impl RepositoryInfo {
    /// Decodes the whole model, fetching it if needed.
    pub async fn of(model: &Model<Repository>) -> Result<Self, LoadError> {
        model.decode("").await
    }
}
