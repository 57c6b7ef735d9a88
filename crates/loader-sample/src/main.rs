use loader_sample::lifecycle::TrackerSystem;
use loader_sample::model::{IssueInfo, IssueState, RepositoryInfo};
use loader_sample::transport::FixtureTransport;
use model_loader::tracing::setup_tracing;
use model_loader::{AnyModel, Args, ClientSettings, EventKind};
use serde_json::json;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    // Setup tracing once for the entire application
    setup_tracing();

    info!("Starting issue tracker demo");

    let transport = FixtureTransport::demo();
    let system = TrackerSystem::new(transport.clone(), &ClientSettings::from_env()).map_err(|e| e.to_string())?;

    // Preparing a model sends nothing
    let repo = system.repository("octo", "loader").await.map_err(|e| e.to_string())?;
    info!(state = %repo.state(), calls = transport.call_count(), "Repository prepared");

    let span = tracing::info_span!("repository");
    let info = async {
        info!("Reading repository");
        RepositoryInfo::of(&repo).await.map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;
    info!(full_name = %info.full_name, stars = info.stars, state = %repo.state(), "Repository loaded");

    // Open issues, paged 25 at a time
    let span = tracing::info_span!("open_issues");
    let open = async {
        let list = system
            .issues(&repo, Some(IssueState::Open), None)
            .await
            .map_err(|e| e.to_string())?;
        list.items().await.map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;
    info!(count = open.len(), "Open issues loaded");

    if let Some(first) = open.first() {
        let issue = IssueInfo::of(first).await.map_err(|e| e.to_string())?;
        info!(number = issue.number, title = %issue.title, labels = ?issue.labels, "First open issue");
    }

    // Same list again: served from the cache
    let before = transport.call_count();
    let again = system
        .issues(&repo, Some(IssueState::Open), None)
        .await
        .map_err(|e| e.to_string())?;
    let again = again.items().await.map_err(|e| e.to_string())?;
    info!(
        count = again.len(),
        extra_calls = transport.call_count() - before,
        "Open issues reloaded"
    );

    // Load by type tag
    let args: Args = [
        ("repository".to_string(), json!("octo/loader")),
        ("number".to_string(), json!(7)),
    ]
    .into_iter()
    .collect();
    match system.load_by_type("Issue", args).await {
        Ok(model) => info!(model_type = model.model_type(), "Loaded by tag"),
        Err(e) => error!(error = %e, "Load by tag failed"),
    }

    // A missing repository fails on access, through the repository's handler
    let missing = system.repository("octo", "nope").await.map_err(|e| e.to_string())?;
    if let Err(e) = missing.data().await {
        error!(error = %e, "Expected failure");
    }

    info!(
        events = system.audit().entries().len(),
        counts = system.audit().count_of(EventKind::PostCount),
        cached = system.cache_entries(),
        "Audit summary"
    );

    system.shutdown().await.map_err(|e| e.to_string())?;

    info!("Application completed successfully");
    Ok(())
}
