use model_loader::{EventKind, LoadEvent};
use std::sync::{Arc, Mutex};

/// Append-only record of every lifecycle event a [`TrackerSystem`](super::TrackerSystem) saw.
///
/// Clones share the same log.
#[derive(Clone, Default)]
pub struct AuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub kind: EventKind,
    pub detail: String,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: &LoadEvent<'_>) {
        let detail = match event {
            LoadEvent::PreCount { model_type, command, .. } => format!("{model_type} via {command}"),
            LoadEvent::PostCount { model_type, count, .. } => format!("{model_type} = {count}"),
            LoadEvent::PreAddToCollection { collection_type, index, item, .. }
            | LoadEvent::PostAddToCollection { collection_type, index, item, .. } => {
                format!("{collection_type}[{index}] <- {}", item.model_type())
            }
            LoadEvent::PreRunAll { size, context } => format!("{context} x{size}"),
            LoadEvent::RunAllItem { index, size, context, .. } => format!("{context} {}/{size}", index + 1),
            LoadEvent::PostRunAll { context } => context.to_string(),
        };
        self.lock().push(AuditEntry {
            kind: event.kind(),
            detail,
        });
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    pub fn count_of(&self, kind: EventKind) -> usize {
        self.lock().iter().filter(|entry| entry.kind == kind).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditEntry>> {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_loader::Args;

    #[test]
    fn test_record_and_count() {
        let log = AuditLog::new();
        let args = Args::new();
        log.record(&LoadEvent::PreCount {
            model_type: "IssueList",
            command: "CountIssues",
            args: &args,
        });
        log.record(&LoadEvent::PostCount {
            model_type: "IssueList",
            args: &args,
            count: 3,
        });

        assert_eq!(log.count_of(EventKind::PreCount), 1);
        assert_eq!(log.entries()[1].detail, "IssueList = 3");

        let shared = log.clone();
        shared.clear();
        assert!(log.entries().is_empty());
    }
}
