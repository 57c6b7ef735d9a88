//! # Lifecycle Events
//!
//! Loaders publish [`LoadEvent`]s at fixed points so collaborators can hook in
//! cross-cutting concerns (auditing, cache invalidation, metrics) without the
//! loaders knowing about them.
//!
//! | Kind | Fired by | When |
//! |------|----------|------|
//! | [`EventKind::PreCount`] | [`Count`](crate::Count) | before the count command is issued |
//! | [`EventKind::PostCount`] | [`Count`](crate::Count) | after the count was extracted |
//! | [`EventKind::PreAddToCollection`] | [`Collection`](crate::Collection) | before an item is appended |
//! | [`EventKind::PostAddToCollection`] | [`Collection`](crate::Collection) | after an item is appended |
//! | [`EventKind::PreRunAll`] | [`all`](crate::all) | before any batch member is polled |
//! | [`EventKind::RunAllItem`] | [`all`](crate::all) | as each batch member fulfills |
//! | [`EventKind::PostRunAll`] | [`all`](crate::all) | after every batch member settled |
//!
//! Dispatch is synchronous and runs listeners in registration order. A listener
//! error is **not** swallowed: it aborts the dispatch and the operation that
//! triggered it with [`LoadError::Listener`].
//!
//! ```rust,ignore
//! client.events().listen(EventKind::PostCount, |event| {
//!     if let LoadEvent::PostCount { model_type, count, .. } = event {
//!         tracing::info!(model_type, count, "counted");
//!     }
//!     Ok(())
//! });
//! ```

use crate::config::CollectionConfig;
use crate::data::Args;
use crate::error::LoadError;
use crate::model::AnyModel;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

/// The hook points a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PreCount,
    PostCount,
    PreAddToCollection,
    PostAddToCollection,
    PreRunAll,
    RunAllItem,
    PostRunAll,
}

impl EventKind {
    /// Every kind, in lifecycle order.
    pub const ALL: [EventKind; 7] = [
        EventKind::PreCount,
        EventKind::PostCount,
        EventKind::PreAddToCollection,
        EventKind::PostAddToCollection,
        EventKind::PreRunAll,
        EventKind::RunAllItem,
        EventKind::PostRunAll,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::PreCount => "pre-count",
            EventKind::PostCount => "post-count",
            EventKind::PreAddToCollection => "pre-add-to-collection",
            EventKind::PostAddToCollection => "post-add-to-collection",
            EventKind::PreRunAll => "pre-run-all",
            EventKind::RunAllItem => "run-all-item",
            EventKind::PostRunAll => "post-run-all",
        };
        f.write_str(name)
    }
}

/// An event value handed to listeners. Borrowed data lives only for the dispatch.
pub enum LoadEvent<'a> {
    PreCount {
        model_type: &'a str,
        command: &'a str,
        args: &'a Args,
    },
    PostCount {
        model_type: &'a str,
        args: &'a Args,
        count: usize,
    },
    PreAddToCollection {
        collection_type: &'a str,
        config: &'a CollectionConfig,
        index: usize,
        item: &'a dyn AnyModel,
    },
    PostAddToCollection {
        collection_type: &'a str,
        config: &'a CollectionConfig,
        index: usize,
        item: &'a dyn AnyModel,
    },
    PreRunAll {
        size: usize,
        context: &'a str,
    },
    /// `value` is the fulfilled member; listeners downcast it to the batch's item type.
    RunAllItem {
        index: usize,
        value: &'a (dyn Any + Send + Sync),
        size: usize,
        context: &'a str,
    },
    PostRunAll {
        context: &'a str,
    },
}

impl LoadEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            LoadEvent::PreCount { .. } => EventKind::PreCount,
            LoadEvent::PostCount { .. } => EventKind::PostCount,
            LoadEvent::PreAddToCollection { .. } => EventKind::PreAddToCollection,
            LoadEvent::PostAddToCollection { .. } => EventKind::PostAddToCollection,
            LoadEvent::PreRunAll { .. } => EventKind::PreRunAll,
            LoadEvent::RunAllItem { .. } => EventKind::RunAllItem,
            LoadEvent::PostRunAll { .. } => EventKind::PostRunAll,
        }
    }
}

impl fmt::Debug for LoadEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadEvent::PreCount { model_type, command, args } => f
                .debug_struct("PreCount")
                .field("model_type", model_type)
                .field("command", command)
                .field("args", args)
                .finish(),
            LoadEvent::PostCount { model_type, count, .. } => f
                .debug_struct("PostCount")
                .field("model_type", model_type)
                .field("count", count)
                .finish(),
            LoadEvent::PreAddToCollection { collection_type, index, item, .. }
            | LoadEvent::PostAddToCollection { collection_type, index, item, .. } => f
                .debug_struct(if self.kind() == EventKind::PreAddToCollection {
                    "PreAddToCollection"
                } else {
                    "PostAddToCollection"
                })
                .field("collection_type", collection_type)
                .field("index", index)
                .field("item", &item.model_type())
                .finish(),
            LoadEvent::PreRunAll { size, context } => f
                .debug_struct("PreRunAll")
                .field("size", size)
                .field("context", context)
                .finish(),
            LoadEvent::RunAllItem { index, size, context, .. } => f
                .debug_struct("RunAllItem")
                .field("index", index)
                .field("size", size)
                .field("context", context)
                .finish(),
            LoadEvent::PostRunAll { context } => f
                .debug_struct("PostRunAll")
                .field("context", context)
                .finish(),
        }
    }
}

/// A registered listener. Returning `Err` aborts the triggering operation.
pub type Listener = Arc<dyn Fn(&LoadEvent<'_>) -> Result<(), String> + Send + Sync>;

/// Ordered listener lists keyed by [`EventKind`].
///
/// One dispatcher is shared by everything that uses a given
/// [`Client`](crate::Client). Listeners are expected to be registered before the
/// first load is triggered.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<HashMap<EventKind, Vec<Listener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener for `kind`.
    pub fn listen<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&LoadEvent<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(Arc::new(listener));
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Invokes every listener registered for the event's kind, in order.
    pub fn dispatch(&self, event: &LoadEvent<'_>) -> Result<(), LoadError> {
        let kind = event.kind();
        // Snapshot so listeners can themselves dispatch or register.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        for listener in listeners {
            if let Err(message) = listener(event) {
                warn!(event = %kind, error = %message, "Listener failed");
                return Err(LoadError::Listener {
                    event: kind,
                    message,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<_, _> = listeners.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_listeners_run_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let seen = seen.clone();
            dispatcher.listen(EventKind::PostRunAll, move |_| {
                seen.lock().unwrap().push(name);
                Ok(())
            });
        }

        dispatcher
            .dispatch(&LoadEvent::PostRunAll { context: "test" })
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_only_matching_kind_is_invoked() {
        let dispatcher = EventDispatcher::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        dispatcher.listen(EventKind::PreRunAll, move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        dispatcher
            .dispatch(&LoadEvent::PostRunAll { context: "test" })
            .unwrap();
        dispatcher
            .dispatch(&LoadEvent::PreRunAll { size: 2, context: "test" })
            .unwrap();
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_failing_listener_aborts_dispatch() {
        let dispatcher = EventDispatcher::new();
        let reached = Arc::new(Mutex::new(false));
        let flag = reached.clone();

        dispatcher.listen(EventKind::PreRunAll, |_| Err("audit sink offline".to_string()));
        dispatcher.listen(EventKind::PreRunAll, move |_| {
            *flag.lock().unwrap() = true;
            Ok(())
        });

        let err = dispatcher
            .dispatch(&LoadEvent::PreRunAll { size: 1, context: "test" })
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Listener { event: EventKind::PreRunAll, ref message } if message == "audit sink offline"
        ));
        assert!(!*reached.lock().unwrap());
    }
}
