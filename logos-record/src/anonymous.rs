//! Rebindable proxy over whichever [`Record`] is currently selected by name.
//!
//! Subscriptions live on the proxy, not the record. Rebinding detaches them
//! from the old record, discards it, and replays them onto the new one.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::emitter::{ChangeListener, EventListener, Listener};
use crate::error::RecordError;
use crate::record::Record;

/// Acquisition side of a record cache.
///
/// Each call hands out one usage; the caller releases it with [`Record::discard`].
pub trait RecordSource: Send + Sync {
    fn get_record(&self, name: &str) -> Record;
}

/// Callback invoked after [`AnonymousRecord::set_name`] binds a record.
pub type NameChangedListener = Listener<dyn Fn(&str, &AnonymousRecord) + Send + Sync>;

impl Listener<dyn Fn(&str, &AnonymousRecord) + Send + Sync> {
    pub fn new(f: impl Fn(&str, &AnonymousRecord) + Send + Sync + 'static) -> Self {
        Listener::from_arc(Arc::new(f))
    }
}

#[derive(Clone)]
enum Subscription {
    Change {
        path: Option<String>,
        listener: ChangeListener,
    },
    Events(EventListener),
}

impl Subscription {
    fn attach(&self, record: &Record) {
        let result = match self {
            Subscription::Change { path, listener } => {
                record.subscribe(path.as_deref(), listener, true)
            }
            Subscription::Events(listener) => {
                record.add_event_listener(listener);
                Ok(())
            }
        };
        if let Err(e) = result {
            log::warn!("Could not replay subscription: {e}");
        }
    }

    fn detach(&self, record: &Record) {
        let result = match self {
            Subscription::Change { path, listener } => record.unsubscribe(path.as_deref(), listener),
            Subscription::Events(listener) => {
                record.remove_event_listener(listener);
                Ok(())
            }
        };
        if let Err(e) = result {
            log::debug!("Could not detach subscription: {e}");
        }
    }
}

#[derive(Default)]
struct ProxyState {
    name: Option<String>,
    record: Option<Record>,
    subscriptions: Vec<Subscription>,
    name_changed: Vec<NameChangedListener>,
}

pub struct AnonymousRecord {
    source: Arc<dyn RecordSource>,
    state: Mutex<ProxyState>,
}

impl fmt::Debug for AnonymousRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("AnonymousRecord")
            .field("name", &state.name)
            .field("subscriptions", &state.subscriptions.len())
            .finish()
    }
}

impl AnonymousRecord {
    /// Create an unbound proxy acquiring records from `source`.
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            state: Mutex::new(ProxyState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ProxyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Name of the bound record.
    pub fn name(&self) -> Option<String> {
        self.state().name.clone()
    }

    /// The bound record handle.
    pub fn record(&self) -> Option<Record> {
        self.state().record.clone()
    }

    /// Bind to the record called `name`, releasing the previous one.
    pub fn set_name(&self, name: &str) {
        let (previous, subscriptions) = {
            let mut state = self.state();
            (state.record.take(), state.subscriptions.clone())
        };

        if let Some(previous) = previous.filter(|r| !r.is_destroyed()) {
            for subscription in &subscriptions {
                subscription.detach(&previous);
            }
            if let Err(e) = previous.discard() {
                log::debug!("Could not discard {}: {e}", previous.name());
            }
        }

        let record = self.source.get_record(name);
        let (subscriptions, listeners) = {
            let mut state = self.state();
            state.name = Some(name.to_string());
            state.record = Some(record.clone());
            (state.subscriptions.clone(), state.name_changed.clone())
        };

        log::debug!("AnonymousRecord bound to {name}");
        for subscription in &subscriptions {
            subscription.attach(&record);
        }
        for listener in &listeners {
            (**listener)(name, self);
        }
    }

    /// Deep copy of the bound document, `None` when unbound.
    pub fn get(&self) -> Option<Value> {
        self.record().map(|r| r.get())
    }

    /// Value at `path` in the bound document.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        self.record().and_then(|r| r.get_path(path))
    }

    pub fn set(&self, value: impl Into<Value>) -> Result<(), RecordError> {
        self.bound("set")?.set(value)
    }

    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> Result<(), RecordError> {
        self.bound("set")?.set_path(path, value)
    }

    pub fn discard(&self) -> Result<(), RecordError> {
        self.bound("discard")?.discard()
    }

    pub fn delete(&self) -> Result<(), RecordError> {
        self.bound("delete")?.delete()
    }

    /// Remember a change subscription and forward it to the bound record.
    ///
    /// `listener` sees the current value as soon as a record is bound: right
    /// away if one already is, otherwise on the next [`set_name`](Self::set_name).
    pub fn subscribe(&self, path: Option<&str>, listener: &ChangeListener) -> Result<(), RecordError> {
        let record = {
            let mut state = self.state();
            state.subscriptions.push(Subscription::Change {
                path: path.filter(|p| !p.is_empty()).map(str::to_string),
                listener: listener.clone(),
            });
            state.record.clone()
        };
        match record {
            Some(record) => record.subscribe(path, listener, true),
            None => Ok(()),
        }
    }

    /// Forget a change subscription and remove it from the bound record.
    pub fn unsubscribe(&self, path: Option<&str>, listener: &ChangeListener) -> Result<(), RecordError> {
        let path = path.filter(|p| !p.is_empty());
        let record = {
            let mut state = self.state();
            state.subscriptions.retain(|s| match s {
                Subscription::Change { path: p, listener: l } => {
                    !(p.as_deref() == path && l == listener)
                }
                Subscription::Events(_) => true,
            });
            state.record.clone()
        };
        match record {
            Some(record) => record.unsubscribe(path, listener),
            None => Ok(()),
        }
    }

    pub fn add_event_listener(&self, listener: &EventListener) {
        let record = {
            let mut state = self.state();
            state.subscriptions.push(Subscription::Events(listener.clone()));
            state.record.clone()
        };
        if let Some(record) = record {
            record.add_event_listener(listener);
        }
    }

    pub fn remove_event_listener(&self, listener: &EventListener) {
        let record = {
            let mut state = self.state();
            state
                .subscriptions
                .retain(|s| !matches!(s, Subscription::Events(l) if l == listener));
            state.record.clone()
        };
        if let Some(record) = record {
            record.remove_event_listener(listener);
        }
    }

    pub fn add_name_changed_listener(&self, listener: &NameChangedListener) {
        self.state().name_changed.push(listener.clone());
    }

    pub fn remove_name_changed_listener(&self, listener: &NameChangedListener) {
        self.state().name_changed.retain(|l| l != listener);
    }

    fn bound(&self, action: &'static str) -> Result<Record, RecordError> {
        self.record().ok_or(RecordError::Uninitialized { action })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RecordCache;
    use crate::connection::Connection;
    use crate::error::LogErrors;
    use crate::protocol::{Action, Message, Topic};
    use crate::record::RecordContext;
    use crate::timeout::AckTimeoutRegistry;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct NullConnection;

    impl Connection for NullConnection {
        fn send(&self, _topic: Topic, _action: Action, _params: Vec<String>) {}

        fn is_open(&self) -> bool {
            true
        }
    }

    /// Source that loads each record with `{"owner": name}` on first use.
    struct LoadedSource {
        context: RecordContext,
        records: Mutex<HashMap<String, Record>>,
    }

    impl LoadedSource {
        fn new() -> Arc<Self> {
            let errors = Arc::new(LogErrors);
            let context = RecordContext::new(
                Arc::new(NullConnection),
                Arc::new(AckTimeoutRegistry::new(errors.clone())),
                errors,
            );
            Arc::new(Self {
                context,
                records: Mutex::new(HashMap::new()),
            })
        }

        fn record(&self, name: &str) -> Record {
            self.records.lock().unwrap()[name].clone()
        }
    }

    impl RecordSource for LoadedSource {
        fn get_record(&self, name: &str) -> Record {
            let mut records = self.records.lock().unwrap();
            let record = match records.get(name) {
                Some(record) if !record.is_destroy_pending() => record.clone(),
                _ => {
                    let record = Record::new(name, &self.context);
                    record.on_message(&Message::read(name, 1, &json!({"owner": name})));
                    records.insert(name.to_string(), record.clone());
                    record
                }
            };
            record.retain();
            record
        }
    }

    #[test]
    fn test_unbound_proxy() {
        let proxy = AnonymousRecord::new(LoadedSource::new());
        assert_eq!(proxy.name(), None);
        assert_eq!(proxy.get(), None);
        assert_eq!(proxy.get_path("owner"), None);
        assert!(matches!(
            proxy.set(json!({})),
            Err(RecordError::Uninitialized { action: "set" })
        ));
        assert!(matches!(
            proxy.discard(),
            Err(RecordError::Uninitialized { action: "discard" })
        ));
        assert!(matches!(
            proxy.delete(),
            Err(RecordError::Uninitialized { action: "delete" })
        ));
    }

    #[test]
    fn test_set_name_forwards_reads_and_writes() {
        let source = LoadedSource::new();
        let proxy = AnonymousRecord::new(source.clone());
        proxy.set_name("userA");

        assert_eq!(proxy.name().as_deref(), Some("userA"));
        assert_eq!(proxy.get_path("owner"), Some(json!("userA")));
        proxy.set_path("age", 3).unwrap();
        assert_eq!(source.record("userA").get_path("age"), Some(json!(3)));
    }

    #[test]
    fn test_rebinding_releases_previous_record() {
        let source = LoadedSource::new();
        let proxy = AnonymousRecord::new(source.clone());
        let calls = Arc::new(Mutex::new(0));
        let sink = calls.clone();
        let listener = ChangeListener::new(move |_| *sink.lock().unwrap() += 1);
        proxy.subscribe(Some("owner"), &listener).unwrap();

        proxy.set_name("userA");
        assert_eq!(source.record("userA").usages(), 1);
        proxy.set_name("userB");
        assert_eq!(*calls.lock().unwrap(), 2);

        let user_a = source.record("userA");
        assert_eq!(user_a.usages(), 0);
        user_a.set_path("owner", "changed").unwrap();
        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(source.record("userB").usages(), 1);
    }

    #[test]
    fn test_event_listeners_move_with_binding() {
        let source = LoadedSource::new();
        let proxy = AnonymousRecord::new(source.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        proxy.add_event_listener(&EventListener::new(move |name, _| {
            sink.lock().unwrap().push(name.to_string());
        }));

        proxy.set_name("userA");
        proxy.set_name("userB");
        source.record("userA").on_message(&Message::ack(Action::Unsubscribe, "userA"));
        proxy.delete().unwrap();
        source.record("userB").on_message(&Message::ack(Action::Delete, "userB"));

        assert_eq!(*events.lock().unwrap(), vec!["userB".to_string()]);
    }

    #[test]
    fn test_name_changed_listeners() {
        let proxy = AnonymousRecord::new(LoadedSource::new());
        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = names.clone();
        let listener = NameChangedListener::new(move |name, proxy| {
            assert_eq!(proxy.name().as_deref(), Some(name));
            sink.lock().unwrap().push(name.to_string());
        });
        proxy.add_name_changed_listener(&listener);

        proxy.set_name("a");
        proxy.set_name("b");
        proxy.remove_name_changed_listener(&listener);
        proxy.set_name("c");

        assert_eq!(*names.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_subscribe_while_bound_fires_immediately() {
        let proxy = AnonymousRecord::new(LoadedSource::new());
        proxy.set_name("userA");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener = ChangeListener::new(move |change| sink.lock().unwrap().push(change.data.clone()));

        proxy.subscribe(Some("owner"), &listener).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![json!("userA")]);
    }

    #[test]
    fn test_rebinding_to_same_name_survives_unsubscribe_ack() {
        let connection = Arc::new(NullConnection);
        let errors = Arc::new(LogErrors);
        let context = RecordContext::new(
            connection,
            Arc::new(AckTimeoutRegistry::new(errors.clone())),
            errors,
        );
        let cache = Arc::new(RecordCache::new(context));
        let proxy = AnonymousRecord::new(cache.clone());

        proxy.set_name("doc");
        cache.handle_message(&Message::read("doc", 1, &json!({})));
        proxy.set_name("doc");
        cache.handle_message(&Message::ack(Action::Unsubscribe, "doc"));
        cache.handle_message(&Message::read("doc", 2, &json!({"a": 0})));

        let record = proxy.record().unwrap();
        assert!(!record.is_destroyed());
        assert_eq!(record.usages(), 1);
        proxy.set_path("a", 1).unwrap();
        assert_eq!(proxy.get_path("a"), Some(json!(1)));
        assert_eq!(record.version(), 3);
    }

    #[test]
    fn test_unsubscribe_while_unbound_is_not_replayed() {
        let proxy = AnonymousRecord::new(LoadedSource::new());
        let calls = Arc::new(Mutex::new(0));
        let sink = calls.clone();
        let listener = ChangeListener::new(move |_| *sink.lock().unwrap() += 1);

        proxy.subscribe(None, &listener).unwrap();
        proxy.unsubscribe(None, &listener).unwrap();
        proxy.set_name("userA");

        assert_eq!(*calls.lock().unwrap(), 0);
    }
}
