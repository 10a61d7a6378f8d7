//! Versioned record document kept consistent with the remote authority.
//!
//! State machine:
//! ```text
//!              READ (first)                ACK DELETE / ACK UNSUBSCRIBE
//! ┌──────────┐ ───────────► ┌───────┐ ──────────────────────────────► ┌───────────┐
//! │ unloaded │              │ ready │                                  │ destroyed │
//! │ v == -1  │              │       │ ◄── READ/UPDATE/PATCH (v + 1)    │ (frozen)  │
//! └──────────┘              └───────┘ ──► gap: PATCH → SNAPSHOT request └───────────┘
//!                                         gap: READ/UPDATE → merge strategy
//! ```
//!
//! Every mutation runs inside a change bracket: values for all subscribed
//! keys are captured before the write and compared after it, and only keys
//! whose value changed notify their listeners. Listeners are always invoked
//! after the internal lock is released, so they may call back into the record.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{PendingWrites, RecordConfig};
use crate::connection::{Connection, ReconnectHandle, ReconnectNotifier};
use crate::emitter::{
    ChangeEmitter, ChangeListener, EventListener, Listener, RecordChanged, RecordEvent,
    SubscriberKey,
};
use crate::error::{ErrorChannel, RecordError};
use crate::merge::{MergeError, MergeStrategy};
use crate::path;
use crate::protocol::{convert_typed, Action, Event, Message, ProtocolError, Topic};
use crate::timeout::AckTimeouts;

/// Version of a record that has not received its first snapshot.
pub const UNLOADED_VERSION: i64 = -1;

/// Callback invoked when a record becomes ready.
pub type ReadyListener = Listener<dyn Fn(&str, &Record) + Send + Sync>;

impl Listener<dyn Fn(&str, &Record) + Send + Sync> {
    pub fn new(f: impl Fn(&str, &Record) + Send + Sync + 'static) -> Self {
        Listener::from_arc(Arc::new(f))
    }
}

/// Observer of remote updates that apply cleanly.
pub trait RemoteUpdateHook: Send + Sync {
    fn before_update(&self, name: &str);
    fn after_update(&self, name: &str);
}

/// Collaborators shared by every record of a client.
#[derive(Clone)]
pub struct RecordContext {
    pub config: RecordConfig,
    pub connection: Arc<dyn Connection>,
    pub timeouts: Arc<dyn AckTimeouts>,
    pub errors: Arc<dyn ErrorChannel>,
    pub reconnect: Arc<ReconnectNotifier>,
    /// Strategy installed on each new record
    pub merge_strategy: Option<Arc<dyn MergeStrategy>>,
}

impl RecordContext {
    pub fn new(
        connection: Arc<dyn Connection>,
        timeouts: Arc<dyn AckTimeouts>,
        errors: Arc<dyn ErrorChannel>,
    ) -> Self {
        Self {
            config: RecordConfig::default(),
            connection,
            timeouts,
            errors,
            reconnect: Arc::new(ReconnectNotifier::new()),
            merge_strategy: None,
        }
    }

    pub fn with_config(mut self, config: RecordConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reconnect(mut self, reconnect: Arc<ReconnectNotifier>) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_merge_strategy(mut self, strategy: Arc<dyn MergeStrategy>) -> Self {
        self.merge_strategy = Some(strategy);
        self
    }
}

/// A listener invocation computed under the lock and run after it.
struct Notification {
    listener: ChangeListener,
    path: Option<String>,
    data: Value,
}

/// Outbound messages and notifications produced under the lock.
///
/// Messages are sent, then listeners run, once the guard is dropped.
#[derive(Default)]
struct Effects {
    outbound: Vec<Message>,
    notifications: Vec<Notification>,
}

impl Effects {
    fn extend(&mut self, other: Effects) {
        self.outbound.extend(other.outbound);
        self.notifications.extend(other.notifications);
    }
}

/// Old values of every subscribed key, captured before a mutation.
struct ChangeBracket {
    old_values: Vec<(SubscriberKey, Option<Value>)>,
}

impl ChangeBracket {
    fn begin(state: &RecordState) -> Self {
        let mut old_values: Vec<(SubscriberKey, Option<Value>)> = state
            .subscribers
            .keys()
            .map(|key| (key.clone(), path::get(&state.data, key.path()).cloned()))
            .collect();
        // Whole-document listeners hear about a change before path listeners
        old_values.sort_by_key(|(key, _)| *key != SubscriberKey::WholeDocument);
        Self { old_values }
    }

    fn complete(self, state: &RecordState) -> Vec<Notification> {
        let mut notifications = Vec::new();
        for (key, old) in self.old_values {
            let new = path::get(&state.data, key.path());
            if old.as_ref() == new {
                continue;
            }
            let data = new.cloned().unwrap_or(Value::Null);
            for listener in state.subscribers.listeners_for(&key) {
                notifications.push(Notification {
                    listener: listener.clone(),
                    path: key.path().map(str::to_string),
                    data: data.clone(),
                });
            }
        }
        notifications
    }
}

/// Run `mutate` inside a change bracket.
///
/// The comparison runs whatever `mutate` returns, so a failed mutation still
/// reports the values it did change.
fn bracketed<R>(
    state: &mut RecordState,
    mutate: impl FnOnce(&mut RecordState) -> R,
) -> (R, Vec<Notification>) {
    let bracket = ChangeBracket::begin(state);
    let result = mutate(state);
    let notifications = bracket.complete(state);
    (result, notifications)
}

/// Payload of an inbound READ, UPDATE or PATCH.
struct RemoteUpdate {
    version: i64,
    path: Option<String>,
    data: Value,
}

impl RemoteUpdate {
    fn parse(message: &Message) -> Result<Self, ProtocolError> {
        let version = message.version_field(1)?;
        match message.action {
            Action::Patch => Ok(Self {
                version,
                path: Some(message.field(2)?.to_string()),
                data: convert_typed(message.field(3)?)?,
            }),
            _ => Ok(Self {
                version,
                path: None,
                data: message.json_field(2)?,
            }),
        }
    }
}

struct RecordState {
    version: i64,
    data: Value,
    is_ready: bool,
    is_destroyed: bool,
    /// UNSUBSCRIBE sent after the last discard, awaiting its ack
    destroy_pending: bool,
    usages: i64,
    merge_strategy: Option<Arc<dyn MergeStrategy>>,
    remote_update_hook: Option<Arc<dyn RemoteUpdateHook>>,
    subscribers: ChangeEmitter,
    once_ready_listeners: Vec<ReadyListener>,
    ready_listeners: Vec<ReadyListener>,
    event_listeners: Vec<EventListener>,
    pending_writes: Vec<(Option<String>, Value)>,
    reconnect_handle: Option<ReconnectHandle>,
}

impl RecordState {
    fn new(merge_strategy: Option<Arc<dyn MergeStrategy>>) -> Self {
        Self {
            version: UNLOADED_VERSION,
            data: Value::Object(serde_json::Map::new()),
            is_ready: false,
            is_destroyed: false,
            destroy_pending: false,
            usages: 0,
            merge_strategy,
            remote_update_hook: None,
            subscribers: ChangeEmitter::new(),
            once_ready_listeners: Vec::new(),
            ready_listeners: Vec::new(),
            event_listeners: Vec::new(),
            pending_writes: Vec::new(),
            reconnect_handle: None,
        }
    }
}

struct RecordInner {
    name: String,
    config: RecordConfig,
    connection: Arc<dyn Connection>,
    timeouts: Arc<dyn AckTimeouts>,
    errors: Arc<dyn ErrorChannel>,
    reconnect: Arc<ReconnectNotifier>,
    state: Mutex<RecordState>,
}

/// A named, versioned document synchronized with the authority.
///
/// `Record` is a cheap handle; clones share the same state.
#[derive(Clone)]
pub struct Record {
    inner: Arc<RecordInner>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Record")
            .field("name", &self.inner.name)
            .field("version", &state.version)
            .field("is_ready", &state.is_ready)
            .field("is_destroyed", &state.is_destroyed)
            .field("destroy_pending", &state.destroy_pending)
            .field("usages", &state.usages)
            .finish()
    }
}

fn send_read(connection: &dyn Connection, name: &str) {
    if connection.is_open() {
        connection.send(Topic::Record, Action::CreateOrRead, vec![name.to_string()]);
    }
}

impl Record {
    /// Create a record, request its snapshot and start the read deadlines.
    pub fn new(name: impl Into<String>, context: &RecordContext) -> Self {
        let name = name.into();
        let record = Self {
            inner: Arc::new(RecordInner {
                name: name.clone(),
                config: context.config.clone(),
                connection: context.connection.clone(),
                timeouts: context.timeouts.clone(),
                errors: context.errors.clone(),
                reconnect: context.reconnect.clone(),
                state: Mutex::new(RecordState::new(context.merge_strategy.clone())),
            }),
        };

        record.schedule_acks();
        send_read(&*record.inner.connection, &name);

        let connection = context.connection.clone();
        let resubscribe_name = name.clone();
        let handle = context.reconnect.subscribe(Arc::new(move || {
            send_read(&*connection, &resubscribe_name);
        }));
        record.state().reconnect_handle = Some(handle);

        log::info!("Created record {name}");
        record
    }

    fn state(&self) -> MutexGuard<'_, RecordState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current version, [`UNLOADED_VERSION`] before the first snapshot.
    pub fn version(&self) -> i64 {
        self.state().version
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().is_destroyed
    }

    /// Number of holders that have not discarded the record yet.
    pub fn usages(&self) -> i64 {
        self.state().usages
    }

    /// Whether the last usage was released and destruction is on its way.
    pub(crate) fn is_destroy_pending(&self) -> bool {
        self.state().destroy_pending
    }

    pub(crate) fn retain(&self) {
        self.state().usages += 1;
    }

    /// Whether two handles point at the same record.
    pub fn same(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Replace the conflict resolver. `None` makes conflicts an error.
    pub fn set_merge_strategy(&self, strategy: Option<Arc<dyn MergeStrategy>>) {
        self.state().merge_strategy = strategy;
    }

    pub fn set_remote_update_hook(&self, hook: Option<Arc<dyn RemoteUpdateHook>>) {
        self.state().remote_update_hook = hook;
    }

    /// Deep copy of the whole document.
    pub fn get(&self) -> Value {
        self.state().data.clone()
    }

    /// Deep copy of the value at `path`, `None` if it does not resolve.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        path::get(&self.state().data, Some(path)).cloned()
    }

    /// The document deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.get())
    }

    /// Replace the whole document.
    pub fn set(&self, value: impl Into<Value>) -> Result<(), RecordError> {
        self.write(None, value.into())
    }

    /// Write `value` at `path`.
    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> Result<(), RecordError> {
        self.write(Some(path), value.into())
    }

    fn write(&self, path: Option<&str>, value: Value) -> Result<(), RecordError> {
        let effects = {
            let mut state = self.state();
            self.check_alive(&state, "set")?;
            self.guarded_write(&mut state, path, value, false)
        };
        self.run(effects);
        Ok(())
    }

    /// Apply a local write, or hand it to the pending-write policy before ready.
    fn guarded_write(
        &self,
        state: &mut RecordState,
        path: Option<&str>,
        value: Value,
        force: bool,
    ) -> Effects {
        if state.is_ready {
            return self.apply_local_write(state, path, value, force);
        }
        match self.inner.config.pending_writes {
            PendingWrites::Drop => {
                log::warn!("Record {} is not ready, dropping write", self.inner.name);
            }
            PendingWrites::Queue => {
                log::debug!("Record {} is not ready, queueing write", self.inner.name);
                state.pending_writes.push((path.map(str::to_string), value));
            }
        }
        Effects::default()
    }

    /// Bump the version, write, and build the message for the authority.
    ///
    /// Without `force`, a value equal to the current one is a no-op.
    fn apply_local_write(
        &self,
        state: &mut RecordState,
        path: Option<&str>,
        value: Value,
        force: bool,
    ) -> Effects {
        let path = path.filter(|p| !p.is_empty());
        if !force && path::get(&state.data, path) == Some(&value) {
            return Effects::default();
        }

        let (message, notifications) = bracketed(state, |state| {
            state.version += 1;
            path::set(&mut state.data, path, value);
            let written = path::get(&state.data, path).unwrap_or(&Value::Null);
            match path {
                None => Message::update(&self.inner.name, state.version, written),
                Some(p) => Message::patch(&self.inner.name, state.version, p, written),
            }
        });
        Effects {
            outbound: vec![message],
            notifications,
        }
    }

    /// Listen for changes to `path`, or to the whole document when `None`.
    ///
    /// With `trigger_now`, `listener` is invoked once with the current value
    /// before this returns.
    pub fn subscribe(
        &self,
        path: Option<&str>,
        listener: &ChangeListener,
        trigger_now: bool,
    ) -> Result<(), RecordError> {
        let key = SubscriberKey::from_path(path);
        let current = {
            let mut state = self.state();
            self.check_alive(&state, "subscribe")?;
            state.subscribers.on(key.clone(), listener.clone());
            trigger_now.then(|| {
                path::get(&state.data, key.path())
                    .cloned()
                    .unwrap_or(Value::Null)
            })
        };

        if let Some(data) = current {
            (**listener)(&RecordChanged {
                name: &self.inner.name,
                path: key.path(),
                data: &data,
            });
        }
        Ok(())
    }

    /// Remove a `(path, listener)` pair. Unknown pairs are ignored.
    pub fn unsubscribe(&self, path: Option<&str>, listener: &ChangeListener) -> Result<(), RecordError> {
        let mut state = self.state();
        self.check_alive(&state, "unsubscribe")?;
        state.subscribers.off(&SubscriberKey::from_path(path), listener);
        Ok(())
    }

    /// Release one usage. The last release unsubscribes from the authority.
    pub fn discard(&self) -> Result<(), RecordError> {
        let unsubscribe = {
            let mut state = self.state();
            self.check_alive(&state, "discard")?;
            state.usages -= 1;
            let last = state.usages <= 0 && !state.destroy_pending;
            if last {
                state.destroy_pending = true;
            }
            last
        };
        if unsubscribe {
            self.inner.timeouts.register(
                Topic::Record,
                Action::Unsubscribe,
                &self.inner.name,
                Event::AckTimeout,
                self.inner.config.subscription_timeout(),
            );
            self.send_message(Message::new(
                Topic::Record,
                Action::Unsubscribe,
                vec![self.inner.name.clone()],
            ));
        }
        Ok(())
    }

    /// Delete the record on the authority.
    pub fn delete(&self) -> Result<(), RecordError> {
        self.check_alive(&self.state(), "delete")?;
        self.inner.timeouts.register(
            Topic::Record,
            Action::Delete,
            &self.inner.name,
            Event::DeleteTimeout,
            self.inner.config.delete_timeout(),
        );
        self.send_message(Message::new(
            Topic::Record,
            Action::Delete,
            vec![self.inner.name.clone()],
        ));
        Ok(())
    }

    /// Invoke `listener` once the record is ready, immediately if it already is.
    pub fn when_ready(&self, listener: &ReadyListener) {
        let ready = {
            let mut state = self.state();
            if !state.is_ready {
                state.once_ready_listeners.push(listener.clone());
            }
            state.is_ready
        };
        if ready {
            (**listener)(&self.inner.name, self);
        }
    }

    /// Invoke `listener` at every ready transition.
    pub fn add_ready_listener(&self, listener: &ReadyListener) {
        self.state().ready_listeners.push(listener.clone());
    }

    pub fn remove_ready_listener(&self, listener: &ReadyListener) {
        self.state().ready_listeners.retain(|l| l != listener);
    }

    pub fn add_event_listener(&self, listener: &EventListener) {
        let mut state = self.state();
        if !state.event_listeners.contains(listener) {
            state.event_listeners.push(listener.clone());
        }
    }

    pub fn remove_event_listener(&self, listener: &EventListener) {
        self.state().event_listeners.retain(|l| l != listener);
    }

    /// Handle an inbound message addressed to this record.
    pub fn on_message(&self, message: &Message) {
        let (destroyed, version) = {
            let state = self.state();
            (state.is_destroyed, state.version)
        };
        if destroyed {
            log::debug!(
                "Record {} is destroyed, ignoring {} message",
                self.inner.name,
                message.action.code()
            );
            return;
        }

        match message.action {
            Action::Ack => self.on_ack(message),
            Action::Read if version == UNLOADED_VERSION => self.on_read(message),
            Action::Read | Action::Update | Action::Patch => self.apply_update(message),
            _ => match message.event() {
                Some(Event::VersionExists) => self.on_version_exists(message),
                Some(Event::MessageDenied) => {
                    log::warn!("Request for record {} was denied", self.inner.name);
                    self.clear_read_timeouts();
                }
                _ => log::debug!(
                    "Record {} ignoring {} message",
                    self.inner.name,
                    message.action.code()
                ),
            },
        }
    }

    fn on_ack(&self, message: &Message) {
        self.inner.timeouts.clear_message(message);

        let acked = match message.field(0).and_then(Action::from_code) {
            Ok(action) => action,
            Err(e) => return self.report_parse_error(message, &e),
        };
        let event = match acked {
            Action::Delete => RecordEvent::Deleted,
            Action::Unsubscribe if self.is_destroy_pending() => RecordEvent::Discarded,
            Action::Unsubscribe => {
                log::debug!("Record {} got an unsubscribe ack it did not request", self.inner.name);
                return;
            }
            _ => return,
        };

        let listeners = self.state().event_listeners.clone();
        for listener in &listeners {
            (**listener)(&self.inner.name, event);
        }
        self.destroy();
    }

    fn on_read(&self, message: &Message) {
        self.clear_read_timeouts();

        let (version, data) = match (message.version_field(1), message.json_field(2)) {
            (Ok(version), Ok(data)) => (version, data),
            (Err(e), _) | (_, Err(e)) => return self.report_parse_error(message, &e),
        };

        let (effects, ready_listeners) = {
            let mut state = self.state();
            let ((), notifications) = bracketed(&mut state, |state| {
                state.version = version;
                state.data = data;
            });
            let mut effects = Effects {
                outbound: Vec::new(),
                notifications,
            };
            state.is_ready = true;

            let pending = std::mem::take(&mut state.pending_writes);
            if !pending.is_empty() {
                log::debug!("Applying {} queued writes to {}", pending.len(), self.inner.name);
            }
            for (path, value) in pending {
                effects.extend(self.apply_local_write(&mut state, path.as_deref(), value, false));
            }

            let mut ready_listeners = std::mem::take(&mut state.once_ready_listeners);
            ready_listeners.extend(state.ready_listeners.iter().cloned());
            (effects, ready_listeners)
        };

        log::debug!("Record {} ready at version {version}", self.inner.name);
        self.run(effects);
        for listener in &ready_listeners {
            (**listener)(&self.inner.name, self);
        }
    }

    fn apply_update(&self, message: &Message) {
        let update = match RemoteUpdate::parse(message) {
            Ok(update) => update,
            Err(e) => return self.report_parse_error(message, &e),
        };

        let (local_version, hook) = {
            let state = self.state();
            (state.version, state.remote_update_hook.clone())
        };
        if local_version == UNLOADED_VERSION {
            log::debug!(
                "Record {} not loaded, ignoring {} message",
                self.inner.name,
                message.action.code()
            );
            return;
        }

        if update.version != local_version + 1 {
            if message.action == Action::Patch {
                log::info!(
                    "Patch for {} skips from {local_version} to {}, requesting snapshot",
                    self.inner.name,
                    update.version
                );
                self.send_message(Message::new(
                    Topic::Record,
                    Action::Snapshot,
                    vec![self.inner.name.clone()],
                ));
            } else {
                self.recover(update.version, update.data);
            }
            return;
        }

        if let Some(hook) = &hook {
            hook.before_update(&self.inner.name);
        }

        let notifications = {
            let mut state = self.state();
            if state.is_destroyed {
                return;
            }
            let RemoteUpdate { version, path, data } = update;
            let ((), notifications) = bracketed(&mut state, |state| {
                state.version = version;
                path::set(&mut state.data, path.as_deref(), data);
            });
            notifications
        };
        self.notify(notifications);

        if let Some(hook) = &hook {
            hook.after_update(&self.inner.name);
        }
    }

    fn on_version_exists(&self, message: &Message) {
        match (message.version_field(2), message.json_field(3)) {
            (Ok(version), Ok(data)) => self.recover(version, data),
            (Err(e), _) | (_, Err(e)) => self.report_parse_error(message, &e),
        }
    }

    /// Resolve a conflict with the merge strategy and push the result.
    fn recover(&self, remote_version: i64, remote_data: Value) {
        let (strategy, local_version) = {
            let state = self.state();
            (state.merge_strategy.clone(), state.version)
        };

        let merged = match strategy {
            Some(strategy) => strategy.merge(self, &remote_data, remote_version),
            None => Err(MergeError::new("no merge strategy installed")),
        };

        match merged {
            Ok(merged) => {
                let effects = {
                    let mut state = self.state();
                    if state.is_destroyed {
                        return;
                    }
                    // An unloaded record keeps its version until the first READ
                    if state.is_ready {
                        state.version = remote_version;
                    }
                    self.guarded_write(&mut state, None, merged, true)
                };
                log::debug!(
                    "Record {} merged remote version {remote_version}",
                    self.inner.name
                );
                self.run(effects);
            }
            Err(e) => {
                self.inner.errors.report_error(
                    Topic::Record,
                    Event::VersionExists,
                    &format!(
                        "Received update for {remote_version} but version is {local_version} ({e})"
                    ),
                );
            }
        }
    }

    fn schedule_acks(&self) {
        let name = &self.inner.name;
        let config = &self.inner.config;
        self.inner.timeouts.register(
            Topic::Record,
            Action::Subscribe,
            name,
            Event::AckTimeout,
            config.read_ack_timeout(),
        );
        self.inner.timeouts.register(
            Topic::Record,
            Action::Read,
            name,
            Event::ResponseTimeout,
            config.read_timeout(),
        );
    }

    fn clear_read_timeouts(&self) {
        self.inner.timeouts.clear(Topic::Record, Action::Subscribe, &self.inner.name);
        self.inner.timeouts.clear(Topic::Record, Action::Read, &self.inner.name);
    }

    /// Terminal transition. Idempotent.
    fn destroy(&self) {
        let (handle, loaded) = {
            let mut state = self.state();
            if state.is_destroyed {
                return;
            }
            state.is_ready = false;
            state.is_destroyed = true;
            (state.reconnect_handle.take(), state.version != UNLOADED_VERSION)
        };

        // A loaded record cleared these on its first READ; the keys may now
        // belong to a replacement record of the same name
        if !loaded {
            self.clear_read_timeouts();
        }
        self.inner.timeouts.clear(Topic::Record, Action::Unsubscribe, &self.inner.name);
        self.inner.timeouts.clear(Topic::Record, Action::Delete, &self.inner.name);
        if let Some(handle) = handle {
            self.inner.reconnect.unsubscribe(handle);
        }
        log::info!("Record {} destroyed", self.inner.name);
    }

    fn check_alive(&self, state: &RecordState, action: &'static str) -> Result<(), RecordError> {
        if state.is_destroyed {
            return Err(RecordError::Destroyed {
                name: self.inner.name.clone(),
                action,
            });
        }
        Ok(())
    }

    fn send_message(&self, message: Message) {
        self.inner
            .connection
            .send(message.topic, message.action, message.data);
    }

    fn run(&self, effects: Effects) {
        for message in effects.outbound {
            self.send_message(message);
        }
        self.notify(effects.notifications);
    }

    fn notify(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            (*notification.listener)(&RecordChanged {
                name: &self.inner.name,
                path: notification.path.as_deref(),
                data: &notification.data,
            });
        }
    }

    fn report_parse_error(&self, message: &Message, error: &ProtocolError) {
        log::debug!("Record {} received malformed message: {error}", self.inner.name);
        self.inner.errors.report_error(
            Topic::Record,
            Event::MessageParseError,
            &format!(
                "{} message for record {}: {error}",
                message.action.code(),
                self.inner.name
            ),
        );
    }
}
