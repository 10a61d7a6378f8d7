//! Path-keyed listener registry.
//!
//! Listeners are compared by identity: two clones of the same [`Listener`]
//! are equal, two listeners built from identical closures are not.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde_json::Value;

/// Reference-counted callback with identity equality.
pub struct Listener<F: ?Sized>(Arc<F>);

impl<F: ?Sized> Listener<F> {
    /// Wrap an already shared callback.
    pub fn from_arc(inner: Arc<F>) -> Self {
        Self(inner)
    }

    /// Whether `self` and `other` are the same callback.
    pub fn same(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.0) as *const () == Arc::as_ptr(&other.0) as *const ()
    }
}

impl<F: ?Sized> Clone for Listener<F> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<F: ?Sized> PartialEq for Listener<F> {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl<F: ?Sized> Eq for Listener<F> {}

impl<F: ?Sized> Deref for Listener<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.0
    }
}

impl<F: ?Sized> fmt::Debug for Listener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Payload handed to change listeners.
#[derive(Debug, Clone, Copy)]
pub struct RecordChanged<'a> {
    /// Record name
    pub name: &'a str,
    /// Subscribed path, `None` for whole-document listeners
    pub path: Option<&'a str>,
    /// New value at `path` (`null` when the path no longer resolves)
    pub data: &'a Value,
}

/// Callback invoked when a subscribed value changes.
pub type ChangeListener = Listener<dyn Fn(&RecordChanged<'_>) + Send + Sync>;

impl Listener<dyn Fn(&RecordChanged<'_>) + Send + Sync> {
    pub fn new(f: impl Fn(&RecordChanged<'_>) + Send + Sync + 'static) -> Self {
        Listener(Arc::new(f))
    }
}

/// Lifecycle events delivered to record event listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEvent {
    /// The record was deleted on the authority
    Deleted,
    /// The last holder discarded the record
    Discarded,
}

/// Callback invoked on record lifecycle events.
pub type EventListener = Listener<dyn Fn(&str, RecordEvent) + Send + Sync>;

impl Listener<dyn Fn(&str, RecordEvent) + Send + Sync> {
    pub fn new(f: impl Fn(&str, RecordEvent) + Send + Sync + 'static) -> Self {
        Listener(Arc::new(f))
    }
}

/// Subscription key: the whole document or one path inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriberKey {
    WholeDocument,
    Path(String),
}

impl SubscriberKey {
    /// Key for an optional path. Empty paths mean the whole document.
    pub fn from_path(path: Option<&str>) -> Self {
        match path {
            Some(p) if !p.is_empty() => SubscriberKey::Path(p.to_string()),
            _ => SubscriberKey::WholeDocument,
        }
    }

    /// The path, or `None` for the whole document.
    pub fn path(&self) -> Option<&str> {
        match self {
            SubscriberKey::WholeDocument => None,
            SubscriberKey::Path(p) => Some(p),
        }
    }
}

/// Change listeners grouped by key, each group in registration order.
#[derive(Debug, Default)]
pub struct ChangeEmitter {
    listeners: HashMap<SubscriberKey, Vec<ChangeListener>>,
}

impl ChangeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under `key`. Returns `false` if it was already there.
    pub fn on(&mut self, key: SubscriberKey, listener: ChangeListener) -> bool {
        let group = self.listeners.entry(key).or_default();
        if group.contains(&listener) {
            return false;
        }
        group.push(listener);
        true
    }

    /// Remove `listener` from `key`. Returns `false` if it was not registered.
    pub fn off(&mut self, key: &SubscriberKey, listener: &ChangeListener) -> bool {
        let Some(group) = self.listeners.get_mut(key) else {
            return false;
        };
        let before = group.len();
        group.retain(|l| l != listener);
        let removed = group.len() != before;
        if group.is_empty() {
            self.listeners.remove(key);
        }
        removed
    }

    /// Keys with at least one listener.
    pub fn keys(&self) -> impl Iterator<Item = &SubscriberKey> {
        self.listeners.keys()
    }

    /// Listeners under `key`, in registration order.
    pub fn listeners_for(&self, key: &SubscriberKey) -> &[ChangeListener] {
        self.listeners.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Total number of registrations across all keys.
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }
}
