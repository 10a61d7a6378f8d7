//! Outbound transport contract and reconnection notification.
//!
//! Provides:
//! - [`Connection`], the send side records write through
//! - [`ReconnectNotifier`], which tells records the link came back after a drop
//! - [`ChannelConnection`], a transport that hands bincode frames to a tokio
//!   channel and queues them while disconnected

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::mpsc;

use crate::protocol::{Action, Message, Topic};

/// Connection state as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Send side of the protocol connection.
pub trait Connection: Send + Sync {
    /// Send a message. Fire-and-forget.
    fn send(&self, topic: Topic, action: Action, params: Vec<String>);

    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;
}

/// Callback run when the connection reopens.
pub type ReconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle identifying a reconnect registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReconnectHandle(u64);

#[derive(Default)]
struct NotifierState {
    connection: Option<ConnectionState>,
    dropped: bool,
    listeners: Vec<(ReconnectHandle, ReconnectCallback)>,
    next_id: u64,
}

/// Fires callbacks when the connection is re-established after a drop.
///
/// The first transition to `Connected` is not a reconnection.
#[derive(Default)]
pub struct ReconnectNotifier {
    state: Mutex<NotifierState>,
}

impl ReconnectNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, NotifierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a callback.
    pub fn subscribe(&self, callback: ReconnectCallback) -> ReconnectHandle {
        let mut state = self.state();
        state.next_id += 1;
        let handle = ReconnectHandle(state.next_id);
        state.listeners.push((handle, callback));
        handle
    }

    /// Remove a callback. No-op if already removed.
    pub fn unsubscribe(&self, handle: ReconnectHandle) {
        self.state().listeners.retain(|(h, _)| *h != handle);
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.state().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feed a connection state transition.
    pub fn connection_state_changed(&self, new_state: ConnectionState) {
        let callbacks: Vec<ReconnectCallback> = {
            let mut state = self.state();
            let previous = state.connection.replace(new_state);
            match new_state {
                ConnectionState::Connected if state.dropped => {
                    state.dropped = false;
                    state.listeners.iter().map(|(_, cb)| cb.clone()).collect()
                }
                ConnectionState::Connected => Vec::new(),
                _ => {
                    if previous == Some(ConnectionState::Connected) {
                        state.dropped = true;
                    }
                    Vec::new()
                }
            }
        };

        if !callbacks.is_empty() {
            log::info!("Connection re-established, notifying {} listeners", callbacks.len());
        }
        for callback in callbacks {
            callback();
        }
    }
}

/// Frames waiting for the connection to come back.
pub struct OfflineQueue {
    queue: VecDeque<Vec<u8>>,
    max_size: usize,
}

impl OfflineQueue {
    /// Create a new offline queue with max capacity.
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Queue a frame. Returns `false` when full.
    pub fn enqueue(&mut self, frame: Vec<u8>) -> bool {
        if self.queue.len() >= self.max_size {
            return false;
        }
        self.queue.push_back(frame);
        true
    }

    /// Drain all queued frames in order.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total bytes queued.
    pub fn total_bytes(&self) -> usize {
        self.queue.iter().map(Vec::len).sum()
    }
}

/// Connection that writes encoded frames into a tokio channel.
///
/// A writer task (WebSocket, TCP, test harness) owns the receiver.
pub struct ChannelConnection {
    outgoing_tx: mpsc::Sender<Vec<u8>>,
    state: RwLock<ConnectionState>,
    offline_queue: Mutex<OfflineQueue>,
    notifier: Option<Arc<ReconnectNotifier>>,
}

impl ChannelConnection {
    /// Create a connection and the receiver its writer task drains.
    ///
    /// Starts in `Connected` state.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(capacity);
        let connection = Self {
            outgoing_tx,
            state: RwLock::new(ConnectionState::Connected),
            offline_queue: Mutex::new(OfflineQueue::new(10_000)),
            notifier: None,
        };
        (connection, outgoing_rx)
    }

    /// Forward state transitions to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<ReconnectNotifier>) -> Self {
        notifier.connection_state_changed(self.state());
        self.notifier = Some(notifier);
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of frames waiting for reconnection.
    pub fn offline_queue_len(&self) -> usize {
        self.queue().len()
    }

    fn queue(&self) -> MutexGuard<'_, OfflineQueue> {
        self.offline_queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Update the connection state.
    ///
    /// Entering `Connected` flushes queued frames before the notifier runs.
    pub fn set_state(&self, new_state: ConnectionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = new_state;

        if new_state == ConnectionState::Connected {
            let queued = self.queue().drain();
            if !queued.is_empty() {
                log::info!("Replaying {} queued frames", queued.len());
            }
            for frame in queued {
                self.push(frame);
            }
        }

        if let Some(notifier) = &self.notifier {
            notifier.connection_state_changed(new_state);
        }
    }

    fn push(&self, frame: Vec<u8>) {
        if let Err(e) = self.outgoing_tx.try_send(frame) {
            log::error!("Failed to hand frame to writer: {e}");
        }
    }
}

impl Connection for ChannelConnection {
    fn send(&self, topic: Topic, action: Action, params: Vec<String>) {
        let msg = Message::new(topic, action, params);
        let frame = match msg.encode() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to encode {} message: {e}", action.code());
                return;
            }
        };

        if !self.is_open() {
            if !self.queue().enqueue(frame) {
                log::warn!("Offline queue full, dropping {} message", action.code());
            }
            return;
        }
        self.push(frame);
    }

    fn is_open(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}
