//! # logos-record — Versioned shared records for Logos
//!
//! Client-side core for named JSON documents kept consistent with a remote
//! authority using optimistic versioning.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐  set_name   ┌─────────────┐  get_record  ┌─────────────┐
//! │ AnonymousRecord│ ──────────► │ RecordCache │ ───────────► │ Record      │
//! │ (replay log)   │             │ (by name)   │ ◄─ inbound ─ │ (versioned) │
//! └────────────────┘             └─────────────┘              └──────┬──────┘
//!                                                                    │ UPDATE / PATCH
//!                                                                    ▼
//!                                                             ┌─────────────┐
//!                                                             │ Connection  │
//!                                                             │ (bincode)   │
//!                                                             └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — Wire vocabulary and bincode-encoded `Message`
//! - [`path`] — Dot/bracket path reads and writes on JSON documents
//! - [`emitter`] — Path-keyed change listeners
//! - [`record`] — Record state machine and change notification
//! - [`anonymous`] — Rebindable record proxy
//! - [`cache`] — Record acquisition and inbound routing
//! - [`connection`] — Transport contract, reconnect notification, channel transport
//! - [`timeout`] — Acknowledgment deadlines
//! - [`merge`] — Version conflict resolution
//! - [`error`] — Error types and the asynchronous error channel
//! - [`config`] — Record timing and write policy

pub mod protocol;
pub mod path;
pub mod emitter;
pub mod record;
pub mod anonymous;
pub mod cache;
pub mod connection;
pub mod timeout;
pub mod merge;
pub mod error;
pub mod config;

// Re-exports for convenience
pub use protocol::{Action, Event, Message, ProtocolError, Topic};
pub use emitter::{ChangeListener, EventListener, Listener, RecordChanged, RecordEvent, SubscriberKey};
pub use record::{ReadyListener, Record, RecordContext, RemoteUpdateHook, UNLOADED_VERSION};
pub use anonymous::{AnonymousRecord, NameChangedListener, RecordSource};
pub use cache::RecordCache;
pub use connection::{ChannelConnection, Connection, ConnectionState, OfflineQueue, ReconnectNotifier};
pub use timeout::{AckTimeoutRegistry, AckTimeouts};
pub use merge::{LocalWins, MergeError, MergeStrategy, RemoteWins};
pub use error::{ClientError, ErrorChannel, ErrorSender, LogErrors, RecordError};
pub use config::{PendingWrites, RecordConfig};
