//! Core abstractions for ComfyUI realtime sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `SessionEvent` / `EventKind` - Closed set of normalized backend events
//! - `EventBus` - Typed publish/subscribe scoped to cancellable epochs
//! - `QueueStatus`, `ProgressState`, `ExecutionContext` - Derived session state
//! - `ClientConfig` - Gateway origin and command-base path
//! - Persistence and account traits

pub mod bus;
pub mod config;
pub mod context;
pub mod events;
pub mod traits;

pub use bus::{Epoch, EventBus, Handler};
pub use config::{ClientConfig, ConfigError};
pub use context::{ExecutionContext, ProgressState, QueueStatus};
pub use events::{EventKind, SessionEvent};
pub use traits::{AccountDirectory, AccountError, ConnectionPhase, IdentityStore, StorageError};
