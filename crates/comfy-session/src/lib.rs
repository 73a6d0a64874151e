//! Session state store for ComfyUI realtime sessions.
//!
//! Provides:
//! - `Session` - Connection state machine, derived state and command facade
//! - `PreviewRegistry` - Revocable handles for binary preview frames
//! - Identity persistence (memory, JSON profile file)
//! - Account directories (memory, filesystem folders)

pub mod accounts;
pub mod preview;
pub mod store;
pub mod storage;

pub use accounts::{DirAccounts, MemoryAccounts};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use store::{ResumeOutcome, Session, SessionError, SessionSnapshot};
pub use storage::{FileIdentityStore, MemoryIdentityStore};
