//! Command client for the ComfyUI backend.
//!
//! Provides:
//! - `CommandClient` - submit, interrupt, clear, upload, system stats
//! - Wire types for command responses
//! - Pure preview URL builder

pub mod client;
pub mod types;

pub use client::{CommandClient, CommandError};
pub use types::{AssetKind, DeviceInfo, PromptQueueResponse, SystemInfo, SystemStats, UploadedAsset};
