//! Wire types for command requests and responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage area an asset lives in on the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Uploaded inputs.
    #[default]
    Input,
    /// Generated outputs.
    Output,
    /// Intermediate previews.
    Temp,
}

impl AssetKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Temp => "temp",
        }
    }

    /// Parse a wire name. Unknown names yield `None`.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            "temp" => Some(Self::Temp),
            _ => None,
        }
    }
}

/// Body of a submit-job request.
#[derive(Debug, Serialize)]
pub(crate) struct PromptRequest<'a> {
    pub prompt: &'a Value,
    pub client_id: &'a str,
}

/// Body of a clear-queue request.
#[derive(Debug, Serialize)]
pub(crate) struct ClearQueueRequest {
    pub clear: bool,
}

/// Response to a submitted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptQueueResponse {
    /// Job id, matches `execution_start.prompt_id`.
    pub prompt_id: String,
    /// Position assigned by the backend queue.
    pub number: i64,
    /// Per-node validation errors keyed by node id.
    #[serde(default)]
    pub node_errors: Value,
}

impl PromptQueueResponse {
    /// Whether any node failed validation.
    #[must_use]
    pub fn has_node_errors(&self) -> bool {
        match &self.node_errors {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }
}

/// Descriptor of an uploaded asset.
///
/// `kind` keeps the backend's storage name as sent, so areas this client
/// does not know about still round-trip into retrieval URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub name: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    AssetKind::default().as_str().to_string()
}

impl UploadedAsset {
    /// Storage area, if it is one of the known kinds.
    #[must_use]
    pub fn asset_kind(&self) -> Option<AssetKind> {
        AssetKind::from_wire(&self.kind)
    }
}

/// Host information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub python_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_python: Option<bool>,
}

/// One compute device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// e.g. "cuda:0 NVIDIA GeForce RTX 4090".
    pub name: String,
    /// e.g. "cuda" or "cpu".
    #[serde(rename = "type")]
    pub kind: String,
    pub index: Option<u32>,
    /// Bytes.
    pub vram_total: u64,
    /// Bytes.
    pub vram_free: u64,
}

/// Response of the system-stats query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
    pub system: SystemInfo,
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
}

impl SystemStats {
    /// First device, usually the GPU.
    #[must_use]
    pub fn primary_device(&self) -> Option<&DeviceInfo> {
        self.devices.first()
    }
}
