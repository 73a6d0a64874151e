//! HTTP command client.

use comfy_core::{ClientConfig, ConfigError};
use reqwest::{Response, multipart};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::form_urlencoded;

use crate::types::{
    AssetKind, ClearQueueRequest, PromptQueueResponse, PromptRequest, SystemStats, UploadedAsset,
};

/// Command error. Always surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("No client identity available")]
    MissingIdentity,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CommandError {
    /// HTTP status reported by the backend, if the request got that far.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Client for the backend's request/response command surface.
#[derive(Debug, Clone)]
pub struct CommandClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl CommandClient {
    /// Create a client with a default HTTP client.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http(config, reqwest::Client::new())
    }

    /// Create a client reusing `http`.
    #[must_use]
    pub const fn with_http(config: ClientConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Queue `workflow` for execution on behalf of `client_id`.
    ///
    /// # Errors
    /// Returns error if `client_id` is empty or the backend rejects the job.
    pub async fn submit_job(
        &self,
        workflow: &Value,
        client_id: &str,
    ) -> Result<PromptQueueResponse, CommandError> {
        if client_id.is_empty() {
            return Err(CommandError::MissingIdentity);
        }

        let response = self
            .http
            .post(self.config.command_url("/prompt")?)
            .json(&PromptRequest {
                prompt: workflow,
                client_id,
            })
            .send()
            .await?;
        let queued: PromptQueueResponse = json(response).await?;
        tracing::info!(prompt_id = %queued.prompt_id, number = queued.number, "Job queued");
        Ok(queued)
    }

    /// Stop the job currently executing.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn interrupt(&self) -> Result<(), CommandError> {
        let response = self
            .http
            .post(self.config.command_url("/interrupt")?)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Drop every pending job.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn clear_queue(&self) -> Result<(), CommandError> {
        let response = self
            .http
            .post(self.config.command_url("/queue")?)
            .json(&ClearQueueRequest { clear: true })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Upload an image as `file_name` into `kind`.
    ///
    /// # Errors
    /// Returns error if the upload is rejected.
    pub async fn upload_asset(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        kind: AssetKind,
        overwrite: bool,
    ) -> Result<UploadedAsset, CommandError> {
        let form = multipart::Form::new()
            .part(
                "image",
                multipart::Part::bytes(bytes).file_name(file_name.to_string()),
            )
            .text("type", kind.as_str())
            .text("overwrite", overwrite.to_string());

        let response = self
            .http
            .post(self.config.command_url("/upload/image")?)
            .multipart(form)
            .send()
            .await?;
        json(response).await
    }

    /// Query host and device information.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn system_stats(&self) -> Result<SystemStats, CommandError> {
        let response = self
            .http
            .get(self.config.command_url("/system_stats")?)
            .send()
            .await?;
        json(response).await
    }

    /// Retrieval locator for an image. Pure; no request is made.
    #[must_use]
    pub fn preview_url(&self, filename: &str, subfolder: &str, kind: AssetKind) -> String {
        self.view_url(filename, subfolder, kind.as_str())
    }

    /// [`Self::preview_url`] for an uploaded or generated asset.
    #[must_use]
    pub fn asset_url(&self, asset: &UploadedAsset) -> String {
        self.view_url(&asset.name, &asset.subfolder, &asset.kind)
    }

    fn view_url(&self, filename: &str, subfolder: &str, kind: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("filename", filename)
            .append_pair("subfolder", subfolder)
            .append_pair("type", kind)
            .finish();
        format!("{}?{query}", self.config.view_path())
    }
}

async fn check(response: Response) -> Result<Response, CommandError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(%status, "Command rejected by backend");
    Err(CommandError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T, CommandError> {
    Ok(check(response).await?.json().await?)
}
