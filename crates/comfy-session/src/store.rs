//! Session state store.
//!
//! The single owner of everything derived from the event stream: connection
//! phase, queue depth, progress, execution context and the live preview
//! handle. External callers only talk to [`Session`].
//!
//! Phase transitions:
//! - `Closed -> Connecting` on [`Session::connect`]; ignored while
//!   `Connecting` or `Open`.
//! - `Connecting -> Open` when the handshake succeeds and the attempt is
//!   still current. An attempt superseded by a disconnect is discarded.
//! - `Connecting -> Closed` when the handshake fails or the connect
//!   future is dropped before it resolves.
//! - `Open -> Closed` on [`Session::disconnect`] or a passive close.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use comfy_commands::{
    AssetKind, CommandClient, CommandError, PromptQueueResponse, SystemStats, UploadedAsset,
};
use comfy_core::{
    AccountDirectory, AccountError, ClientConfig, ConnectionPhase, Epoch, EventBus, EventKind,
    ExecutionContext, IdentityStore, ProgressState, QueueStatus, SessionEvent, StorageError,
};
use comfy_transport::{Demultiplexer, Transport, TransportFactory};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::preview::{PreviewHandle, PreviewRegistry};

/// Session error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Account error: {0}")]
    Account(#[from] AccountError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result of [`Session::resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Nothing was persisted.
    NoIdentity,
    /// The persisted identity is valid and a connection was attempted.
    Resumed(String),
    /// The persisted identity no longer exists; the session logged out.
    Expired(String),
}

/// Point-in-time copy of the session's observable state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub phase: ConnectionPhase,
    pub identity: Option<String>,
    pub queue: QueueStatus,
    pub progress: Option<ProgressState>,
    pub execution: ExecutionContext,
    /// URL of the live preview handle.
    pub preview_url: Option<String>,
}

#[derive(Default)]
struct State {
    phase: ConnectionPhase,
    identity: Option<String>,
    attempt: u64,
    transport: Option<Box<dyn Transport>>,
    epoch: Option<Epoch>,
    queue: QueueStatus,
    progress: Option<ProgressState>,
    execution: ExecutionContext,
    preview: Option<PreviewHandle>,
}

impl State {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            identity: self.identity.clone(),
            queue: self.queue,
            progress: self.progress,
            execution: self.execution.clone(),
            preview_url: self.preview.as_ref().map(|p| p.url().to_string()),
        }
    }
}

struct Inner {
    config: ClientConfig,
    transports: Arc<dyn TransportFactory>,
    identities: Arc<dyn IdentityStore>,
    commands: CommandClient,
    bus: Arc<EventBus>,
    previews: Arc<PreviewRegistry>,
    state: Mutex<State>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

/// Realtime session client.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Create a closed session.
    ///
    /// The identity persisted in `identities` (if any) becomes the initial
    /// identity; nothing connects until [`Session::connect`] or
    /// [`Session::resume`].
    #[must_use]
    pub fn new(
        config: ClientConfig,
        transports: Arc<dyn TransportFactory>,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        let commands = CommandClient::new(config.clone());
        Self::with_commands(config, transports, identities, commands)
    }

    /// Create a closed session using a prepared command client.
    #[must_use]
    pub fn with_commands(
        config: ClientConfig,
        transports: Arc<dyn TransportFactory>,
        identities: Arc<dyn IdentityStore>,
        commands: CommandClient,
    ) -> Self {
        let identity = identities.load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load persisted identity: {e}");
            None
        });
        let state = State {
            identity,
            ..State::default()
        };
        let (snapshot_tx, _) = watch::channel(state.snapshot());

        Self {
            inner: Arc::new(Inner {
                config,
                transports,
                identities,
                commands,
                bus: Arc::new(EventBus::new()),
                previews: Arc::new(PreviewRegistry::new()),
                state: Mutex::new(state),
                snapshot_tx,
            }),
        }
    }

    /// Create a session over WebSocket.
    #[cfg(feature = "websocket")]
    #[must_use]
    pub fn websocket(config: ClientConfig, identities: Arc<dyn IdentityStore>) -> Self {
        Self::new(
            config,
            Arc::new(comfy_transport::WsTransportFactory),
            identities,
        )
    }

    // --- Lifecycle ---

    /// Connect as `identity`.
    ///
    /// A no-op while `Connecting` or `Open`. Handshake failures are logged
    /// and leave the session `Closed`; they are never returned.
    pub async fn connect(&self, identity: &str) {
        let (attempt, mut transport) = {
            let mut state = self.inner.state.lock();
            if state.phase.is_active() {
                tracing::debug!(phase = ?state.phase, "Connect ignored, session already active");
                return;
            }
            let url = match self.inner.config.socket_url(identity) {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!("Cannot build socket URL: {e}");
                    return;
                }
            };

            state.phase = ConnectionPhase::Connecting;
            state.identity = Some(identity.to_string());
            state.attempt += 1;
            self.notify(&state);
            (state.attempt, self.inner.transports.create(url))
        };

        tracing::info!(identity, attempt, "Connecting session");
        let mut pending = PendingAttempt {
            session: self,
            attempt,
            armed: true,
        };
        let result = transport.connect().await;
        pending.armed = false;

        let mut state = self.inner.state.lock();
        if state.phase != ConnectionPhase::Connecting || state.attempt != attempt {
            tracing::info!(attempt, "Discarding superseded connection attempt");
            transport.close();
            return;
        }

        match result {
            Ok(()) => self.open(&mut state, identity, transport),
            Err(e) => {
                tracing::error!("Session connection failed: {e}");
                transport.close();
                state.phase = ConnectionPhase::Closed;
            }
        }
        self.notify(&state);
    }

    /// Tear the session down. Safe to call in any phase.
    pub fn disconnect(&self) {
        let mut state = self.inner.state.lock();
        if state.phase != ConnectionPhase::Closed {
            tracing::info!(phase = ?state.phase, "Disconnecting session");
        }
        self.teardown(&mut state);
        self.notify(&state);
    }

    /// Disconnect and forget the persisted identity.
    ///
    /// # Errors
    /// Returns error if the persisted identity cannot be cleared. The
    /// session is disconnected either way.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.disconnect();
        {
            let mut state = self.inner.state.lock();
            state.identity = None;
            self.notify(&state);
        }
        self.inner.identities.clear()?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Reconnect with the persisted identity if it still exists.
    ///
    /// # Errors
    /// Returns error if the persisted identity cannot be read or the
    /// account lookup fails. Nothing changes in that case.
    pub async fn resume(
        &self,
        accounts: &dyn AccountDirectory,
    ) -> Result<ResumeOutcome, SessionError> {
        let Some(identity) = self.inner.identities.load()? else {
            return Ok(ResumeOutcome::NoIdentity);
        };

        if accounts.exists(&identity).await? {
            self.connect(&identity).await;
            Ok(ResumeOutcome::Resumed(identity))
        } else {
            tracing::info!(identity, "Persisted identity no longer exists");
            self.logout()?;
            Ok(ResumeOutcome::Expired(identity))
        }
    }

    /// Register `identity` with `accounts`, then connect as it.
    ///
    /// # Errors
    /// Returns error if registration fails (e.g. the name is taken).
    pub async fn register(
        &self,
        accounts: &dyn AccountDirectory,
        identity: &str,
    ) -> Result<(), SessionError> {
        let identity = identity.trim();
        accounts.create(identity).await?;
        self.connect(identity).await;
        Ok(())
    }

    // --- Selectors ---

    /// Current connection phase.
    #[must_use]
    pub fn phase(&self) -> ConnectionPhase {
        self.inner.state.lock().phase
    }

    /// Identity the session is bound to.
    #[must_use]
    pub fn identity(&self) -> Option<String> {
        self.inner.state.lock().identity.clone()
    }

    /// Latest queue status.
    #[must_use]
    pub fn queue_status(&self) -> QueueStatus {
        self.inner.state.lock().queue
    }

    /// Latest progress report.
    #[must_use]
    pub fn progress(&self) -> Option<ProgressState> {
        self.inner.state.lock().progress
    }

    /// Current job and node.
    #[must_use]
    pub fn execution(&self) -> ExecutionContext {
        self.inner.state.lock().execution.clone()
    }

    /// Live preview handle.
    #[must_use]
    pub fn preview(&self) -> Option<PreviewHandle> {
        self.inner.state.lock().preview.clone()
    }

    /// Bytes of the live preview.
    #[must_use]
    pub fn preview_bytes(&self) -> Option<Bytes> {
        let handle = self.preview()?;
        self.inner.previews.resolve(handle.url())
    }

    /// Registry resolving preview handle URLs.
    #[must_use]
    pub fn previews(&self) -> Arc<PreviewRegistry> {
        Arc::clone(&self.inner.previews)
    }

    /// Copy of all observable state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.lock().snapshot()
    }

    /// Receiver notified after every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Stream of snapshots, starting with the current one.
    #[must_use]
    pub fn snapshot_stream(&self) -> WatchStream<SessionSnapshot> {
        WatchStream::new(self.watch())
    }

    /// Number of event subscriptions currently attached.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.bus.subscription_count()
    }

    // --- Commands ---

    /// Underlying command client.
    #[must_use]
    pub fn commands(&self) -> &CommandClient {
        &self.inner.commands
    }

    fn require_identity(&self, explicit: Option<&str>) -> Result<String, CommandError> {
        explicit
            .map(str::to_string)
            .or_else(|| self.identity())
            .filter(|id| !id.is_empty())
            .ok_or(CommandError::MissingIdentity)
    }

    /// Queue `workflow` as `identity`, or as the session's identity.
    ///
    /// # Errors
    /// Returns error if no identity is known or the backend rejects the job.
    pub async fn submit_job(
        &self,
        workflow: &Value,
        identity: Option<&str>,
    ) -> Result<PromptQueueResponse, CommandError> {
        let client_id = self.require_identity(identity)?;
        self.inner.commands.submit_job(workflow, &client_id).await
    }

    /// Stop the current execution.
    ///
    /// # Errors
    /// Returns error if no identity is known or the request fails.
    pub async fn interrupt(&self) -> Result<(), CommandError> {
        self.require_identity(None)?;
        self.inner.commands.interrupt().await
    }

    /// Drop every pending job.
    ///
    /// # Errors
    /// Returns error if no identity is known or the request fails.
    pub async fn clear_queue(&self) -> Result<(), CommandError> {
        self.require_identity(None)?;
        self.inner.commands.clear_queue().await
    }

    /// Upload an image.
    ///
    /// # Errors
    /// Returns error if no identity is known or the upload is rejected.
    pub async fn upload_asset(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        kind: AssetKind,
        overwrite: bool,
    ) -> Result<UploadedAsset, CommandError> {
        self.require_identity(None)?;
        self.inner
            .commands
            .upload_asset(file_name, bytes, kind, overwrite)
            .await
    }

    /// Query host and device information.
    ///
    /// # Errors
    /// Returns error if no identity is known or the request fails.
    pub async fn system_stats(&self) -> Result<SystemStats, CommandError> {
        self.require_identity(None)?;
        self.inner.commands.system_stats().await
    }

    /// Retrieval locator for an image. Pure formatting.
    #[must_use]
    pub fn preview_url(&self, filename: &str, subfolder: &str, kind: AssetKind) -> String {
        self.inner.commands.preview_url(filename, subfolder, kind)
    }

    // --- Internals ---

    fn notify(&self, state: &State) {
        self.inner.snapshot_tx.send_replace(state.snapshot());
    }

    fn open(&self, state: &mut State, identity: &str, mut transport: Box<dyn Transport>) {
        if let Err(e) = self.inner.identities.save(identity) {
            tracing::warn!("Failed to persist identity: {e}");
        }

        if let Some(stale) = state.epoch.take() {
            self.inner.bus.cancel(stale);
        }
        let epoch = self.inner.bus.begin_epoch();
        let weak = Arc::downgrade(&self.inner);
        for kind in EventKind::ALL {
            let weak: Weak<Inner> = Weak::clone(&weak);
            self.inner.bus.subscribe(kind, epoch, move |event| {
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.apply(epoch, event);
                }
            });
        }

        transport.start(Arc::new(Demultiplexer::new(Arc::clone(&self.inner.bus))));
        state.transport = Some(transport);
        state.epoch = Some(epoch);
        state.phase = ConnectionPhase::Open;
        tracing::info!(identity, generation = epoch.generation(), "Session open");
    }

    fn apply(&self, epoch: Epoch, event: &SessionEvent) {
        let mut state = self.inner.state.lock();
        if state.epoch != Some(epoch) {
            tracing::debug!(kind = %event.kind(), "Dropping event from stale epoch");
            return;
        }

        match event {
            SessionEvent::Status { queue_remaining } => {
                state.queue.remaining = *queue_remaining;
            }
            SessionEvent::Progress(progress) => {
                state.progress = Some(*progress);
            }
            SessionEvent::Executing { node } => {
                state.execution.executing_node_id.clone_from(node);
            }
            SessionEvent::ExecutionStart { prompt_id } => {
                state.execution.current_job_id = Some(prompt_id.clone());
            }
            SessionEvent::ExecutionSuccess(_) | SessionEvent::ExecutionError(_) => {
                state.progress = None;
                state.execution.clear();
            }
            SessionEvent::Preview(bytes) => {
                if let Some(previous) = state.preview.take() {
                    self.inner.previews.revoke(&previous);
                }
                state.preview = Some(self.inner.previews.create(bytes.clone()));
            }
            SessionEvent::Disconnected => {
                if state.phase == ConnectionPhase::Closed {
                    return;
                }
                tracing::info!("Session closed by remote");
                self.teardown(&mut state);
            }
        }
        self.notify(&state);
    }

    fn teardown(&self, state: &mut State) {
        if let Some(epoch) = state.epoch.take() {
            let detached = self.inner.bus.cancel(epoch);
            tracing::debug!(detached, "Cancelled subscription epoch");
        }
        if let Some(mut transport) = state.transport.take() {
            transport.close();
        }
        if let Some(preview) = state.preview.take() {
            self.inner.previews.revoke(&preview);
        }
        state.queue = QueueStatus::default();
        state.progress = None;
        state.execution.clear();
        state.phase = ConnectionPhase::Closed;
    }
}

/// Returns a `Connecting` session to `Closed` when the connect future is
/// dropped before the handshake resolves.
struct PendingAttempt<'a> {
    session: &'a Session,
    attempt: u64,
    armed: bool,
}

impl Drop for PendingAttempt<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.session.inner.state.lock();
        if state.phase == ConnectionPhase::Connecting && state.attempt == self.attempt {
            tracing::info!(attempt = self.attempt, "Connection attempt abandoned");
            state.phase = ConnectionPhase::Closed;
            self.session.notify(&state);
        }
    }
}
