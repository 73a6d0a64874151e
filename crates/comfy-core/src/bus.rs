//! Typed publish/subscribe with epoch-scoped subscriptions.
//!
//! Every subscription belongs to exactly one [`Epoch`]. An epoch is a
//! generation number: beginning a new one or cancelling the current one bumps
//! the bus generation and drops every handler registered under the old value
//! in a single write. Handlers captured in an in-flight `publish` re-check the
//! generation before running, so a cancelled epoch never observes another
//! event.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;

use crate::{EventKind, SessionEvent};

/// Event handler. Invoked synchronously; return value is ignored.
pub type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Cancellation token for one subscription set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Epoch {
    generation: u64,
}

impl Epoch {
    /// Generation number of this epoch.
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

#[derive(Clone)]
struct Subscription {
    generation: u64,
    handler: Handler,
}

/// Event bus keyed by [`EventKind`].
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<Subscription>>>,
    generation: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create an empty bus with no live epoch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Start a new epoch, detaching every subscription of the previous one.
    pub fn begin_epoch(&self) -> Epoch {
        let mut handlers = self.handlers.write();
        let stale: usize = handlers.values().map(Vec::len).sum();
        handlers.clear();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if stale > 0 {
            tracing::debug!(stale, generation, "Dropped stale subscriptions");
        }
        Epoch { generation }
    }

    /// Whether `epoch` is the live epoch.
    #[must_use]
    pub fn is_live(&self, epoch: Epoch) -> bool {
        self.generation.load(Ordering::SeqCst) == epoch.generation
    }

    /// Register `handler` for `kind` under `epoch`.
    ///
    /// Returns `false` and registers nothing if `epoch` is no longer live.
    pub fn subscribe<F>(&self, kind: EventKind, epoch: Epoch, handler: F) -> bool
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write();
        if !self.is_live(epoch) {
            return false;
        }
        handlers.entry(kind).or_default().push(Subscription {
            generation: epoch.generation,
            handler: Arc::new(handler),
        });
        true
    }

    /// Cancel `epoch`, detaching all of its subscriptions at once.
    ///
    /// Returns the number of detached handlers. Cancelling an epoch that is
    /// already dead is a no-op.
    pub fn cancel(&self, epoch: Epoch) -> usize {
        let mut handlers = self.handlers.write();
        if self
            .generation
            .compare_exchange(
                epoch.generation,
                epoch.generation + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return 0;
        }

        let mut detached = 0;
        for subs in handlers.values_mut() {
            let before = subs.len();
            subs.retain(|s| s.generation != epoch.generation);
            detached += before - subs.len();
        }
        handlers.retain(|_, subs| !subs.is_empty());
        detached
    }

    /// Deliver `event` to every attached handler for its kind, in
    /// registration order. Returns how many handlers ran.
    pub fn publish(&self, event: &SessionEvent) -> usize {
        let snapshot: Vec<Subscription> = self
            .handlers
            .read()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for sub in snapshot {
            // A handler earlier in this pass may have cancelled the epoch.
            if self.generation.load(Ordering::SeqCst) != sub.generation {
                continue;
            }
            (sub.handler)(event);
            delivered += 1;
        }
        delivered
    }

    /// Total attached subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }
}
