//! Per-provider FIFO request queue with a single drain worker.
//!
//! Enqueueing while the queue is idle flips it to draining and spawns one
//! worker task; enqueueing while draining only appends. The worker settles
//! tickets strictly in arrival order, one at a time, and flips the queue back
//! to idle when it finds it empty. A slow ticket at the head delays everything
//! behind it.

use futures::FutureExt;
use futures::future::BoxFuture;
use scrivener_cache::{Fingerprint, ResultCache};
use scrivener_error::{InferenceError, ProviderError, ProviderErrorKind, ScrivenerResult};
use scrivener_rate_limit::{ApiKey, KeyPool, RateLimiter, RetryExecutor};
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// An inference call, invoked once per attempt with the selected credential.
pub type Operation =
    Arc<dyn Fn(ApiKey) -> BoxFuture<'static, Result<String, InferenceError>> + Send + Sync>;

/// Wrap an async closure as an [`Operation`].
///
/// # Example
///
/// ```
/// use scrivener_error::InferenceError;
/// use scrivener_provider::operation;
///
/// let op = operation(|key| async move {
///     Ok::<_, InferenceError>(format!("called with key #{}", key.index()))
/// });
/// # let _ = op;
/// ```
pub fn operation<F, Fut>(f: F) -> Operation
where
    F: Fn(ApiKey) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, InferenceError>> + Send + 'static,
{
    Arc::new(move |key| f(key).boxed())
}

/// Whether a worker is currently draining the queue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueueState {
    /// No worker running
    Idle,
    /// A worker is settling tickets
    Draining,
}

/// Snapshot of a queue's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Idle or draining
    pub state: QueueState,
    /// Tickets waiting behind the one in flight
    pub pending: usize,
    /// Tickets handed to the retry executor
    pub dispatched: u64,
    /// Dispatched tickets that succeeded
    pub succeeded: u64,
    /// Dispatched tickets that failed
    pub failed: u64,
    /// Tickets settled from the cache without dispatching
    pub deduplicated: u64,
}

/// One queued unit of work.
struct Ticket {
    id: Uuid,
    fingerprint: Fingerprint,
    group: Option<String>,
    operation: Operation,
    reply: oneshot::Sender<Result<String, InferenceError>>,
    enqueued_at: Instant,
}

#[derive(Default)]
struct QueueInner {
    tickets: VecDeque<Ticket>,
    draining: bool,
    dispatched: u64,
    succeeded: u64,
    failed: u64,
    deduplicated: u64,
}

/// Everything the drain worker needs to settle a ticket.
pub(crate) struct Dispatch {
    pub(crate) provider: String,
    pub(crate) keys: KeyPool,
    pub(crate) limiter: RateLimiter,
    pub(crate) retry: RetryExecutor,
    pub(crate) cache: Arc<ResultCache>,
}

struct Shared {
    dispatch: Dispatch,
    inner: Mutex<QueueInner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// FIFO queue feeding one provider.
pub struct RequestQueue {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("provider", &self.shared.dispatch.provider)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

impl RequestQueue {
    pub(crate) fn new(dispatch: Dispatch) -> Self {
        Self {
            shared: Arc::new(Shared {
                dispatch,
                inner: Mutex::new(QueueInner::default()),
            }),
        }
    }

    pub(crate) fn dispatch(&self) -> &Dispatch {
        &self.shared.dispatch
    }

    /// Append a ticket and wait for it to settle.
    ///
    /// Dropping the returned future does not cancel the ticket; it still runs
    /// and a success is still cached.
    ///
    /// # Errors
    ///
    /// Returns the final [`InferenceError`] of the operation, or a provider
    /// error if the worker went away without settling the ticket.
    pub async fn enqueue(
        &self,
        fingerprint: Fingerprint,
        group: Option<String>,
        operation: Operation,
    ) -> ScrivenerResult<String> {
        let (reply, settled) = oneshot::channel();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            fingerprint,
            group,
            operation,
            reply,
            enqueued_at: Instant::now(),
        };
        debug!(
            provider = %self.shared.dispatch.provider,
            ticket = %ticket.id,
            fingerprint = %ticket.fingerprint,
            "Enqueued ticket"
        );

        let start_worker = {
            let mut inner = self.shared.lock();
            inner.tickets.push_back(ticket);
            !std::mem::replace(&mut inner.draining, true)
        };
        if start_worker {
            debug!(provider = %self.shared.dispatch.provider, "Queue idle, starting drain worker");
            tokio::spawn(drain(Arc::clone(&self.shared)));
        }

        match settled.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProviderError::new(ProviderErrorKind::TicketDropped(
                self.shared.dispatch.provider.clone(),
            ))
            .into()),
        }
    }

    /// Tickets waiting to be picked up by the worker.
    pub fn pending(&self) -> usize {
        self.shared.lock().tickets.len()
    }

    /// Current state.
    pub fn state(&self) -> QueueState {
        if self.shared.lock().draining {
            QueueState::Draining
        } else {
            QueueState::Idle
        }
    }

    /// Current counters.
    pub fn stats(&self) -> QueueStats {
        let inner = self.shared.lock();
        QueueStats {
            state: if inner.draining {
                QueueState::Draining
            } else {
                QueueState::Idle
            },
            pending: inner.tickets.len(),
            dispatched: inner.dispatched,
            succeeded: inner.succeeded,
            failed: inner.failed,
            deduplicated: inner.deduplicated,
        }
    }
}

/// Settle tickets until the queue is empty, then go idle.
async fn drain(shared: Arc<Shared>) {
    loop {
        let ticket = {
            let mut inner = shared.lock();
            match inner.tickets.pop_front() {
                Some(ticket) => ticket,
                None => {
                    inner.draining = false;
                    break;
                }
            }
        };
        settle(&shared, ticket).await;
    }
    debug!(provider = %shared.dispatch.provider, "Queue drained, worker idle");
}

#[instrument(
    skip_all,
    fields(provider = %shared.dispatch.provider, ticket = %ticket.id, fingerprint = %ticket.fingerprint)
)]
async fn settle(shared: &Shared, ticket: Ticket) {
    let dispatch = &shared.dispatch;

    // A ticket queued behind identical work resolves from that work's result.
    if let Some(value) = dispatch.cache.peek(&ticket.fingerprint) {
        debug!("Result cached while queued, skipping dispatch");
        shared.lock().deduplicated += 1;
        if ticket.reply.send(Ok(value)).is_err() {
            debug!("Caller went away before the ticket settled");
        }
        return;
    }

    dispatch.limiter.acquire().await;
    shared.lock().dispatched += 1;
    debug!(
        queued_ms = ticket.enqueued_at.elapsed().as_millis() as u64,
        "Dispatching ticket"
    );

    let op = &ticket.operation;
    let result = AssertUnwindSafe(dispatch.retry.run(&dispatch.keys, |key| op(key)))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(InferenceError::new("Inference operation panicked")));

    match &result {
        Ok(value) => {
            dispatch
                .cache
                .put(&ticket.fingerprint, value.clone(), ticket.group.as_deref());
            shared.lock().succeeded += 1;
            debug!("Ticket succeeded");
        }
        Err(err) => {
            shared.lock().failed += 1;
            warn!(error = %err, "Ticket failed");
        }
    }

    if ticket.reply.send(result).is_err() {
        debug!("Caller went away before the ticket settled");
    }
}
