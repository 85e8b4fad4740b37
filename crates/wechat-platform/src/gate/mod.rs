//! Session-gated request dispatcher.
//!
//! A [`SessionGate`] accepts calls, makes sure a session credential exists
//! before any of them reaches the transport, and transparently re-acquires the
//! credential when the platform reports it as invalid.
//!
//! # Lifecycle of a call
//!
//! 1. `submit` allocates a trace id and stores a pending entry.
//! 2. While the session is `Absent`, the first dispatch flips the gate to
//!    `Acquiring` and spawns the strategy's `acquire` hook. Every other call
//!    simply waits in the table.
//! 3. Once `Ready`, each queued entry is decorated and sent as an *attempt*
//!    with its own cancellation token.
//! 4. An attempt failing with an invalidation error cancels every other
//!    in-flight attempt, requeues all entries and starts one re-acquisition.
//!    Entries leave the table only on a terminal outcome, so aborted calls are
//!    retried once the new session is ready.
//!
//! The gate state is guarded by a single mutex that is never held across an
//! `.await`; transitions are applied before the awaited work is spawned.

mod events;
mod invalidation;
mod trace;

pub use events::{EventSink, SessionEvent};
pub use invalidation::{Deregistration, InvalidationSet};
pub use trace::{MAX_TRACE_ID, TraceId, TraceIdAllocator};

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::descriptor::RequestDescriptor;
use crate::error::{ApiError, Error, Result};
use crate::transport::Transport;

/// Credential strategy plugged into a [`SessionGate`].
#[async_trait]
pub trait SessionStrategy: Send + Sync + 'static {
    /// Whether a credential is currently held. Consulted when the gate is built.
    fn is_session_present(&self) -> bool;

    /// Obtain or refresh the credential. Runs at most once at a time per gate.
    async fn acquire(&self, transport: &dyn Transport) -> Result<()>;

    /// Attach the current credential to a per-attempt copy of the request.
    fn decorate(&self, request: &mut RequestDescriptor) -> Result<()>;

    /// Whether `error` means the session is no longer valid.
    fn is_invalidation(&self, error: &ApiError) -> bool;

    /// Called for every application error of a live attempt, before it is classified.
    fn observe_failure(&self, _error: &ApiError) {}
}

/// Session state of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Absent,
    Acquiring,
    Ready,
}

#[derive(Debug)]
struct Attempt {
    seq: u64,
    cancel: CancellationToken,
}

struct PendingCall {
    serial: u64,
    request: RequestDescriptor,
    attempt: Option<Attempt>,
    reply: oneshot::Sender<Result<Value>>,
}

struct GateState {
    session: SessionState,
    calls: BTreeMap<TraceId, PendingCall>,
    ids: TraceIdAllocator,
    serials: u64,
    attempts: u64,
    acquisitions: u64,
}

impl GateState {
    fn queued_ids(&self) -> Vec<TraceId> {
        self.calls
            .iter()
            .filter(|(_, call)| call.attempt.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Abort every in-flight attempt and put all entries back in the queue.
    fn requeue_all(&mut self) -> usize {
        let mut aborted = 0;
        for call in self.calls.values_mut() {
            if let Some(attempt) = call.attempt.take() {
                attempt.cancel.cancel();
                aborted += 1;
            }
        }
        aborted
    }

    /// Enter `Acquiring` unless an acquisition is already running.
    fn begin_acquisition(&mut self) -> bool {
        if self.session == SessionState::Acquiring {
            return false;
        }
        self.session = SessionState::Acquiring;
        self.acquisitions += 1;
        true
    }
}

/// Identity of one transport attempt.
#[derive(Debug, Clone, Copy)]
struct AttemptKey {
    id: TraceId,
    serial: u64,
    seq: u64,
}

enum Outcome {
    Resolve(Value),
    Requeue,
    Invalidate(ApiError),
    Reject(Error),
}

struct Inner<S> {
    strategy: S,
    transport: Arc<dyn Transport>,
    state: Mutex<GateState>,
}

/// Dispatcher that serializes session acquisition and retries calls across
/// credential invalidations. Cheap to clone.
pub struct SessionGate<S: SessionStrategy> {
    inner: Arc<Inner<S>>,
}

impl<S: SessionStrategy> Clone for SessionGate<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SessionStrategy> fmt::Debug for SessionGate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SessionGate")
            .field("session", &state.session)
            .field("pending", &state.calls.len())
            .finish()
    }
}

impl<S: SessionStrategy> SessionGate<S> {
    pub fn new(strategy: S, transport: Arc<dyn Transport>) -> Self {
        Self::with_config(strategy, transport, &GateConfig::default())
    }

    pub fn with_config(strategy: S, transport: Arc<dyn Transport>, config: &GateConfig) -> Self {
        let session = if strategy.is_session_present() {
            SessionState::Ready
        } else {
            SessionState::Absent
        };
        Self {
            inner: Arc::new(Inner {
                strategy,
                transport,
                state: Mutex::new(GateState {
                    session,
                    calls: BTreeMap::new(),
                    ids: TraceIdAllocator::with_limit(config.trace_id_limit),
                    serials: 0,
                    attempts: 0,
                    acquisitions: 0,
                }),
            }),
        }
    }

    pub fn strategy(&self) -> &S {
        &self.inner.strategy
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.lock().session
    }

    /// Number of calls that have not reached a terminal outcome.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().calls.len()
    }

    /// Number of acquisitions started over the gate's lifetime.
    pub fn acquisitions(&self) -> u64 {
        self.inner.state.lock().acquisitions
    }

    /// Register a call. The entry is stored before this returns; the returned
    /// future only waits for the outcome.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, request: RequestDescriptor) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        let id = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            match state.ids.allocate(&state.calls) {
                Some(id) => {
                    state.serials += 1;
                    state.calls.insert(
                        id,
                        PendingCall {
                            serial: state.serials,
                            request,
                            attempt: None,
                            reply: tx,
                        },
                    );
                    id
                }
                None => {
                    warn!(pending = state.calls.len(), "Trace id space exhausted");
                    let _ = tx.send(Err(Error::Saturated));
                    return PendingReply { rx };
                }
            }
        };
        debug!(trace_id = id, "Call submitted");
        self.inner.start(id);
        PendingReply { rx }
    }

    /// Submit and deserialize the payload.
    pub async fn call<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T> {
        let value = self.submit(request).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Mark an externally installed credential as usable and flush the queue.
    ///
    /// Has no effect while an acquisition is running; its outcome wins.
    pub fn session_installed(&self) {
        let queued = {
            let mut state = self.inner.state.lock();
            if state.session == SessionState::Acquiring {
                return;
            }
            state.session = SessionState::Ready;
            state.queued_ids()
        };
        for id in queued {
            self.inner.start(id);
        }
    }
}

impl<S: SessionStrategy> Inner<S> {
    fn start(self: &Arc<Self>, id: TraceId) {
        let (key, cancel, mut request) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            match state.session {
                SessionState::Acquiring => return,
                SessionState::Absent => {
                    state.begin_acquisition();
                    drop(guard);
                    self.spawn_acquire();
                    return;
                }
                SessionState::Ready => {}
            }
            let Some(call) = state.calls.get_mut(&id) else {
                return;
            };
            if call.attempt.is_some() {
                return;
            }
            state.attempts += 1;
            let seq = state.attempts;
            let cancel = CancellationToken::new();
            call.attempt = Some(Attempt {
                seq,
                cancel: cancel.clone(),
            });
            let key = AttemptKey {
                id,
                serial: call.serial,
                seq,
            };
            (key, cancel, call.request.clone())
        };

        if let Err(err) = self.strategy.decorate(&mut request) {
            self.apply(key, Outcome::Reject(err));
            return;
        }

        debug!(trace_id = id, attempt = key.seq, "Dispatching call");
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = inner.transport.send(request, cancel).await;
            inner.complete(key, result);
        });
    }

    fn spawn_acquire(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            debug!("Acquiring session");
            // A panicking hook must still leave `Acquiring`, or every queued call hangs.
            let result = AssertUnwindSafe(inner.strategy.acquire(inner.transport.as_ref()))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(&*payload))));
            inner.finish_acquire(result);
        });
    }

    fn finish_acquire(self: &Arc<Self>, result: Result<()>) {
        match result {
            Ok(()) => {
                let queued = {
                    let mut state = self.state.lock();
                    state.session = SessionState::Ready;
                    state.queued_ids()
                };
                info!(queued = queued.len(), "Session acquired");
                for id in queued {
                    self.start(id);
                }
            }
            Err(err) => {
                let drained = {
                    let mut state = self.state.lock();
                    state.session = SessionState::Absent;
                    std::mem::take(&mut state.calls)
                };
                warn!(error = %err, rejected = drained.len(), "Session acquisition failed");
                let cause = Arc::new(err);
                for call in drained.into_values() {
                    if let Some(attempt) = call.attempt {
                        attempt.cancel.cancel();
                    }
                    let _ = call.reply.send(Err(Error::Acquisition(Arc::clone(&cause))));
                }
            }
        }
    }

    fn is_current(&self, key: AttemptKey) -> bool {
        let state = self.state.lock();
        state.calls.get(&key.id).is_some_and(|call| {
            call.serial == key.serial && call.attempt.as_ref().is_some_and(|a| a.seq == key.seq)
        })
    }

    fn complete(self: &Arc<Self>, key: AttemptKey, result: Result<Value>) {
        // Late successes still count; late failures belong to an aborted attempt.
        if result.is_err() && !self.is_current(key) {
            debug!(trace_id = key.id, attempt = key.seq, "Ignoring superseded attempt");
            return;
        }
        let outcome = match result {
            Ok(value) => Outcome::Resolve(value),
            Err(Error::Cancelled) => Outcome::Requeue,
            Err(Error::Api(err)) => {
                self.strategy.observe_failure(&err);
                if self.strategy.is_invalidation(&err) {
                    Outcome::Invalidate(err)
                } else {
                    Outcome::Reject(Error::Api(err))
                }
            }
            Err(err) => Outcome::Reject(err),
        };
        self.apply(key, outcome);
    }

    fn apply(self: &Arc<Self>, key: AttemptKey, outcome: Outcome) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(call) = state.calls.get_mut(&key.id) else {
            return;
        };
        if call.serial != key.serial {
            return;
        }
        let current = call.attempt.as_ref().is_some_and(|a| a.seq == key.seq);

        match outcome {
            Outcome::Resolve(value) => {
                let Some(call) = state.calls.remove(&key.id) else {
                    return;
                };
                drop(guard);
                if let Some(attempt) = call.attempt {
                    attempt.cancel.cancel();
                }
                debug!(trace_id = key.id, "Call resolved");
                let _ = call.reply.send(Ok(value));
            }
            _ if !current => {}
            Outcome::Requeue => {
                call.attempt = None;
            }
            Outcome::Invalidate(err) => {
                let aborted = state.requeue_all();
                let start = state.begin_acquisition();
                drop(guard);
                info!(
                    trace_id = key.id,
                    code = err.code,
                    aborted,
                    "Session invalidated"
                );
                if start {
                    self.spawn_acquire();
                }
            }
            Outcome::Reject(err) => {
                let Some(call) = state.calls.remove(&key.id) else {
                    return;
                };
                drop(guard);
                debug!(trace_id = key.id, error = %err, "Call rejected");
                let _ = call.reply.send(Err(err));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Future returned by [`SessionGate::submit`].
#[must_use = "the call keeps running, but its outcome is lost if the reply is dropped"]
pub struct PendingReply {
    rx: oneshot::Receiver<Result<Value>>,
}

impl Future for PendingReply {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}
