//! Single-flight repaint client.
//!
//! Every [`ImageRepaintClient`] owns one background worker fed by a FIFO
//! queue. Calls run one at a time in submission order, and each call's result
//! is delivered before the next call is dispatched.

use crate::error::RepaintError;
use crate::repaint::provider::RepaintProvider;
use crate::repaint::types::{RepaintRequest, RepaintResult, SourceImage, ZoneDirective};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

type Callback = Box<dyn FnOnce(RepaintResult) + Send + 'static>;

enum Sink {
    Ticket(oneshot::Sender<RepaintResult>),
    Callback(Callback),
}

impl Sink {
    fn send(self, result: RepaintResult) {
        match self {
            Self::Ticket(tx) => {
                // Receiver gone means nobody is waiting.
                let _ = tx.send(result);
            }
            Self::Callback(callback) => {
                if std::panic::catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
                    tracing::error!("repaint callback panicked");
                }
            }
        }
    }
}

/// Where a job's result goes.
///
/// A reply dropped without a delivery (worker torn down with the runtime,
/// in-flight task aborted) still reports `Unknown` to its caller.
struct Reply {
    sink: Option<Sink>,
}

impl Reply {
    fn ticket(tx: oneshot::Sender<RepaintResult>) -> Self {
        Self {
            sink: Some(Sink::Ticket(tx)),
        }
    }

    fn callback(callback: Callback) -> Self {
        Self {
            sink: Some(Sink::Callback(callback)),
        }
    }

    fn is_abandoned(&self) -> bool {
        matches!(&self.sink, Some(Sink::Ticket(tx)) if tx.is_closed())
    }

    fn deliver(mut self, result: RepaintResult) {
        if let Some(sink) = self.sink.take() {
            sink.send(result);
        }
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.send(Err(RepaintError::Unknown(
                "repaint worker stopped before delivering a result".into(),
            )));
        }
    }
}

struct Job {
    request: RepaintRequest,
    cancel: CancelHandle,
    reply: Reply,
}

/// Cancels a queued call.
///
/// Only honored before the call is dispatched; once the request is on the
/// wire it runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Resolves to the result of one repaint call.
///
/// Dropping the ticket before dispatch skips the network call.
#[derive(Debug)]
#[must_use = "a ticket does nothing unless awaited"]
pub struct RepaintTicket {
    rx: oneshot::Receiver<RepaintResult>,
    cancel: CancelHandle,
}

impl RepaintTicket {
    /// Returns a handle that can cancel this call while it is still queued.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancels this call if it has not been dispatched yet.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Future for RepaintTicket {
    type Output = RepaintResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(RepaintError::Unknown(
                    "repaint worker stopped before delivering a result".into(),
                ))
            })
        })
    }
}

/// Serializes repaint calls onto one provider.
///
/// Cheap to clone; clones share the same worker and queue. The worker exits
/// once every clone is dropped and the queue is drained.
#[derive(Clone)]
pub struct ImageRepaintClient {
    jobs: mpsc::UnboundedSender<Job>,
    provider_name: Arc<str>,
}

impl std::fmt::Debug for ImageRepaintClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRepaintClient")
            .field("provider", &self.provider_name)
            .finish_non_exhaustive()
    }
}

impl ImageRepaintClient {
    /// Starts a client and its worker on the current tokio runtime.
    ///
    /// Fails with [`RepaintError::Unknown`] when called outside a runtime.
    pub fn new(provider: impl RepaintProvider + 'static) -> crate::Result<Self> {
        Self::with_provider(Arc::new(provider))
    }

    /// Like [`new`](Self::new), for an already shared provider.
    pub fn with_provider(provider: Arc<dyn RepaintProvider>) -> crate::Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            RepaintError::Unknown(format!("no tokio runtime to host the repaint worker: {e}"))
        })?;

        let (jobs, queue) = mpsc::unbounded_channel();
        let provider_name = Arc::from(provider.name());
        runtime.spawn(run_worker(provider, queue));

        Ok(Self {
            jobs,
            provider_name,
        })
    }

    /// Name of the provider behind this client.
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Queues a repaint of `image` and returns a ticket for its result.
    ///
    /// Never blocks. Directives are applied in the given order.
    pub fn repaint<I, D>(&self, image: SourceImage, directives: I) -> RepaintTicket
    where
        I: IntoIterator<Item = D>,
        D: Into<ZoneDirective>,
    {
        self.submit(RepaintRequest::new(image, directives))
    }

    /// Queues a prepared request.
    pub fn submit(&self, request: RepaintRequest) -> RepaintTicket {
        let (tx, rx) = oneshot::channel();
        let cancel = CancelHandle::default();
        self.enqueue(Job {
            request,
            cancel: cancel.clone(),
            reply: Reply::ticket(tx),
        });
        RepaintTicket { rx, cancel }
    }

    /// Queues a repaint and invokes `callback` with its result.
    ///
    /// The callback runs on the worker, before the next queued call is
    /// dispatched.
    pub fn repaint_with_callback<I, D, F>(
        &self,
        image: SourceImage,
        directives: I,
        callback: F,
    ) -> CancelHandle
    where
        I: IntoIterator<Item = D>,
        D: Into<ZoneDirective>,
        F: FnOnce(RepaintResult) + Send + 'static,
    {
        let cancel = CancelHandle::default();
        self.enqueue(Job {
            request: RepaintRequest::new(image, directives),
            cancel: cancel.clone(),
            reply: Reply::callback(Box::new(callback)),
        });
        cancel
    }

    fn enqueue(&self, job: Job) {
        if let Err(mpsc::error::SendError(job)) = self.jobs.send(job) {
            tracing::error!(provider = %self.provider_name, "repaint worker is not running");
            job.reply.deliver(Err(RepaintError::Unknown(
                "repaint worker is not running".into(),
            )));
        }
    }
}

async fn run_worker(provider: Arc<dyn RepaintProvider>, mut queue: mpsc::UnboundedReceiver<Job>) {
    tracing::debug!(provider = provider.name(), "repaint worker started");

    while let Some(Job {
        request,
        cancel,
        reply,
    }) = queue.recv().await
    {
        if cancel.is_cancelled() {
            tracing::debug!("repaint cancelled before dispatch");
            reply.deliver(Err(RepaintError::Cancelled));
            continue;
        }
        if reply.is_abandoned() {
            tracing::debug!("repaint ticket dropped before dispatch, skipping");
            continue;
        }
        if let Err(err) = request.validate() {
            log_failure(&err);
            reply.deliver(Err(err));
            continue;
        }

        let result = dispatch(Arc::clone(&provider), request).await;
        if let Err(ref err) = result {
            log_failure(err);
        }
        reply.deliver(result);
    }

    tracing::debug!(provider = provider.name(), "repaint worker stopped");
}

/// Runs one call in its own task so a panicking provider cannot take the
/// worker down with it.
async fn dispatch(provider: Arc<dyn RepaintProvider>, request: RepaintRequest) -> RepaintResult {
    let task = tokio::spawn(async move { provider.repaint(&request).await });
    match task.await {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(RepaintError::Unknown(format!(
            "repaint task panicked: {}",
            panic_message(err.into_panic())
        ))),
        Err(err) => Err(RepaintError::Unknown(format!("repaint task failed: {err}"))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn log_failure(err: &RepaintError) {
    match err {
        RepaintError::Unknown(message) => {
            tracing::error!(error = %message, "repaint failed unexpectedly");
        }
        RepaintError::MalformedResponse { path, detail } => {
            tracing::warn!(%path, %detail, "repaint response malformed");
        }
        other => {
            tracing::warn!(kind = other.kind(), error = %other, "repaint failed");
        }
    }
}
