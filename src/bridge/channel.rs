//! Lazily resolved backend channel
//!
//! The channel starts unresolved. Calls made before the environment provides
//! a connection are queued and handed over in issuance order once it does.
//! Resolution happens at most once; there is no reconnect path.

use super::errors::BridgeError;
use futures::future::BoxFuture;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

/// Reply to a single invoke: the backend's serialized response
pub type PendingReply = BoxFuture<'static, Result<String, BridgeError>>;

/// Backend connection made available once the environment is ready
pub trait Connection: Send + Sync + 'static {
    /// Hand `message` to the backend and return a future for its reply.
    ///
    /// The message must be submitted before this returns. The channel calls
    /// `invoke` in issuance order and relies on that to keep delivery ordered,
    /// while replies are free to complete in any order.
    fn invoke(&self, message: String) -> PendingReply;
}

impl<C: Connection> Connection for Arc<C> {
    fn invoke(&self, message: String) -> PendingReply {
        (**self).invoke(message)
    }
}

enum Queued {
    Message {
        message: String,
        reply: oneshot::Sender<Result<String, BridgeError>>,
    },
    Barrier(oneshot::Sender<()>),
}

/// Client side of the backend channel
#[derive(Clone)]
pub struct ChannelHandle {
    queue: mpsc::UnboundedSender<Queued>,
    resolved: Arc<AtomicBool>,
}

/// Readiness signal for a [`ChannelHandle`]
///
/// Consumed by [`ChannelResolver::resolve`], so a channel resolves at most once.
/// Dropping it unresolved closes the channel: queued and later calls fail with
/// [`BridgeError::ChannelClosed`].
pub struct ChannelResolver {
    ready: oneshot::Sender<Arc<dyn Connection>>,
    resolved: Arc<AtomicBool>,
}

impl ChannelResolver {
    pub fn resolve<C: Connection>(self, connection: C) {
        self.resolve_shared(Arc::new(connection));
    }

    pub fn resolve_shared(self, connection: Arc<dyn Connection>) {
        self.resolved.store(true, Ordering::Release);
        if self.ready.send(connection).is_err() {
            tracing::warn!("Channel driver stopped before the connection was resolved");
        }
    }
}

impl ChannelHandle {
    /// Create an unresolved channel and its readiness signal.
    ///
    /// Spawns the driver task on the current Tokio runtime; fails with
    /// [`BridgeError::NoRuntime`] outside one.
    pub fn new() -> Result<(Self, ChannelResolver), BridgeError> {
        let runtime = Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;

        let (queue, queued) = mpsc::unbounded_channel();
        let (ready, ready_rx) = oneshot::channel();
        let resolved = Arc::new(AtomicBool::new(false));

        runtime.spawn(drive(ready_rx, queued));

        let handle = Self {
            queue,
            resolved: Arc::clone(&resolved),
        };
        Ok((handle, ChannelResolver { ready, resolved }))
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// Queue `message` for the backend.
    ///
    /// The message is queued before this returns, whether or not the returned
    /// future is ever polled. There is no timeout: if the backend never
    /// replies, the future stays pending.
    pub fn invoke(&self, message: String) -> PendingReply {
        let (reply, reply_rx) = oneshot::channel();
        let queued = self.queue.send(Queued::Message { message, reply }).is_ok();

        Box::pin(async move {
            if !queued {
                return Err(BridgeError::ChannelClosed);
            }
            reply_rx.await.unwrap_or(Err(BridgeError::ChannelClosed))
        })
    }

    /// Wait until every message queued so far has been handed to the connection.
    ///
    /// Does not wait for replies. Before resolution this waits for resolution;
    /// it returns immediately once the channel is closed.
    pub async fn flush(&self) {
        let (done, done_rx) = oneshot::channel();
        if self.queue.send(Queued::Barrier(done)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn drive(
    ready: oneshot::Receiver<Arc<dyn Connection>>,
    mut queued: mpsc::UnboundedReceiver<Queued>,
) {
    let connection = match ready.await {
        Ok(connection) => connection,
        Err(_) => {
            tracing::warn!("Channel resolver dropped without a connection; outbound calls will fail");
            return;
        }
    };
    tracing::debug!("Backend channel resolved");

    while let Some(item) = queued.recv().await {
        match item {
            Queued::Message { message, reply } => {
                let pending = connection.invoke(message);
                tokio::spawn(async move {
                    let _ = reply.send(pending.await);
                });
            }
            Queued::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}
