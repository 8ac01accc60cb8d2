//! Routes decoded messages to the handlers registered for their method

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tower_lsp::jsonrpc::Error as RpcError;
use tracing::{debug, error, warn};

use crate::lsp::error::HandlerError;
use crate::lsp::message::{Message, MessageKind};
use crate::lsp::session::Session;

/// One unit of work triggered by a message
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, session: Arc<Session>, message: Arc<Message>)
    -> Result<(), HandlerError>;
}

/// Handler run queued behind earlier ordered messages
struct Job {
    handler: Arc<dyn Handler>,
    session: Arc<Session>,
    message: Arc<Message>,
    done: oneshot::Sender<()>,
}

/// Method-to-handlers table.
///
/// Every handler runs under a supervisor that logs errors and turns panics
/// into [`HandlerError::Fault`], so one handler going wrong never affects
/// another or the read loop. Handlers registered with
/// [`register_ordered`](Self::register_ordered) share one worker and run one
/// at a time in emission order; all others get a task of their own.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Vec<Arc<dyn Handler>>>,
    ordered: HashSet<String>,
    queue: OnceLock<mpsc::UnboundedSender<Job>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the list for `method`
    pub fn register(&mut self, method: &str, handler: Arc<dyn Handler>) {
        self.handlers
            .entry(method.to_string())
            .or_default()
            .push(handler);
    }

    /// Like [`register`](Self::register), but messages for `method` are
    /// handled strictly in the order they were emitted.
    pub fn register_ordered(&mut self, method: &str, handler: Arc<dyn Handler>) {
        self.register(method, handler);
        self.ordered.insert(method.to_string());
    }

    pub fn is_ordered(&self, method: &str) -> bool {
        self.ordered.contains(method)
    }

    pub fn has_handlers(&self, method: &str) -> bool {
        self.handlers
            .get(method)
            .is_some_and(|handlers| !handlers.is_empty())
    }

    /// Starts every handler for the message's method and returns their tasks.
    ///
    /// A request nobody handles is answered with `MethodNotFound`; unhandled
    /// notifications and client responses are dropped.
    pub fn emit(&self, session: &Arc<Session>, message: Message) -> Vec<JoinHandle<()>> {
        let kind = message.kind();
        let handlers = match kind {
            MessageKind::Request | MessageKind::Notification => {
                self.handlers.get(message.method()).cloned().unwrap_or_default()
            }
            MessageKind::Response => {
                debug!(id = ?message.id, "Dropping client response");
                return Vec::new();
            }
            MessageKind::Invalid => {
                warn!("Dropping message without id or method");
                return Vec::new();
            }
        };

        if handlers.is_empty() {
            if kind == MessageKind::Request {
                return vec![spawn_method_not_found(Arc::clone(session), message)];
            }
            debug!(method = message.method(), "No handler for notification");
            return Vec::new();
        }

        let ordered = self.is_ordered(message.method());
        let message = Arc::new(message);
        handlers
            .into_iter()
            .map(|handler| {
                let session = Arc::clone(session);
                let message = Arc::clone(&message);
                if ordered {
                    self.enqueue(handler, session, message)
                } else {
                    tokio::spawn(supervise(handler, session, message))
                }
            })
            .collect()
    }

    /// Queues an ordered handler run; the returned task ends once it ran
    fn enqueue(
        &self,
        handler: Arc<dyn Handler>,
        session: Arc<Session>,
        message: Arc<Message>,
    ) -> JoinHandle<()> {
        let queue = self.queue.get_or_init(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            tokio::spawn(run_in_order(receiver));
            sender
        });

        let (done, finished) = oneshot::channel();
        let job = Job {
            handler,
            session,
            message,
            done,
        };
        if let Err(e) = queue.send(job) {
            error!(method = e.0.message.method(), "Ordered handler queue is closed");
        }

        tokio::spawn(async move {
            let _ = finished.await;
        })
    }
}

async fn run_in_order(mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        supervise(job.handler, job.session, job.message).await;
        let _ = job.done.send(());
    }
}

async fn supervise(handler: Arc<dyn Handler>, session: Arc<Session>, message: Arc<Message>) {
    let method = message.method().to_string();
    let outcome = AssertUnwindSafe(handler.handle(session, message))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(HandlerError::Fault(panic_message(panic.as_ref()))));

    if let Err(e) = outcome {
        error!(method = %method, "Handler failed: {}", e);
    }
}

fn spawn_method_not_found(session: Arc<Session>, message: Message) -> JoinHandle<()> {
    tokio::spawn(async move {
        warn!(method = message.method(), "Method not found");
        let error = RpcError::method_not_found();
        if let Err(e) = session.respond_error(message.id.clone(), error).await {
            error!("Failed to answer unknown method: {}", e);
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
