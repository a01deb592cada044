use futures::future::BoxFuture;
use snafu::{ResultExt, Snafu};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Identifier for one request/response exchange.
///
/// A fresh value is minted for every submit and retry so late events from a
/// cancelled exchange can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamSessionId(pub u64);

impl StreamSessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Routing key attached to every transport event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub session_id: StreamSessionId,
    /// Id of the assistant message the parts belong to.
    pub message_id: String,
}

impl StreamTarget {
    pub fn new(session_id: StreamSessionId, message_id: impl Into<String>) -> Self {
        Self {
            session_id,
            message_id: message_id.into(),
        }
    }
}

/// Content fragment produced by a transport, before it is mapped into chat parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportPart {
    Text(String),
    Reasoning(String),
    SourceUrl { url: String, title: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventPayload {
    Submitted,
    Part(TransportPart),
    Completed,
    Failed(String),
}

impl StreamEventPayload {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub target: StreamTarget,
    pub payload: StreamEventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: Option<String>,
    pub media_type: String,
    pub url: String,
}

impl Attachment {
    pub fn new(media_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: None,
            media_type: media_type.into(),
            url: url.into(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub target: StreamTarget,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub model_id: String,
    pub web_search: bool,
}

impl TransportRequest {
    pub fn new(target: StreamTarget, text: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            target,
            text: text.into(),
            attachments: Vec::new(),
            model_id: model_id.into(),
            web_search: false,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_web_search(mut self, web_search: bool) -> Self {
        self.web_search = web_search;
        self
    }
}

pub type TransportWorker = BoxFuture<'static, ()>;
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransportError {
    #[snafu(display("request for {target:?} carries neither text nor attachments"))]
    EmptyRequest {
        stage: &'static str,
        target: StreamTarget,
    },
    #[snafu(display("transport '{transport_id}' does not serve model '{model_id}'"))]
    UnknownModel {
        stage: &'static str,
        transport_id: String,
        model_id: String,
    },
    #[snafu(display("transport worker could not be started on `{stage}`: {source}"))]
    WorkerUnavailable {
        stage: &'static str,
        source: tokio::runtime::TryCurrentError,
    },
}

/// Result of polling a [`TransportEventStream`] without waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPoll {
    Ready(StreamEvent),
    /// Nothing buffered yet; the producer is still running.
    Empty,
    /// Buffer drained and the producer hung up.
    Closed,
}

pub struct TransportEventStream {
    target: StreamTarget,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

pub struct TransportStreamHandle {
    pub stream: TransportEventStream,
    pub worker: TransportWorker,
}

impl TransportEventStream {
    pub(crate) fn new(
        target: StreamTarget,
        events: mpsc::UnboundedReceiver<StreamEvent>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            target,
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> StreamPoll {
        match self.events.try_recv() {
            Ok(event) => StreamPoll::Ready(event),
            Err(TryRecvError::Empty) => StreamPoll::Empty,
            Err(TryRecvError::Disconnected) => StreamPoll::Closed,
        }
    }

    /// Signals the worker to stop producing events. Returns false if the
    /// worker was already gone or the stream was cancelled before.
    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for TransportEventStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            tracing::trace!(target = ?self.target, "event stream dropped, cancelling worker");
            let _ = cancel_tx.send(());
        }
    }
}

/// Spawns a transport worker on the ambient tokio runtime.
pub fn spawn_worker(worker: TransportWorker) -> TransportResult<JoinHandle<()>> {
    let runtime = tokio::runtime::Handle::try_current().context(WorkerUnavailableSnafu {
        stage: "spawn-transport-worker",
    })?;
    Ok(runtime.spawn(worker))
}

/// Producer of the part-stream contract.
///
/// `send` only validates and wires channels; the returned worker must be
/// spawned by the caller and performs the actual production.
pub trait Transport: Send + Sync {
    fn id(&self) -> &str;
    fn send(&self, request: TransportRequest) -> TransportResult<TransportStreamHandle>;
}

pub fn make_event_stream(
    target: StreamTarget,
) -> (
    mpsc::UnboundedSender<StreamEvent>,
    TransportEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        event_tx,
        TransportEventStream::new(target, event_rx, cancel_tx),
        cancel_rx,
    )
}
