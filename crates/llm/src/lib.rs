//! Transport contract for producing assistant messages.
//!
//! The chat core never talks to a network directly. It hands a
//! [`TransportRequest`] to a [`Transport`] and consumes the ordered
//! [`StreamEvent`]s that come back.

mod model;
mod scripted;
mod transport;

pub use model::{DEFAULT_MODEL, Model, default_models, find_model};
pub use scripted::{SCRIPTED_TRANSPORT_ID, ScriptStep, ScriptedTransport};
pub use transport::{
    Attachment, StreamEvent, StreamEventPayload, StreamPoll, StreamSessionId, StreamTarget,
    Transport, TransportError, TransportEventStream, TransportPart, TransportRequest,
    TransportResult, TransportStreamHandle, TransportWorker, make_event_stream, spawn_worker,
};
