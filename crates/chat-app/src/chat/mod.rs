/// User commands and their outcomes.
pub mod events;
/// Message, part and identifier types.
pub mod message;
pub mod render;
/// Submission controller tying store, status, simulator and transport together.
pub mod session;
pub mod simulator;
/// Streaming status machine and the live-part predicate.
pub mod status;
pub mod store;

pub use events::{CommandOutcome, SessionCommand};
pub use message::{Message, MessageId, Part, PartKind, Role};
pub use render::{
    Affordance, Citation, CitationList, MessageView, PartContext, PartView, PresentationIntent,
    TranscriptView, citation_list, dispatch_part, render_transcript,
};
pub use session::{
    ATTACHMENTS_ONLY_PLACEHOLDER, ChatSession, Production, RetryOutcome, SessionConfig,
    SubmitInput, SubmitOutcome, SubmitRejection,
};
pub use simulator::{CATALOG_SIZE, SimulatedResponse, SimulatedSource, catalog_index, simulate};
pub use status::{
    StatusTransition, StatusTransitionRejection, StreamSessionId, StreamState, StreamTarget,
    StreamingStatus, is_part_live, live_position,
};
pub use store::{AppendRejection, ConversationStore, preview_transcript};
