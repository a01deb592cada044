use std::sync::Arc;

use parley_llm::{
    Attachment, DEFAULT_MODEL, Model, StreamEvent as TransportStreamEvent,
    StreamEventPayload as TransportEventPayload, StreamPoll,
    StreamSessionId as TransportSessionId, StreamTarget as TransportTarget, Transport,
    TransportEventStream, TransportPart, TransportRequest, default_models, find_model,
    spawn_worker,
};
use tokio::task::JoinHandle;

use crate::chat::message::{Message, MessageId, Part, Role};
use crate::chat::render::{TranscriptView, render_transcript};
use crate::chat::simulator::simulate;
use crate::chat::status::{
    StatusTransition, StatusTransitionRejection, StreamSessionId, StreamState, StreamTarget,
    StreamingStatus,
};
use crate::chat::store::ConversationStore;
use crate::clipboard::{ClipboardUnavailableSnafu, CopySink};

/// Text sent to the transport when a submission has attachments but no text.
pub const ATTACHMENTS_ONLY_PLACEHOLDER: &str = "Sent with attachments";

/// Explicit session configuration; the only source of mode toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub simulation_enabled: bool,
    pub web_search: bool,
    pub model_id: String,
    pub models: Vec<Model>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            simulation_enabled: true,
            web_search: false,
            model_id: DEFAULT_MODEL.to_string(),
            models: default_models(),
        }
    }
}

/// Pending user action: text and/or attachments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmitInput {
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl SubmitInput {
    /// Text-only input.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// True for present, non-empty text. Whitespace counts as text.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|text| !text.is_empty())
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_text() && !self.has_attachments()
    }
}

/// How an accepted submission or retry was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Production {
    /// The simulator produced the reply synchronously.
    Simulated { assistant_message_id: MessageId },
    /// The request is in flight on the transport.
    Dispatched(StreamTarget),
    /// The transport could not take the request; status is `error`.
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    EmptyInput,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Rejected(SubmitRejection),
    Accepted(Production),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// No assistant reply at the tail, or no prompt before it.
    NothingToRetry,
    Busy,
    Accepted(Production),
}

struct ActiveStream {
    target: StreamTarget,
    events: TransportEventStream,
    worker: JoinHandle<()>,
}

/// One conversation: store, status and the controller that drives them.
///
/// All mutation happens through `&mut self`, so events are applied one at a
/// time in arrival order. At most one request is in flight; a submit or retry
/// while one is running is rejected with no effect.
pub struct ChatSession {
    store: ConversationStore,
    state: StreamState,
    config: SessionConfig,
    pending_input: SubmitInput,
    transport: Option<Arc<dyn Transport>>,
    copy_sink: Option<Arc<dyn CopySink>>,
    active_stream: Option<ActiveStream>,
    // Input behind the tail exchange, replayed by retry.
    last_submission: Option<SubmitInput>,
    next_stream_session_id: u64,
}

impl ChatSession {
    /// Session with an empty store, no transport and no copy sink.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            store: ConversationStore::new(),
            state: StreamState::Idle,
            config,
            pending_input: SubmitInput::default(),
            transport: None,
            copy_sink: None,
            active_stream: None,
            last_submission: None,
            next_stream_session_id: 1,
        }
    }

    /// Transport used whenever the simulator is not.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_copy_sink(mut self, copy_sink: Arc<dyn CopySink>) -> Self {
        self.copy_sink = Some(copy_sink);
        self
    }

    /// Starts from an existing conversation instead of an empty one.
    pub fn with_store(mut self, store: ConversationStore) -> Self {
        self.store = store;
        self.last_submission = None;
        self
    }

    /// Overwrites history with a transport's own record of the conversation.
    ///
    /// Refused while a request is in flight, since its tail is still growing.
    pub fn replace_messages(&mut self, messages: Vec<Message>) -> bool {
        if self.is_in_flight() {
            tracing::warn!(status = ?self.status(), "refusing to replace history mid-request");
            return false;
        }

        self.store.replace_all(messages);
        self.last_submission = None;
        true
    }

    /// Current mode toggles and model selection.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Read-only view of the conversation store.
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Transcript to show, falling back to the preview before any real traffic.
    pub fn displayed(&self) -> &[Message] {
        self.store.displayed()
    }

    /// Coarse request status.
    pub fn status(&self) -> StreamingStatus {
        self.state.status()
    }

    /// Request status together with its target and error message.
    pub fn stream_state(&self) -> &StreamState {
        &self.state
    }

    /// True while `submitted` or `streaming`.
    pub fn is_in_flight(&self) -> bool {
        self.status().is_in_flight()
    }

    /// Presentation of the displayed transcript under the current status.
    pub fn render(&self) -> TranscriptView {
        render_transcript(self.store.displayed(), self.status())
    }

    /// Input buffered for the next [`submit_pending`](Self::submit_pending).
    pub fn pending_input(&self) -> &SubmitInput {
        &self.pending_input
    }

    /// Replaces the text in the pending buffer.
    pub fn set_input_text(&mut self, text: impl Into<String>) {
        self.pending_input.text = Some(text.into());
    }

    /// Queues an attachment for the next submission.
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.pending_input.attachments.push(attachment);
    }

    /// Whether the submit affordance should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.pending_input.is_empty() && !self.is_in_flight()
    }

    /// Flips simulation mode and returns the new value.
    pub fn toggle_simulation_mode(&mut self) -> bool {
        // Takes effect on the next submission; an in-flight request keeps its path.
        self.config.simulation_enabled = !self.config.simulation_enabled;
        tracing::info!(
            simulation_enabled = self.config.simulation_enabled,
            "simulation mode toggled"
        );
        self.config.simulation_enabled
    }

    /// Flips web search for later requests and returns the new value.
    pub fn toggle_web_search(&mut self) -> bool {
        self.config.web_search = !self.config.web_search;
        self.config.web_search
    }

    /// Selects a configured model. Unknown ids leave the selection unchanged.
    pub fn select_model(&mut self, model_id: &str) -> bool {
        if find_model(&self.config.models, model_id).is_none() {
            tracing::warn!(model_id = %model_id, "ignoring selection of unknown model");
            return false;
        }

        self.config.model_id = model_id.to_string();
        true
    }

    /// Submits whatever is in the pending-input buffer.
    pub fn submit_pending(&mut self) -> SubmitOutcome {
        let input = self.pending_input.clone();
        self.submit(input)
    }

    /// Validates `input` and produces a reply through the selected path.
    ///
    /// Accepted input clears the pending buffer. Rejected input leaves
    /// everything untouched.
    pub fn submit(&mut self, input: SubmitInput) -> SubmitOutcome {
        if input.is_empty() {
            tracing::debug!("ignoring empty submission");
            return SubmitOutcome::Rejected(SubmitRejection::EmptyInput);
        }

        if self.is_in_flight() {
            // Single-request session: ignore additional submits while one is active.
            tracing::debug!(status = ?self.status(), "ignoring submission while busy");
            return SubmitOutcome::Rejected(SubmitRejection::Busy);
        }

        let production = self.produce(&input, true);
        self.last_submission = Some(input);
        self.pending_input = SubmitInput::default();
        SubmitOutcome::Accepted(production)
    }

    /// Replaces the tail assistant reply with a freshly produced one.
    pub fn retry(&mut self) -> RetryOutcome {
        if self.is_in_flight() {
            return RetryOutcome::Busy;
        }

        let Some(prompt) = self.retry_prompt() else {
            tracing::debug!("retry requested without an assistant reply to regenerate");
            return RetryOutcome::NothingToRetry;
        };

        // Replay the full input so attachments survive; the transcript only keeps text.
        let input = self
            .last_submission
            .clone()
            .unwrap_or_else(|| SubmitInput::text(prompt));

        if let Some(removed) = self.store.pop_tail_assistant() {
            tracing::debug!(message_id = %removed.id, "discarding assistant reply for retry");
        }

        RetryOutcome::Accepted(self.produce(&input, false))
    }

    /// Cancels the in-flight request. Parts that already arrived stay in history.
    pub fn stop(&mut self) -> bool {
        let Some(active_stream) = self.active_stream.take() else {
            return false;
        };

        let ActiveStream {
            target,
            mut events,
            worker,
        } = active_stream;
        events.cancel();
        worker.abort();

        self.apply_transition(StatusTransition::Stop(target));
        true
    }

    /// Dismisses an `error` status. Returns false when there was none.
    pub fn acknowledge_error(&mut self) -> bool {
        if self.status() != StreamingStatus::Error {
            return false;
        }
        self.apply_transition(StatusTransition::Acknowledge)
    }

    /// Copies one displayed part's narrative text to the copy sink.
    ///
    /// Sink failures are logged and reported as `false`, never propagated.
    pub fn copy_part(&self, message_id: &MessageId, part_index: usize) -> bool {
        let Some(text) = self
            .store
            .find_displayed(message_id)
            .and_then(|message| message.parts().get(part_index))
            .and_then(Part::narrative)
        else {
            tracing::debug!(message_id = %message_id, part_index, "nothing to copy");
            return false;
        };

        let result = match &self.copy_sink {
            Some(sink) => sink.write_text(text),
            None => ClipboardUnavailableSnafu {
                stage: "copy-part",
                details: "no copy sink configured",
            }
            .fail(),
        };

        match result {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(message_id = %message_id, error = %error, "copy failed");
                false
            }
        }
    }

    /// Waits for the next transport event and applies it.
    ///
    /// Returns `false` once no request is in flight.
    pub async fn next_event(&mut self) -> bool {
        let Some(active_stream) = self.active_stream.as_mut() else {
            return false;
        };
        let target = active_stream.target.clone();

        match active_stream.events.recv().await {
            Some(event) => self.handle_stream_event(event),
            None => self.handle_stream_closed(&target),
        }

        self.active_stream.is_some()
    }

    /// Applies every event until the in-flight request settles.
    pub async fn drive_to_completion(&mut self) {
        while self.next_event().await {}
    }

    /// Applies events that have already arrived without waiting.
    ///
    /// A stream that has hung up without a terminal event fails the request,
    /// same as in [`next_event`](Self::next_event).
    pub fn pump_ready_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(active_stream) = self.active_stream.as_mut() {
            match active_stream.events.try_recv() {
                StreamPoll::Ready(event) => {
                    self.handle_stream_event(event);
                    applied += 1;
                }
                StreamPoll::Empty => break,
                StreamPoll::Closed => {
                    let target = active_stream.target.clone();
                    self.handle_stream_closed(&target);
                    break;
                }
            }
        }
        applied
    }

    /// Applies one transport lifecycle signal.
    pub fn handle_stream_event(&mut self, event: TransportStreamEvent) {
        // Normalize transport ids to chat ids before stale-request checks.
        let target = Self::transport_target_to_chat(event.target);

        if !self.stream_event_is_current(&target) {
            tracing::debug!(target = ?target, "dropping event for a request that is not in flight");
            return;
        }

        match event.payload {
            TransportEventPayload::Submitted => {
                tracing::debug!(target = ?target, "transport acknowledged submission");
            }
            TransportEventPayload::Part(part) => {
                self.append_stream_part(&target, Self::transport_part_to_chat(part));
            }
            TransportEventPayload::Completed => {
                self.finish_stream(StatusTransition::Complete(target));
            }
            TransportEventPayload::Failed(reason) => {
                tracing::warn!(target = ?target, reason = %reason, "transport reported failure");
                self.finish_stream(StatusTransition::Fail {
                    target,
                    message: reason,
                });
            }
        }
    }

    fn handle_stream_closed(&mut self, target: &StreamTarget) {
        if self.stream_event_is_current(target) {
            self.finish_stream(StatusTransition::Fail {
                target: target.clone(),
                message: "transport stream ended before a terminal event".to_string(),
            });
        }
    }

    fn append_stream_part(&mut self, target: &StreamTarget, part: Part) {
        // The assistant message only exists once its first part arrives.
        if !self.store.contains(&target.message_id) {
            self.store.append(vec![Message::assistant(
                target.message_id.clone(),
                Vec::new(),
            )]);
        }

        if let Err(rejection) = self.store.append_part(&target.message_id, part) {
            tracing::error!(
                target = ?target,
                rejection = ?rejection,
                "refusing to append a part outside the tail message"
            );
            return;
        }

        self.apply_transition(StatusTransition::FirstChunk(target.clone()));
    }

    fn finish_stream(&mut self, transition: StatusTransition) {
        self.apply_transition(transition);
        // Dropping the stream signals cancellation to a worker that is still running.
        self.active_stream = None;
    }

    /// Picks the production path for `input`. Only text reaches the simulator;
    /// attachments-only input always goes to the transport.
    fn produce(&mut self, input: &SubmitInput, append_user_message: bool) -> Production {
        match input.text.as_deref() {
            Some(text) if self.config.simulation_enabled && !text.is_empty() => {
                let user_message = append_user_message
                    .then(|| Message::user_text(MessageId::generate("user"), text));
                self.produce_simulated(text, user_message)
            }
            text => {
                let text = text
                    .filter(|text| !text.is_empty())
                    .unwrap_or(ATTACHMENTS_ONLY_PLACEHOLDER)
                    .to_string();
                if append_user_message {
                    self.store.append(vec![Message::user_text(
                        MessageId::generate("user"),
                        text.clone(),
                    )]);
                }
                self.dispatch_to_transport(text, input.attachments.clone())
            }
        }
    }

    fn produce_simulated(&mut self, prompt: &str, user_message: Option<Message>) -> Production {
        let assistant_message_id = MessageId::generate("assistant");
        let target = self.mint_target(assistant_message_id.clone());
        self.apply_transition(StatusTransition::Submit(target.clone()));

        let assistant_message =
            Message::assistant(assistant_message_id.clone(), simulate(prompt).into_parts());

        // One batch, so the user message is never visible without its reply.
        let batch = user_message
            .into_iter()
            .chain(std::iter::once(assistant_message))
            .collect();
        self.store.append(batch);

        self.apply_transition(StatusTransition::Complete(target));
        Production::Simulated {
            assistant_message_id,
        }
    }

    fn dispatch_to_transport(&mut self, text: String, attachments: Vec<Attachment>) -> Production {
        let target = self.mint_target(MessageId::generate("assistant"));
        self.apply_transition(StatusTransition::Submit(target.clone()));

        let Some(transport) = self.transport.clone() else {
            return self.fail_request(target, "no transport configured".to_string());
        };

        let request = TransportRequest::new(
            Self::chat_target_to_transport(&target),
            text,
            self.config.model_id.clone(),
        )
        .with_attachments(attachments)
        .with_web_search(self.config.web_search);

        tracing::info!(
            target = ?target,
            transport_id = %transport.id(),
            model_id = %request.model_id,
            web_search = request.web_search,
            attachment_count = request.attachments.len(),
            "dispatching request to transport"
        );

        let handle = match transport.send(request) {
            Ok(handle) => handle,
            Err(error) => {
                tracing::error!(target = ?target, error = %error, "transport rejected request");
                return self.fail_request(target, error.to_string());
            }
        };

        let worker = match spawn_worker(handle.worker) {
            Ok(worker) => worker,
            Err(error) => {
                tracing::error!(target = ?target, error = %error, "failed to start transport worker");
                return self.fail_request(target, error.to_string());
            }
        };

        self.active_stream = Some(ActiveStream {
            target: target.clone(),
            events: handle.stream,
            worker,
        });
        Production::Dispatched(target)
    }

    fn fail_request(&mut self, target: StreamTarget, reason: String) -> Production {
        self.apply_transition(StatusTransition::Fail {
            target,
            message: reason.clone(),
        });
        Production::Failed { reason }
    }

    fn retry_prompt(&self) -> Option<String> {
        let messages = self.store.messages();
        let (tail, history) = messages.split_last()?;
        if tail.role != Role::Assistant {
            return None;
        }

        history
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .and_then(Message::first_text)
            .map(str::to_string)
    }

    fn apply_transition(&mut self, transition: StatusTransition) -> bool {
        match self.state.apply(transition) {
            Ok(next_state) => {
                self.state = next_state;
                true
            }
            Err(rejection) => {
                Self::log_rejection(&rejection);
                false
            }
        }
    }

    fn log_rejection(rejection: &StatusTransitionRejection) {
        tracing::warn!(rejection = ?rejection, "status transition rejected");
    }

    fn stream_event_is_current(&self, target: &StreamTarget) -> bool {
        self.active_stream
            .as_ref()
            .is_some_and(|active_stream| &active_stream.target == target)
            && self.state.accepts_stream_event(target)
    }

    fn mint_target(&mut self, message_id: MessageId) -> StreamTarget {
        let session_id = StreamSessionId::new(self.next_stream_session_id);
        // Reserve immediately so follow-up requests never reuse a target.
        self.next_stream_session_id = self.next_stream_session_id.saturating_add(1);
        StreamTarget::new(session_id, message_id)
    }

    fn chat_target_to_transport(target: &StreamTarget) -> TransportTarget {
        TransportTarget::new(
            TransportSessionId::new(target.session_id.0),
            target.message_id.as_str(),
        )
    }

    fn transport_target_to_chat(target: TransportTarget) -> StreamTarget {
        StreamTarget::new(
            StreamSessionId::new(target.session_id.0),
            MessageId::from(target.message_id),
        )
    }

    fn transport_part_to_chat(part: TransportPart) -> Part {
        match part {
            TransportPart::Text(text) => Part::text(text),
            TransportPart::Reasoning(text) => Part::reasoning(text),
            TransportPart::SourceUrl { url, title } => Part::source_url(url, title),
        }
    }
}
