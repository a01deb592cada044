use crate::chat::message::{Message, MessageId, Part, Role};

/// Rejection reason for part appends outside the tail message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendRejection {
    EmptyConversation,
    NotTail {
        attempted: MessageId,
        tail: MessageId,
    },
}

/// Owns the real message sequence and the display projection over it.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    messages: Vec<Message>,
    preview: Vec<Message>,
    // Sticky: once set, the preview transcript is never displayed again.
    has_had_real_traffic: bool,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// Empty store showing the built-in preview transcript.
    pub fn new() -> Self {
        Self::with_preview(preview_transcript())
    }

    /// Empty store with a custom preview transcript.
    pub fn with_preview(preview: Vec<Message>) -> Self {
        Self {
            messages: Vec::new(),
            preview,
            has_had_real_traffic: false,
        }
    }

    /// Appends a batch to the end of the real sequence, in order.
    ///
    /// Ids are not checked for uniqueness; callers mint them.
    pub fn append(&mut self, batch: Vec<Message>) {
        if batch.is_empty() {
            return;
        }

        self.has_had_real_traffic = true;
        self.messages.extend(batch);
    }

    /// Overwrites the real sequence, e.g. to reconcile with a transport's own history.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        if !messages.is_empty() {
            self.has_had_real_traffic = true;
        }
        self.messages = messages;
    }

    /// The transcript to show: the real sequence, or the preview while no
    /// real message has ever existed.
    pub fn displayed(&self) -> &[Message] {
        if self.has_had_real_traffic {
            &self.messages
        } else {
            &self.preview
        }
    }

    /// The real sequence only, never the preview.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Sticky: true once any non-empty batch has been stored.
    pub fn has_had_real_traffic(&self) -> bool {
        self.has_had_real_traffic
    }

    /// Whether `displayed` currently returns the preview.
    pub fn is_showing_preview(&self) -> bool {
        !self.has_had_real_traffic
    }

    /// Tail of the real sequence.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether the real sequence holds `message_id`.
    pub fn contains(&self, message_id: &MessageId) -> bool {
        self.messages.iter().any(|message| &message.id == message_id)
    }

    /// Looks up a message in whatever is currently displayed.
    pub fn find_displayed(&self, message_id: &MessageId) -> Option<&Message> {
        self.displayed()
            .iter()
            .find(|message| &message.id == message_id)
    }

    /// Appends one part to the tail message. Any other message is immutable.
    pub(crate) fn append_part(
        &mut self,
        message_id: &MessageId,
        part: Part,
    ) -> Result<(), AppendRejection> {
        let Some(tail) = self.messages.last_mut() else {
            return Err(AppendRejection::EmptyConversation);
        };

        if &tail.id != message_id {
            return Err(AppendRejection::NotTail {
                attempted: message_id.clone(),
                tail: tail.id.clone(),
            });
        }

        tail.push_part(part);
        Ok(())
    }

    /// Removes the tail message if it is an assistant reply.
    pub(crate) fn pop_tail_assistant(&mut self) -> Option<Message> {
        if self.messages.last()?.role != Role::Assistant {
            return None;
        }
        self.messages.pop()
    }
}

/// Fixed conversation shown before the first real submission.
pub fn preview_transcript() -> Vec<Message> {
    vec![
        Message::user_text(
            MessageId::new("m1"),
            "Give me a quick overview of this page's features.",
        ),
        Message::assistant(
            MessageId::new("m2"),
            vec![
                Part::reasoning(
                    "I will read your selected model and search toggle, send your message to the transport, then stream back structured parts: reasoning, main answer, and sources.",
                ),
                Part::text(
                    "This demo includes: 1) model selection (GPT 4o, Deepseek R1); 2) optional web search; 3) attachment-friendly input; 4) streaming responses; 5) expandable reasoning; 6) source list with copy/retry actions.",
                ),
                Part::source_url("https://example.com/ai-element-demo", None),
            ],
        ),
    ]
}
