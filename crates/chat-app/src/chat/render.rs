//! Toolkit-independent presentation of a transcript.
//!
//! Each part is dispatched by kind to a [`PresentationIntent`]. Citations
//! never render inline. They are gathered per message into one
//! [`CitationList`].

use crate::chat::message::{Message, MessageId, Part, Role};
use crate::chat::status::{StreamingStatus, live_position};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affordance {
    /// Regenerate the tail assistant message.
    Retry,
    /// Write `text` verbatim to the copy sink.
    Copy { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationIntent {
    Prose {
        role: Role,
        text: String,
        affordances: Vec<Affordance>,
    },
    /// Collapsible reasoning trace; `live` marks ongoing production.
    Reasoning { text: String, live: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub href: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationList {
    pub count: usize,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartView {
    pub part_index: usize,
    pub intent: PresentationIntent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub message_id: MessageId,
    pub role: Role,
    pub citations: Option<CitationList>,
    pub parts: Vec<PartView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptView {
    pub messages: Vec<MessageView>,
    /// A request was accepted but nothing has arrived yet.
    pub show_loader: bool,
}

/// Positional facts about one part, computed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartContext {
    pub role: Role,
    pub is_last_part: bool,
    pub is_last_message: bool,
    pub live: bool,
}

/// Maps one part to its presentation. Citations and unsupported parts yield `None`.
pub fn dispatch_part(part: &Part, context: &PartContext) -> Option<PresentationIntent> {
    match part {
        Part::Text { text } => {
            let affordances = if context.role == Role::Assistant
                && context.is_last_message
                && context.is_last_part
            {
                vec![Affordance::Retry, Affordance::Copy { text: text.clone() }]
            } else {
                Vec::new()
            };

            Some(PresentationIntent::Prose {
                role: context.role,
                text: text.clone(),
                affordances,
            })
        }
        Part::Reasoning { text } => Some(PresentationIntent::Reasoning {
            text: text.clone(),
            live: context.live,
        }),
        Part::SourceUrl { .. } | Part::Unsupported => None,
    }
}

/// Collects every citation of an assistant message in production order.
///
/// Citations may be interleaved with other parts, so this filters the whole
/// part list instead of looking for a contiguous run.
pub fn citation_list(message: &Message) -> Option<CitationList> {
    if message.role != Role::Assistant {
        return None;
    }

    let citations = message
        .source_urls()
        .map(|(url, title)| Citation {
            href: url.to_string(),
            label: title.unwrap_or(url).to_string(),
        })
        .collect::<Vec<_>>();

    if citations.is_empty() {
        return None;
    }

    Some(CitationList {
        count: citations.len(),
        citations,
    })
}

pub fn render_transcript(messages: &[Message], status: StreamingStatus) -> TranscriptView {
    let live = live_position(messages, status);
    let last_message_index = messages.len().checked_sub(1);

    let messages = messages
        .iter()
        .enumerate()
        .map(|(message_index, message)| {
            let last_part_index = message.parts().len().checked_sub(1);
            let parts = message
                .parts()
                .iter()
                .enumerate()
                .filter_map(|(part_index, part)| {
                    let context = PartContext {
                        role: message.role,
                        is_last_part: Some(part_index) == last_part_index,
                        is_last_message: Some(message_index) == last_message_index,
                        live: live == Some((message_index, part_index)),
                    };
                    dispatch_part(part, &context).map(|intent| PartView { part_index, intent })
                })
                .collect();

            MessageView {
                message_id: message.id.clone(),
                role: message.role,
                citations: citation_list(message),
                parts,
            }
        })
        .collect();

    TranscriptView {
        messages,
        show_loader: status == StreamingStatus::Submitted,
    }
}
