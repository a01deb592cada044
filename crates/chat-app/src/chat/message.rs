use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque message identifier, unique within one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Mints a fresh id such as `user-0192…`.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One typed fragment of a message.
///
/// Serialised with a `type` discriminator (`text`, `reasoning`, `source-url`).
/// Any other discriminator deserialises to [`Part::Unsupported`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    SourceUrl {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    #[serde(other)]
    Unsupported,
}

/// Discriminant of [`Part`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    Text,
    Reasoning,
    SourceUrl,
    Unsupported,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }

    pub fn source_url(url: impl Into<String>, title: Option<String>) -> Self {
        Self::SourceUrl {
            url: url.into(),
            title,
        }
    }

    pub fn kind(&self) -> PartKind {
        match self {
            Self::Text { .. } => PartKind::Text,
            Self::Reasoning { .. } => PartKind::Reasoning,
            Self::SourceUrl { .. } => PartKind::SourceUrl,
            Self::Unsupported => PartKind::Unsupported,
        }
    }

    pub fn is_source_url(&self) -> bool {
        matches!(self, Self::SourceUrl { .. })
    }

    /// Narrative content of text and reasoning parts.
    pub fn narrative(&self) -> Option<&str> {
        match self {
            Self::Text { text } | Self::Reasoning { text } => Some(text),
            Self::SourceUrl { .. } | Self::Unsupported => None,
        }
    }
}

/// A message and its parts in production order.
///
/// Identity is the id: two values with the same id compare equal even if one
/// of them has received more parts since.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    parts: Vec<Part>,
}

impl Message {
    pub fn new(id: MessageId, role: Role, parts: Vec<Part>) -> Self {
        Self { id, role, parts }
    }

    pub fn user_text(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(id, Role::User, vec![Part::text(text)])
    }

    pub fn assistant(id: MessageId, parts: Vec<Part>) -> Self {
        Self::new(id, Role::Assistant, parts)
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn last_part(&self) -> Option<&Part> {
        self.parts.last()
    }

    pub fn part_kinds(&self) -> Vec<PartKind> {
        self.parts.iter().map(Part::kind).collect()
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// First text part, used as the prompt when regenerating a reply.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// All citation parts, wherever they sit among the other parts.
    pub fn source_urls(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.parts.iter().filter_map(|part| match part {
            Part::SourceUrl { url, title } => Some((url.as_str(), title.as_deref())),
            _ => None,
        })
    }

    pub fn source_url_count(&self) -> usize {
        self.parts.iter().filter(|part| part.is_source_url()).count()
    }

    // Only the conversation store may grow a message, and only at the tail.
    pub(crate) fn push_part(&mut self, part: Part) {
        self.parts.push(part);
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_use_type_discriminator_on_the_wire() {
        let parts = vec![
            Part::reasoning("thinking"),
            Part::text("answer"),
            Part::source_url("https://example.com/a", Some("A".to_string())),
            Part::source_url("https://example.com/b", None),
        ];

        let json = serde_json::to_value(&parts).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "type": "reasoning", "text": "thinking" },
                { "type": "text", "text": "answer" },
                { "type": "source-url", "url": "https://example.com/a", "title": "A" },
                { "type": "source-url", "url": "https://example.com/b" },
            ])
        );
    }

    #[test]
    fn unknown_part_type_deserialises_as_unsupported() {
        let part: Part = serde_json::from_value(serde_json::json!({
            "type": "step-start"
        }))
        .unwrap();
        assert_eq!(part, Part::Unsupported);
        assert_eq!(part.kind(), PartKind::Unsupported);
        assert_eq!(part.narrative(), None);
    }

    #[test]
    fn message_identity_is_the_id() {
        let id = MessageId::new("m-1");
        let short = Message::assistant(id.clone(), vec![Part::text("a")]);
        let long = Message::assistant(id, vec![Part::text("a"), Part::text("b")]);
        assert_eq!(short, long);
        assert_ne!(
            short,
            Message::assistant(MessageId::new("m-2"), vec![Part::text("a")])
        );
    }

    #[test]
    fn source_urls_are_collected_when_interleaved() {
        let message = Message::assistant(
            MessageId::new("m-1"),
            vec![
                Part::source_url("https://example.com/1", None),
                Part::reasoning("r"),
                Part::source_url("https://example.com/2", Some("Two".to_string())),
                Part::text("t"),
                Part::source_url("https://example.com/3", None),
            ],
        );

        assert_eq!(message.source_url_count(), 3);
        assert_eq!(
            message.source_urls().collect::<Vec<_>>(),
            vec![
                ("https://example.com/1", None),
                ("https://example.com/2", Some("Two")),
                ("https://example.com/3", None),
            ]
        );
        assert_eq!(message.first_text(), Some("t"));
    }

    #[test]
    fn generated_ids_are_unique_and_prefixed() {
        let first = MessageId::generate("user");
        let second = MessageId::generate("user");
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("user-"));
    }
}
