//! Deterministic local stand-in for a live backend.
//!
//! The reply is picked by the *length* of the user text, not its content:
//! `catalog[len % catalog.len()]`. This only varies the replies so the
//! transcript does not look frozen. It does no routing or inference, and equal
//! lengths always get equal replies.

use crate::chat::message::Part;

struct CannedSource {
    url: &'static str,
    title: &'static str,
}

struct CannedResponse {
    reasoning: &'static str,
    text: &'static str,
    sources: &'static [CannedSource],
}

const CATALOG: [CannedResponse; 3] = [
    CannedResponse {
        reasoning: "Let me analyze your question and provide a detailed answer.",
        text: "This is a great question! Based on my understanding, I can provide you with the following information and suggestions. Let me explain the related concepts and solutions in detail.",
        sources: &[
            CannedSource {
                url: "https://example.com/source1",
                title: "Related Documentation 1",
            },
            CannedSource {
                url: "https://example.com/source2",
                title: "Technical Guide",
            },
        ],
    },
    CannedResponse {
        reasoning: "I need to carefully consider all aspects of this question to ensure I provide an accurate answer.",
        text: "Based on your question, I suggest thinking from the following perspectives: first, we need to understand the basic concepts; second, analyze specific application scenarios; finally, provide practical solutions.",
        sources: &[CannedSource {
            url: "https://example.com/guide",
            title: "Complete Guide",
        }],
    },
    CannedResponse {
        reasoning: "This is a complex question, let me analyze it step by step and provide a comprehensive answer.",
        text: "Thank you for your question! This question involves considerations at multiple levels. Let me analyze it in detail for you: 1) Theoretical foundation; 2) Practical application; 3) Best practice recommendations. I hope this information is helpful to you!",
        sources: &[
            CannedSource {
                url: "https://example.com/best-practices",
                title: "Best Practices",
            },
            CannedSource {
                url: "https://example.com/examples",
                title: "Example References",
            },
        ],
    },
];

pub const CATALOG_SIZE: usize = CATALOG.len();

const _: () = assert!(CATALOG_SIZE >= 2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedSource {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedResponse {
    pub reasoning: String,
    pub text: String,
    pub sources: Vec<SimulatedSource>,
}

impl SimulatedResponse {
    /// Flattens into parts in the order reasoning, text, then each source.
    pub fn into_parts(self) -> Vec<Part> {
        let mut parts = Vec::with_capacity(2 + self.sources.len());
        parts.push(Part::reasoning(self.reasoning));
        parts.push(Part::text(self.text));
        parts.extend(
            self.sources
                .into_iter()
                .map(|source| Part::source_url(source.url, Some(source.title))),
        );
        parts
    }
}

/// Catalog index for `user_text`.
///
/// Length is counted in UTF-16 code units, so a character outside the Basic
/// Multilingual Plane (most emoji) counts as two.
pub fn catalog_index(user_text: &str) -> usize {
    user_text.encode_utf16().count() % CATALOG_SIZE
}

pub fn simulate(user_text: &str) -> SimulatedResponse {
    let entry = &CATALOG[catalog_index(user_text)];
    SimulatedResponse {
        reasoning: entry.reasoning.to_string(),
        text: entry.text.to_string(),
        sources: entry
            .sources
            .iter()
            .map(|source| SimulatedSource {
                url: source.url.to_string(),
                title: source.title.to_string(),
            })
            .collect(),
    }
}
