use crate::chat::message::{Message, MessageId};

/// Identifier for one submission or retry.
///
/// This must change on every request so late events from a stopped request
/// can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamSessionId(pub u64);

impl StreamSessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Routing key for one in-flight request: the request session plus the
/// assistant message its parts are appended to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub session_id: StreamSessionId,
    pub message_id: MessageId,
}

impl StreamTarget {
    pub fn new(session_id: StreamSessionId, message_id: MessageId) -> Self {
        Self {
            session_id,
            message_id,
        }
    }
}

/// Coarse request status exposed to presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamingStatus {
    #[default]
    Idle,
    Submitted,
    Streaming,
    Error,
}

impl StreamingStatus {
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Submitted | Self::Streaming)
    }
}

/// Request lifecycle with the target each in-flight state belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Submitted(StreamTarget),
    Streaming(StreamTarget),
    Error {
        target: StreamTarget,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTransition {
    Submit(StreamTarget),
    FirstChunk(StreamTarget),
    Complete(StreamTarget),
    Fail {
        target: StreamTarget,
        message: String,
    },
    Stop(StreamTarget),
    Acknowledge,
}

/// Rejection reason for illegal status transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTransitionRejection {
    AlreadyInFlight {
        active: StreamTarget,
        attempted: StreamTarget,
    },
    NoActiveRequest,
    SessionMismatch {
        active: StreamTarget,
        attempted: StreamTarget,
    },
    NothingToAcknowledge,
}

pub type StatusTransitionResult = Result<StreamState, StatusTransitionRejection>;

impl StreamState {
    pub fn status(&self) -> StreamingStatus {
        match self {
            Self::Idle => StreamingStatus::Idle,
            Self::Submitted(_) => StreamingStatus::Submitted,
            Self::Streaming(_) => StreamingStatus::Streaming,
            Self::Error { .. } => StreamingStatus::Error,
        }
    }

    /// Returns the in-flight target if and only if a request is submitted or streaming.
    pub fn active_target(&self) -> Option<&StreamTarget> {
        match self {
            Self::Submitted(target) | Self::Streaming(target) => Some(target),
            Self::Idle | Self::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            Self::Idle | Self::Submitted(_) | Self::Streaming(_) => None,
        }
    }

    /// Returns true when incoming transport data matches the in-flight request.
    pub fn accepts_stream_event(&self, target: &StreamTarget) -> bool {
        self.active_target() == Some(target)
    }

    /// Applies one transition deterministically.
    ///
    /// Only `idle` and `error` accept a new submission. Every other transition
    /// except `Acknowledge` must name the in-flight target exactly.
    pub fn apply(&self, transition: StatusTransition) -> StatusTransitionResult {
        match transition {
            StatusTransition::Submit(target) => self.apply_submit(target),
            StatusTransition::FirstChunk(target) => self.apply_first_chunk(target),
            StatusTransition::Complete(target) | StatusTransition::Stop(target) => {
                self.apply_settle(target)
            }
            StatusTransition::Fail { target, message } => self.apply_fail(target, message),
            StatusTransition::Acknowledge => self.apply_acknowledge(),
        }
    }

    fn apply_submit(&self, target: StreamTarget) -> StatusTransitionResult {
        match self {
            Self::Submitted(active) | Self::Streaming(active) => {
                Err(StatusTransitionRejection::AlreadyInFlight {
                    active: active.clone(),
                    attempted: target,
                })
            }
            Self::Idle | Self::Error { .. } => Ok(Self::Submitted(target)),
        }
    }

    fn apply_first_chunk(&self, target: StreamTarget) -> StatusTransitionResult {
        self.require_active(&target)?;
        Ok(Self::Streaming(target))
    }

    fn apply_settle(&self, target: StreamTarget) -> StatusTransitionResult {
        self.require_active(&target)?;
        Ok(Self::Idle)
    }

    fn apply_fail(&self, target: StreamTarget, message: String) -> StatusTransitionResult {
        self.require_active(&target)?;
        Ok(Self::Error { target, message })
    }

    fn apply_acknowledge(&self) -> StatusTransitionResult {
        match self {
            Self::Error { .. } | Self::Idle => Ok(Self::Idle),
            Self::Submitted(_) | Self::Streaming(_) => {
                Err(StatusTransitionRejection::NothingToAcknowledge)
            }
        }
    }

    fn require_active(&self, target: &StreamTarget) -> Result<(), StatusTransitionRejection> {
        match self.active_target() {
            Some(active) if active == target => Ok(()),
            Some(active) => Err(StatusTransitionRejection::SessionMismatch {
                active: active.clone(),
                attempted: target.clone(),
            }),
            None => Err(StatusTransitionRejection::NoActiveRequest),
        }
    }
}

/// Position of the one part that may currently be live, as
/// `(message_index, part_index)`.
///
/// Derived from the transcript and status on every call, never stored.
pub fn live_position(messages: &[Message], status: StreamingStatus) -> Option<(usize, usize)> {
    if status != StreamingStatus::Streaming {
        return None;
    }

    let message_index = messages.len().checked_sub(1)?;
    let part_index = messages[message_index].parts().len().checked_sub(1)?;
    Some((message_index, part_index))
}

pub fn is_part_live(
    messages: &[Message],
    status: StreamingStatus,
    message_index: usize,
    part_index: usize,
) -> bool {
    live_position(messages, status) == Some((message_index, part_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Part;

    fn target(session: u64) -> StreamTarget {
        StreamTarget::new(
            StreamSessionId::new(session),
            MessageId::new(format!("assistant-{session}")),
        )
    }

    #[test]
    fn success_path_returns_to_idle() {
        let state = StreamState::Idle;
        let state = state.apply(StatusTransition::Submit(target(1))).unwrap();
        assert_eq!(state.status(), StreamingStatus::Submitted);

        let state = state.apply(StatusTransition::FirstChunk(target(1))).unwrap();
        assert_eq!(state.status(), StreamingStatus::Streaming);

        // Later chunks keep the request streaming.
        let state = state.apply(StatusTransition::FirstChunk(target(1))).unwrap();
        assert_eq!(state.status(), StreamingStatus::Streaming);

        let state = state.apply(StatusTransition::Complete(target(1))).unwrap();
        assert_eq!(state, StreamState::Idle);
    }

    #[test]
    fn failure_is_recoverable_by_acknowledge_or_next_submit() {
        let failed = StreamState::Submitted(target(1))
            .apply(StatusTransition::Fail {
                target: target(1),
                message: "network".to_string(),
            })
            .unwrap();
        assert_eq!(failed.status(), StreamingStatus::Error);
        assert_eq!(failed.error_message(), Some("network"));

        assert_eq!(
            failed.apply(StatusTransition::Acknowledge),
            Ok(StreamState::Idle)
        );
        assert_eq!(
            failed.apply(StatusTransition::Submit(target(2))),
            Ok(StreamState::Submitted(target(2)))
        );
    }

    #[test]
    fn second_submission_is_rejected_while_in_flight() {
        for state in [
            StreamState::Submitted(target(1)),
            StreamState::Streaming(target(1)),
        ] {
            assert_eq!(
                state.apply(StatusTransition::Submit(target(2))),
                Err(StatusTransitionRejection::AlreadyInFlight {
                    active: target(1),
                    attempted: target(2),
                })
            );
        }
    }

    #[test]
    fn stale_targets_are_rejected() {
        let state = StreamState::Streaming(target(2));
        assert!(matches!(
            state.apply(StatusTransition::Complete(target(1))),
            Err(StatusTransitionRejection::SessionMismatch { .. })
        ));
        assert!(!state.accepts_stream_event(&target(1)));
        assert!(state.accepts_stream_event(&target(2)));

        assert_eq!(
            StreamState::Idle.apply(StatusTransition::FirstChunk(target(1))),
            Err(StatusTransitionRejection::NoActiveRequest)
        );
    }

    #[test]
    fn stop_settles_in_flight_request() {
        assert_eq!(
            StreamState::Streaming(target(3)).apply(StatusTransition::Stop(target(3))),
            Ok(StreamState::Idle)
        );
        assert_eq!(
            StreamState::Streaming(target(3)).apply(StatusTransition::Acknowledge),
            Err(StatusTransitionRejection::NothingToAcknowledge)
        );
    }

    #[test]
    fn only_the_tail_part_is_live_while_streaming() {
        let messages = vec![
            Message::user_text(MessageId::new("u"), "hi"),
            Message::assistant(
                MessageId::new("a"),
                vec![Part::reasoning("r"), Part::text("t")],
            ),
        ];

        assert_eq!(
            live_position(&messages, StreamingStatus::Streaming),
            Some((1, 1))
        );
        assert!(is_part_live(&messages, StreamingStatus::Streaming, 1, 1));
        assert!(!is_part_live(&messages, StreamingStatus::Streaming, 1, 0));
        assert!(!is_part_live(&messages, StreamingStatus::Streaming, 0, 0));

        for status in [
            StreamingStatus::Idle,
            StreamingStatus::Submitted,
            StreamingStatus::Error,
        ] {
            assert_eq!(live_position(&messages, status), None);
        }
    }

    #[test]
    fn empty_tail_message_has_no_live_part() {
        let messages = vec![Message::assistant(MessageId::new("a"), Vec::new())];
        assert_eq!(live_position(&messages, StreamingStatus::Streaming), None);
        assert_eq!(live_position(&[], StreamingStatus::Streaming), None);
    }
}
