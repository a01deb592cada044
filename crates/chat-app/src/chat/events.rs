use crate::chat::message::MessageId;
use crate::chat::session::{ChatSession, RetryOutcome, SubmitInput, SubmitOutcome};

/// User intents accepted by a [`ChatSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Submits explicit input, bypassing the pending buffer.
    Submit(SubmitInput),
    /// Submits whatever is in the pending buffer.
    SubmitPending,
    ToggleSimulation,
    ToggleWebSearch,
    SelectModel(String),
    Retry,
    Stop,
    AcknowledgeError,
    Copy {
        message_id: MessageId,
        part_index: usize,
    },
}

/// Result of dispatching one [`SessionCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Submitted(SubmitOutcome),
    Retried(RetryOutcome),
    SimulationToggled { enabled: bool },
    WebSearchToggled { enabled: bool },
    ModelSelected { model_id: String, accepted: bool },
    Stopped { was_in_flight: bool },
    ErrorAcknowledged { was_error: bool },
    Copied { written: bool },
}

impl CommandOutcome {
    /// Whether the command changed anything.
    pub fn took_effect(&self) -> bool {
        match self {
            Self::Submitted(outcome) => matches!(outcome, SubmitOutcome::Accepted(_)),
            Self::Retried(outcome) => matches!(outcome, RetryOutcome::Accepted(_)),
            Self::SimulationToggled { .. } | Self::WebSearchToggled { .. } => true,
            Self::ModelSelected { accepted, .. } => *accepted,
            Self::Stopped { was_in_flight } => *was_in_flight,
            Self::ErrorAcknowledged { was_error } => *was_error,
            Self::Copied { written } => *written,
        }
    }
}

impl ChatSession {
    /// Routes one command to the matching session operation.
    pub fn dispatch(&mut self, command: SessionCommand) -> CommandOutcome {
        tracing::trace!(command = ?command, "dispatching session command");

        match command {
            SessionCommand::Submit(input) => CommandOutcome::Submitted(self.submit(input)),
            SessionCommand::SubmitPending => CommandOutcome::Submitted(self.submit_pending()),
            SessionCommand::ToggleSimulation => CommandOutcome::SimulationToggled {
                enabled: self.toggle_simulation_mode(),
            },
            SessionCommand::ToggleWebSearch => CommandOutcome::WebSearchToggled {
                enabled: self.toggle_web_search(),
            },
            SessionCommand::SelectModel(model_id) => {
                let accepted = self.select_model(&model_id);
                CommandOutcome::ModelSelected { model_id, accepted }
            }
            SessionCommand::Retry => CommandOutcome::Retried(self.retry()),
            SessionCommand::Stop => CommandOutcome::Stopped {
                was_in_flight: self.stop(),
            },
            SessionCommand::AcknowledgeError => CommandOutcome::ErrorAcknowledged {
                was_error: self.acknowledge_error(),
            },
            SessionCommand::Copy {
                message_id,
                part_index,
            } => CommandOutcome::Copied {
                written: self.copy_part(&message_id, part_index),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::session::{Production, SessionConfig, SubmitRejection};
    use crate::chat::status::StreamingStatus;

    #[test]
    fn submit_and_retry_route_through_the_session() {
        let mut session = ChatSession::new(SessionConfig::default());

        let outcome = session.dispatch(SessionCommand::Submit(SubmitInput::text("hi")));
        assert!(outcome.took_effect());
        assert_eq!(session.displayed().len(), 2);

        let outcome = session.dispatch(SessionCommand::Retry);
        assert!(matches!(
            outcome,
            CommandOutcome::Retried(RetryOutcome::Accepted(Production::Simulated { .. }))
        ));
        assert_eq!(session.displayed().len(), 2);
    }

    #[test]
    fn no_op_commands_report_no_effect() {
        let mut session = ChatSession::new(SessionConfig::default());

        for command in [
            SessionCommand::SubmitPending,
            SessionCommand::Stop,
            SessionCommand::AcknowledgeError,
            SessionCommand::Retry,
            SessionCommand::SelectModel("vendor/unknown".to_string()),
        ] {
            assert!(!session.dispatch(command).took_effect());
        }
        assert_eq!(
            session.dispatch(SessionCommand::SubmitPending),
            CommandOutcome::Submitted(SubmitOutcome::Rejected(SubmitRejection::EmptyInput))
        );
        assert_eq!(session.status(), StreamingStatus::Idle);
        assert!(session.store().is_showing_preview());
    }

    #[test]
    fn toggles_report_new_state() {
        let mut session = ChatSession::new(SessionConfig::default());
        assert_eq!(
            session.dispatch(SessionCommand::ToggleSimulation),
            CommandOutcome::SimulationToggled { enabled: false }
        );
        assert_eq!(
            session.dispatch(SessionCommand::ToggleWebSearch),
            CommandOutcome::WebSearchToggled { enabled: true }
        );
        assert_eq!(
            session.dispatch(SessionCommand::SelectModel(
                "deepseek/deepseek-r1".to_string()
            )),
            CommandOutcome::ModelSelected {
                model_id: "deepseek/deepseek-r1".to_string(),
                accepted: true,
            }
        );
    }

    #[test]
    fn copy_without_sink_is_absorbed() {
        let mut session = ChatSession::new(SessionConfig::default());
        let preview_reply = session.displayed()[1].id.clone();
        assert_eq!(
            session.dispatch(SessionCommand::Copy {
                message_id: preview_reply,
                part_index: 1,
            }),
            CommandOutcome::Copied { written: false }
        );
    }
}
