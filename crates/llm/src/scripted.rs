use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use snafu::ensure;
use tokio::sync::{mpsc, oneshot};

use super::model::{Model, default_models, find_model};
use super::transport::{
    EmptyRequestSnafu, StreamEvent, StreamEventPayload, StreamTarget, Transport, TransportPart,
    TransportRequest, TransportResult, TransportStreamHandle, TransportWorker, UnknownModelSnafu,
    make_event_stream,
};

pub const SCRIPTED_TRANSPORT_ID: &str = "scripted";

/// One step of a replayed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Emit(StreamEventPayload),
    Pause(Duration),
}

type ScriptFn = dyn Fn(&TransportRequest) -> Vec<ScriptStep> + Send + Sync;

/// Transport that replays a script computed from each request.
///
/// Stands in for a network backend in tests and in the demo binary. The
/// script is emitted verbatim, so a script without a terminal event models a
/// producer that hangs up early.
pub struct ScriptedTransport {
    id: String,
    models: Vec<Model>,
    script: Arc<ScriptFn>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&TransportRequest) -> Vec<ScriptStep> + Send + Sync + 'static,
    {
        Self {
            id: SCRIPTED_TRANSPORT_ID.to_string(),
            models: default_models(),
            script: Arc::new(script),
        }
    }

    /// Replays the same steps for every request.
    pub fn fixed(steps: Vec<ScriptStep>) -> Self {
        Self::new(move |_| steps.clone())
    }

    /// Echoes the request back as a reasoning trace plus a text answer, with a
    /// citation when web search was requested.
    pub fn loopback(step_delay: Duration) -> Self {
        Self::new(move |request| {
            let mut payloads = vec![
                StreamEventPayload::Submitted,
                StreamEventPayload::Part(TransportPart::Reasoning(format!(
                    "Routing the prompt to {} with {} attachment(s).",
                    request.model_id,
                    request.attachments.len()
                ))),
                StreamEventPayload::Part(TransportPart::Text(format!("You said: {}", request.text))),
            ];
            if request.web_search {
                payloads.push(StreamEventPayload::Part(TransportPart::SourceUrl {
                    url: "https://example.com/search".to_string(),
                    title: Some("Search results".to_string()),
                }));
            }
            payloads.push(StreamEventPayload::Completed);

            payloads
                .into_iter()
                .flat_map(|payload| [ScriptStep::Pause(step_delay), ScriptStep::Emit(payload)])
                .collect()
        })
    }

    pub fn with_models(mut self, models: Vec<Model>) -> Self {
        self.models = models;
        self
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    async fn run_script_worker(
        steps: Vec<ScriptStep>,
        target: StreamTarget,
        event_tx: mpsc::UnboundedSender<StreamEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        for step in steps {
            match step {
                ScriptStep::Pause(duration) => {
                    tokio::select! {
                        _ = &mut cancel_rx => {
                            tracing::debug!(target = ?target, "scripted stream cancelled");
                            return;
                        }
                        _ = tokio::time::sleep(duration) => {}
                    }
                }
                ScriptStep::Emit(payload) => {
                    if !matches!(
                        cancel_rx.try_recv(),
                        Err(oneshot::error::TryRecvError::Empty)
                    ) {
                        tracing::debug!(target = ?target, "scripted stream cancelled");
                        return;
                    }

                    let event = StreamEvent {
                        target: target.clone(),
                        payload,
                    };
                    if event_tx.send(event).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

impl Transport for ScriptedTransport {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, request: TransportRequest) -> TransportResult<TransportStreamHandle> {
        ensure!(
            !request.text.is_empty() || !request.attachments.is_empty(),
            EmptyRequestSnafu {
                stage: "scripted-send",
                target: request.target.clone(),
            }
        );
        ensure!(
            find_model(&self.models, &request.model_id).is_some(),
            UnknownModelSnafu {
                stage: "scripted-send",
                transport_id: self.id.clone(),
                model_id: request.model_id.clone(),
            }
        );

        let steps = (self.script)(&request);
        tracing::debug!(
            target = ?request.target,
            model_id = %request.model_id,
            step_count = steps.len(),
            "replaying scripted exchange"
        );

        let (event_tx, stream, cancel_rx) = make_event_stream(request.target.clone());
        let worker: TransportWorker =
            Self::run_script_worker(steps, request.target, event_tx, cancel_rx).boxed();

        Ok(TransportStreamHandle { stream, worker })
    }
}
