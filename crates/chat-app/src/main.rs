use std::sync::Arc;
use std::time::Duration;

use parley::chat::{
    ChatSession, CommandOutcome, PresentationIntent, SessionCommand, StreamingStatus,
    TranscriptView,
};
use parley::clipboard::CopySink;
use parley::settings::{SessionSettings, SettingsStore};
use parley_llm::{Attachment, ScriptedTransport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const LOOPBACK_STEP_DELAY: Duration = Duration::from_millis(120);

const HELP: &str = "\
commands:
  <text>              submit text (plus any pending attachments)
  /attach <url> [mt]  add an attachment to the next submission
  /sim                toggle simulation mode
  /search             toggle web search
  /model <id>         select a model
  /retry              regenerate the last reply
  /stop               cancel the in-flight request
  /copy               copy the last reply text
  /ack                dismiss an error
  /help               show this help
  /quit               exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
    Session(SessionCommand),
    Text(String),
    Attach(Attachment),
    CopyLatest,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(command) = line.strip_prefix('/') else {
        return ReplCommand::Text(line.to_string());
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args = words.collect::<Vec<_>>();

    match (name, args.as_slice()) {
        ("sim", []) => ReplCommand::Session(SessionCommand::ToggleSimulation),
        ("search", []) => ReplCommand::Session(SessionCommand::ToggleWebSearch),
        ("model", [model_id]) => {
            ReplCommand::Session(SessionCommand::SelectModel((*model_id).to_string()))
        }
        ("retry", []) => ReplCommand::Session(SessionCommand::Retry),
        ("stop", []) => ReplCommand::Session(SessionCommand::Stop),
        ("ack", []) => ReplCommand::Session(SessionCommand::AcknowledgeError),
        ("attach", [url]) => ReplCommand::Attach(attachment(url, guess_media_type(url))),
        ("attach", [url, media_type]) => ReplCommand::Attach(attachment(url, media_type)),
        ("copy", []) => ReplCommand::CopyLatest,
        ("help", []) => ReplCommand::Help,
        ("quit" | "exit", []) => ReplCommand::Quit,
        _ => ReplCommand::Unknown(line.to_string()),
    }
}

fn attachment(url: &str, media_type: &str) -> Attachment {
    let attachment = Attachment::new(media_type, url);
    match url.rsplit('/').next().filter(|name| !name.is_empty()) {
        Some(filename) => attachment.with_filename(filename),
        None => attachment,
    }
}

fn guess_media_type(url: &str) -> &'static str {
    let lower = url.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

fn format_transcript(view: &TranscriptView, status: StreamingStatus) -> String {
    let mut out = String::new();
    for message in &view.messages {
        out.push_str(&format!("[{:?}] {}\n", message.role, message.message_id));
        for part in &message.parts {
            match &part.intent {
                PresentationIntent::Prose {
                    text, affordances, ..
                } => {
                    out.push_str(&format!("  {text}\n"));
                    if !affordances.is_empty() {
                        out.push_str("  (/retry, /copy)\n");
                    }
                }
                PresentationIntent::Reasoning { text, live } => {
                    let marker = if *live { "thinking..." } else { "reasoning" };
                    out.push_str(&format!("  <{marker}> {text}\n"));
                }
            }
        }
        if let Some(list) = &message.citations {
            out.push_str(&format!("  Used {} sources\n", list.count));
            for citation in &list.citations {
                out.push_str(&format!("    - {} <{}>\n", citation.label, citation.href));
            }
        }
    }
    if view.show_loader {
        out.push_str("  ...\n");
    }
    out.push_str(&format!("status: {status:?}\n"));
    out
}

fn print_transcript(session: &ChatSession) {
    let view = session.render();
    println!("{}", format_transcript(&view, session.status()));
    if let Some(message) = session.stream_state().error_message() {
        println!("error: {message} (/ack to dismiss)");
    }
}

/// Index of the last narrative part of the tail message, if any.
fn latest_copy_target(session: &ChatSession) -> Option<SessionCommand> {
    let message = session.displayed().last()?;
    let part_index = message
        .parts()
        .iter()
        .rposition(|part| part.narrative().is_some())?;
    Some(SessionCommand::Copy {
        message_id: message.id.clone(),
        part_index,
    })
}

fn persist_toggles(store: &SettingsStore, session: &ChatSession) {
    let config = session.config();
    let settings = SessionSettings {
        simulation_enabled: config.simulation_enabled,
        web_search: config.web_search,
        default_model: config.model_id.clone(),
        ..(*store.settings()).clone()
    };
    if let Err(error) = store.update(settings) {
        tracing::warn!(error = %error, "failed to persist settings");
    }
}

fn copy_sink() -> Arc<dyn CopySink> {
    #[cfg(feature = "system-clipboard")]
    let sink: Arc<dyn CopySink> = Arc::new(parley::clipboard::SystemClipboard);
    #[cfg(not(feature = "system-clipboard"))]
    let sink: Arc<dyn CopySink> = Arc::new(parley::clipboard::MemoryClipboard::default());
    sink
}

/// Returns false when the REPL should exit.
fn handle_line(session: &mut ChatSession, store: &SettingsStore, line: &str) -> bool {
    match parse_command(line) {
        ReplCommand::Quit => return false,
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Unknown(line) => println!("unknown command: {line} (/help)"),
        ReplCommand::Attach(attachment) => {
            println!("attached {}", attachment.url);
            session.add_attachment(attachment);
        }
        ReplCommand::Text(text) => {
            session.set_input_text(text);
            let outcome = session.dispatch(SessionCommand::SubmitPending);
            if !outcome.took_effect() {
                println!("not submitted: {outcome:?}");
            }
        }
        ReplCommand::CopyLatest => match latest_copy_target(session) {
            Some(command) => match session.dispatch(command) {
                CommandOutcome::Copied { written: true } => println!("copied"),
                _ => println!("copy failed"),
            },
            None => println!("nothing to copy"),
        },
        ReplCommand::Session(command) => {
            let persist = matches!(
                command,
                SessionCommand::ToggleSimulation
                    | SessionCommand::ToggleWebSearch
                    | SessionCommand::SelectModel(_)
            );
            let outcome = session.dispatch(command);
            println!("{outcome:?}");
            if persist && outcome.took_effect() {
                persist_toggles(store, session);
            }
        }
    }

    print_transcript(session);
    true
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = SettingsStore::load();
    let config = store.settings().to_session_config();
    tracing::info!(
        path = ?store.config_path(),
        simulation_enabled = config.simulation_enabled,
        model_id = %config.model_id,
        "loaded session settings"
    );

    let transport =
        ScriptedTransport::loopback(LOOPBACK_STEP_DELAY).with_models(config.models.clone());
    let mut session = ChatSession::new(config)
        .with_transport(Arc::new(transport))
        .with_copy_sink(copy_sink());

    println!("{HELP}\n");
    print_transcript(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&mut session, &store, &line) {
                        break;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    tracing::error!(error = %error, "failed to read stdin");
                    break;
                }
            },
            still_in_flight = session.next_event(), if session.is_in_flight() => {
                if !still_in_flight {
                    print_transcript(&session);
                }
            }
        }
    }

    session.stop();
}
