use std::sync::Mutex;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SinkError {
    #[snafu(display("copy destination is unavailable on `{stage}`: {details}"))]
    ClipboardUnavailable {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("failed to write copy destination on `{stage}`: {details}"))]
    ClipboardWrite {
        stage: &'static str,
        details: String,
    },
}

pub type SinkResult<T> = Result<T, SinkError>;

/// External destination for copied text.
pub trait CopySink: Send + Sync {
    fn write_text(&self, text: &str) -> SinkResult<()>;
}

/// In-process clipboard holding the last copied text.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .ok()
            .and_then(|contents| contents.clone())
    }
}

impl CopySink for MemoryClipboard {
    fn write_text(&self, text: &str) -> SinkResult<()> {
        let mut contents = self.contents.lock().map_err(|error| {
            ClipboardWriteSnafu {
                stage: "memory-clipboard-lock",
                details: error.to_string(),
            }
            .build()
        })?;
        *contents = Some(text.to_string());
        Ok(())
    }
}

/// Operating system clipboard.
#[cfg(feature = "system-clipboard")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

#[cfg(feature = "system-clipboard")]
impl CopySink for SystemClipboard {
    fn write_text(&self, text: &str) -> SinkResult<()> {
        let mut clipboard = arboard::Clipboard::new().map_err(|error| {
            ClipboardUnavailableSnafu {
                stage: "system-clipboard-open",
                details: error.to_string(),
            }
            .build()
        })?;
        clipboard.set_text(text).map_err(|error| {
            ClipboardWriteSnafu {
                stage: "system-clipboard-set-text",
                details: error.to_string(),
            }
            .build()
        })
    }
}
