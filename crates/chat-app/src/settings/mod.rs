pub mod state;

pub use state::{ModelSettings, SessionSettings, SettingsError, SettingsResult, SettingsStore};
