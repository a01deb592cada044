use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use parley_llm::{DEFAULT_MODEL, Model};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::chat::session::SessionConfig;

pub const SETTINGS_DIRECTORY_NAME: &str = "parley";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl ModelSettings {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    fn normalized(mut self) -> Option<Self> {
        self.id = self.id.trim().to_string();
        if self.id.is_empty() {
            return None;
        }

        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            self.name = self.id.clone();
        }

        Some(self)
    }

    pub fn as_model(&self) -> Model {
        Model::new(self.id.clone(), self.name.clone())
    }
}

/// Session settings that persist across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_simulation_enabled")]
    pub simulation_enabled: bool,
    #[serde(default)]
    pub web_search: bool,
    #[serde(default = "default_model_id")]
    pub default_model: String,
    #[serde(default = "default_models")]
    pub models: Vec<ModelSettings>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            simulation_enabled: default_simulation_enabled(),
            web_search: false,
            default_model: default_model_id(),
            models: default_models(),
        }
    }
}

impl SessionSettings {
    pub fn normalized(mut self) -> Self {
        self.models = self
            .models
            .into_iter()
            .filter_map(ModelSettings::normalized)
            .collect();
        if self.models.is_empty() {
            self.models = default_models();
        }

        // The default must name a configured model so selection never starts unknown.
        let default_model = self.default_model.trim().to_string();
        self.default_model = if self.models.iter().any(|model| model.id == default_model) {
            default_model
        } else {
            self.models
                .first()
                .map(|model| model.id.clone())
                .unwrap_or_else(default_model_id)
        };

        self
    }

    pub fn configured_models(&self) -> Vec<Model> {
        self.models.iter().map(ModelSettings::as_model).collect()
    }

    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig::from_settings(self)
    }
}

impl SessionConfig {
    pub fn from_settings(settings: &SessionSettings) -> Self {
        let settings = settings.clone().normalized();
        Self {
            simulation_enabled: settings.simulation_enabled,
            web_search: settings.web_search,
            model_id: settings.default_model.clone(),
            models: settings.configured_models(),
        }
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<SessionSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".parley"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<SessionSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: SessionSettings) -> SettingsResult<()> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn load_from_disk(path: &Path) -> SessionSettings {
        if !path.exists() {
            tracing::info!(path = ?path, "settings file not found, using defaults");
            return SessionSettings::default();
        }

        let figment = Figment::from(Serialized::defaults(SessionSettings::default()))
            .merge(Json::file(path));

        match figment.extract::<SessionSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(path = ?path, error = %error, "failed to parse settings, using defaults");
                SessionSettings::default()
            }
        }
    }

    fn persist(&self, settings: &SessionSettings) -> SettingsResult<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!(path = ?self.config_path, "saved settings");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

fn default_simulation_enabled() -> bool {
    true
}

fn default_model_id() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_models() -> Vec<ModelSettings> {
    parley_llm::default_models()
        .into_iter()
        .map(|model| ModelSettings::new(model.id, model.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("parley-settings-{}", uuid::Uuid::now_v7()))
            .join(SETTINGS_FILE_NAME)
    }

    fn cleanup(path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn defaults_enable_simulation_with_two_models() {
        let settings = SessionSettings::default();
        assert!(settings.simulation_enabled);
        assert!(!settings.web_search);
        assert_eq!(settings.default_model, DEFAULT_MODEL);
        assert_eq!(
            settings
                .models
                .iter()
                .map(|model| model.id.as_str())
                .collect::<Vec<_>>(),
            vec!["openai/gpt-4o", "deepseek/deepseek-r1"]
        );
    }

    #[test]
    fn normalized_drops_blank_models_and_repairs_default() {
        let settings = SessionSettings {
            default_model: " missing/model ".to_string(),
            models: vec![
                ModelSettings::new("  ", "Blank"),
                ModelSettings::new(" local/echo ", ""),
            ],
            ..SessionSettings::default()
        }
        .normalized();

        assert_eq!(settings.models, vec![ModelSettings::new("local/echo", "local/echo")]);
        assert_eq!(settings.default_model, "local/echo");
    }

    #[test]
    fn normalized_restores_default_catalog_when_empty() {
        let settings = SessionSettings {
            models: Vec::new(),
            ..SessionSettings::default()
        }
        .normalized();
        assert_eq!(settings.models.len(), 2);
        assert_eq!(settings.default_model, DEFAULT_MODEL);
    }

    #[test]
    fn session_config_mirrors_settings() {
        let settings = SessionSettings {
            simulation_enabled: false,
            web_search: true,
            default_model: "deepseek/deepseek-r1".to_string(),
            ..SessionSettings::default()
        };

        let config = settings.to_session_config();
        assert!(!config.simulation_enabled);
        assert!(config.web_search);
        assert_eq!(config.model_id, "deepseek/deepseek-r1");
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[1].name, "Deepseek R1");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = scratch_path();
        let store = SettingsStore::new(path.clone());
        assert_eq!(*store.settings(), SessionSettings::default());
        assert!(!path.exists());
    }

    #[test]
    fn update_persists_and_reloads() {
        let path = scratch_path();
        let store = SettingsStore::new(path.clone());

        let settings = SessionSettings {
            simulation_enabled: false,
            web_search: true,
            ..SessionSettings::default()
        };
        store.update(settings.clone()).unwrap();

        assert_eq!(*store.settings(), settings);
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = SettingsStore::new(path.clone());
        assert_eq!(*reloaded.settings(), settings);
        cleanup(&path);
    }

    #[test]
    fn partial_file_is_merged_over_defaults() {
        let path = scratch_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, r#"{ "web_search": true }"#).unwrap();

        let settings = SettingsStore::new(path.clone()).settings();
        assert!(settings.web_search);
        assert!(settings.simulation_enabled);
        assert_eq!(settings.default_model, DEFAULT_MODEL);
        cleanup(&path);
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let path = scratch_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, "not json").unwrap();

        let store = SettingsStore::new(path.clone());
        assert_eq!(*store.settings(), SessionSettings::default());
        cleanup(&path);
    }
}
