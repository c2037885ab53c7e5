use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{SettingsError, SettingsResult};
use super::settings_model::Settings;
use super::settings_repository::SettingsRepository;
use crate::repositories::conversation_repository::BoxFuture;

pub struct SettingsJsonRepository {
    file_path: PathBuf,
}

impl SettingsJsonRepository {
    /// Create repository with XDG-compliant path
    pub fn new() -> SettingsResult<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SettingsError::PathError("Cannot determine config directory".into()))?;

        Ok(Self::with_path(config_dir.join("parley").join("settings.json")))
    }

    pub fn with_path(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

impl SettingsRepository for SettingsJsonRepository {
    fn load(&self) -> BoxFuture<'static, SettingsResult<Settings>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = ?path, "No settings file, using defaults");
                    return Ok(Settings::default());
                }
                Err(e) => return Err(e.into()),
            };

            let settings: Settings = serde_json::from_str(&contents)?;
            Ok(settings)
        })
    }

    fn save(&self, settings: Settings) -> BoxFuture<'static, SettingsResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let json = serde_json::to_string_pretty(&settings)?;

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            // Write atomically using temp file + rename
            let temp_path = path.with_extension("json.tmp");
            tokio::fs::write(&temp_path, json).await?;
            tokio::fs::rename(&temp_path, &path).await?;

            Ok(())
        })
    }
}
