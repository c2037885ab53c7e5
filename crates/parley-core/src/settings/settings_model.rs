use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::stream_manager::DEFAULT_FLUSH_INTERVAL;
use crate::render::syntax_highlighter::DEFAULT_THEME;

/// User configuration, stored as `settings.json` in the config directory.
///
/// Unknown or missing fields fall back to their defaults so older files keep
/// loading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the OpenAI-compatible API, without the `/chat/completions` path
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub system_prompt: Option<String>,
    /// How often streaming buffer updates are published; 0 publishes every fragment
    pub flush_interval_ms: u64,
    /// Where `chats.json` lives (None = platform data directory)
    pub data_dir: Option<PathBuf>,
    pub highlight_theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            system_prompt: None,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL.as_millis() as u64,
            data_dir: None,
            highlight_theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl Settings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Directory for the conversation blob
    pub fn conversations_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("parley")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"model":"llama3","flush_interval_ms":0}"#).unwrap();

        assert_eq!(settings.model, "llama3");
        assert_eq!(settings.flush_interval(), Duration::ZERO);
        assert_eq!(settings.base_url, "https://api.openai.com/v1");
        assert_eq!(settings.highlight_theme, "base16-ocean.dark");
        assert!(settings.system_prompt.is_none());
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let settings = Settings {
            data_dir: Some(PathBuf::from("/tmp/parley-test")),
            ..Settings::default()
        };
        assert_eq!(
            settings.conversations_dir(),
            Some(PathBuf::from("/tmp/parley-test"))
        );
    }

    #[test]
    fn test_api_key_from_unset_variable() {
        let settings = Settings {
            api_key_env: "PARLEY_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Settings::default()
        };
        assert!(settings.api_key().is_none());
    }
}
