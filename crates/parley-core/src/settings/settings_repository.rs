use super::error::SettingsResult;
use super::settings_model::Settings;
use crate::repositories::conversation_repository::BoxFuture;

pub trait SettingsRepository: Send + Sync + 'static {
    /// Load settings, falling back to defaults when nothing is stored
    fn load(&self) -> BoxFuture<'static, SettingsResult<Settings>>;

    fn save(&self, settings: Settings) -> BoxFuture<'static, SettingsResult<()>>;
}
