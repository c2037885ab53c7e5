pub mod error;
pub mod settings_json_repository;
pub mod settings_model;
pub mod settings_repository;

pub use error::{SettingsError, SettingsResult};
pub use settings_json_repository::SettingsJsonRepository;
pub use settings_model::Settings;
pub use settings_repository::SettingsRepository;
