use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read configuration {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid server address: {0}")]
    Address(String),
}
