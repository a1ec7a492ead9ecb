use std::path::PathBuf;

use thiserror::Error;

use crate::payload::FrameError;

/// Represents all possible errors that can occur during the app's lifecycle
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to create directory \"{path}\": {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read file \"{path}\": {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write file \"{path}\": {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error parsing config: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Bluetooth Error: {0}")]
    Bt(#[from] btleplug::Error),
    #[error("TOML Serialization Error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Payload Error: {0}")]
    Frame(#[from] FrameError),
    #[error("Logging setup failed: {0}")]
    Logging(String),
    // My errors
    #[error("Failed to get working directory")]
    WorkDir,
    #[error("Config file \"{0}\" is required but doesn't exist")]
    ConfigMissing(PathBuf),
    #[error("Invalid UUID in config for {field}: \"{value}\"")]
    ConfigUuid { field: &'static str, value: String },
    #[error("{0}")]
    InvalidMedication(String),
    #[error("No medication at position {index} (list has {len})")]
    NoSuchMedication { index: usize, len: usize },
    #[error("Please load medication data")]
    NothingToSend,
    #[error("No Bluetooth adapters found! Make sure it's plugged in and enabled.")]
    NoAdapter,
    #[error("Please select a BLE device")]
    NoDeviceSelected,
    #[error("Device \"{0}\" wasn't found during the scan")]
    DeviceNotFound(String),
    #[error("Connection timed out")]
    ConnectTimeout,
    #[error("Failed to connect: {0}")]
    ConnectFailed(String),
    #[error("No data characteristic available")]
    NoCharacteristic,
    #[error("Dry run payload mismatch: {0}")]
    DryRunMismatch(String),
    #[error("Cancelled")]
    Cancelled,
}

impl AppError {
    /// Errors the user can fix by reconnecting or moving closer to the dispenser.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Bt(_)
                | Self::ConnectTimeout
                | Self::ConnectFailed(_)
                | Self::NoCharacteristic
                | Self::DeviceNotFound(_)
        )
    }
}
