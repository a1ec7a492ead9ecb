use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File as ConfigFile, FileFormat};
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;
use uuid::Uuid;

use crate::errors::AppError;
use crate::payload::Markers;
use crate::qr::{QrGrammar, QrOptions};

pub const DISPENSER_SERVICE_UUID: Uuid = Uuid::from_u128(0x12345678_1234_1234_1234_123456789abc);
pub const DISPENSER_DATA_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x87654321_4321_4321_4321_cba987654321);

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BLESettings {
    pub service_uuid: String,
    pub characteristic_uuid: String,
    pub scan_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub saved_name: String,
    pub saved_address: String,
}

impl BLESettings {
    pub fn service(&self) -> Result<Uuid, AppError> {
        parse_uuid("ble.service_uuid", &self.service_uuid)
    }
    pub fn characteristic(&self) -> Result<Uuid, AppError> {
        parse_uuid("ble.characteristic_uuid", &self.characteristic_uuid)
    }
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
    /// Saved address, falling back to the saved name.
    pub fn saved_selector(&self) -> Option<&str> {
        [self.saved_address.as_str(), self.saved_name.as_str()]
            .into_iter()
            .find(|s| !s.is_empty())
    }
}

fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value).map_err(|_| AppError::ConfigUuid {
        field,
        value: value.to_owned(),
    })
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TransmitSettings {
    pub chunk_size: usize,
    pub chunk_delay_ms: u64,
    pub start_marker: String,
    pub end_marker: String,
    pub with_response: bool,
}

impl TransmitSettings {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
    pub fn markers(&self) -> Markers {
        Markers {
            start: self.start_marker.clone(),
            end: self.end_marker.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct QrSettings {
    pub grammar: QrGrammar,
    pub default_dosage: String,
}

impl QrSettings {
    pub fn options(&self) -> QrOptions {
        QrOptions {
            grammar: self.grammar,
            default_dosage: self.default_dosage.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MiscSettings {
    log_level: String,
    pub store_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    pub ble: BLESettings,
    pub transmit: TransmitSettings,
    pub qr: QrSettings,
    pub misc: MiscSettings,
}

impl Settings {
    /// Loads the TOML file at `config_path` over the built-in defaults.
    pub fn load(config_path: &Path, required: bool) -> Result<Self, AppError> {
        if required && !config_path.exists() {
            return Err(AppError::ConfigMissing(config_path.to_owned()));
        }

        let default_log_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };

        let s = Config::builder()
            .add_source(
                ConfigFile::from(config_path)
                    .format(FileFormat::Toml)
                    .required(required),
            )
            .set_default("ble.service_uuid", DISPENSER_SERVICE_UUID.to_string())?
            .set_default(
                "ble.characteristic_uuid",
                DISPENSER_DATA_CHARACTERISTIC_UUID.to_string(),
            )?
            .set_default("ble.scan_timeout_secs", 10)?
            .set_default("ble.connect_timeout_secs", 10)?
            .set_default("ble.saved_name", "")?
            .set_default("ble.saved_address", "")?
            .set_default("transmit.chunk_size", 20)?
            .set_default("transmit.chunk_delay_ms", 200)?
            .set_default("transmit.start_marker", crate::payload::START_MARKER)?
            .set_default("transmit.end_marker", crate::payload::END_MARKER)?
            .set_default("transmit.with_response", true)?
            .set_default("qr.grammar", "strict")?
            .set_default("qr.default_dosage", "1 tablet")?
            .set_default("misc.log_level", default_log_level)?
            .set_default("misc.store_path", "medications.json")?
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        debug!("Loaded settings: {settings:?}");
        Ok(settings)
    }

    fn validate(&self) -> Result<(), AppError> {
        self.ble.service()?;
        self.ble.characteristic()?;
        let invalid = |msg: &str| Err(AppError::Config(config::ConfigError::Message(msg.into())));
        if self.transmit.chunk_size == 0 {
            return invalid("transmit.chunk_size must be at least 1");
        }
        if self.transmit.start_marker.is_empty() || self.transmit.end_marker.is_empty() {
            return invalid("transmit markers can't be empty");
        }
        if !self.transmit.start_marker.is_ascii() || !self.transmit.end_marker.is_ascii() {
            return invalid("transmit markers must be ASCII");
        }
        Ok(())
    }

    pub fn save(&self, config_path: &Path) -> Result<(), AppError> {
        let toml_string = toml::to_string(self)?;
        std::fs::write(config_path, toml_string).map_err(|e| AppError::WriteFile {
            path: config_path.to_owned(),
            source: e,
        })?;
        info!("Saved settings to {}", config_path.display());
        Ok(())
    }

    pub fn get_log_level(&self) -> LevelFilter {
        match self.misc.log_level.to_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "error" => LevelFilter::ERROR,
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO,
        }
    }
}
