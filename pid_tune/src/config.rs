use crate::{logging::LoggingConfig, models::Axis};
use anyhow::Context as _;
use pid_quantizer::{Gain, PidGains};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_FILE: &str = "pid_tune.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found at {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read configuration file: {source}")]
    ReadError { source: std::io::Error },

    #[error("Failed to parse configuration: {source}")]
    ParseError { source: toml::de::Error },

    #[error("Failed to serialize configuration: {source}")]
    SerializeError { source: toml::ser::Error },

    #[error("Failed to write configuration file: {source}")]
    WriteError { source: std::io::Error },

    #[error("Configuration validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Deserialize, Debug, Serialize)]
pub struct TuneConfig {
    pub output_path: PathBuf,

    /// Leading sentinel word the firmware checks before trusting the EEPROM.
    pub magic: u16,
    /// Trailing ESC timer divider.
    pub esc_divider: u16,

    pub roll: PidGains,
    pub pitch: PidGains,
    pub yaw: PidGains,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TuneConfig {
    pub fn gains(&self, axis: Axis) -> &PidGains {
        match axis {
            Axis::Roll => &self.roll,
            Axis::Pitch => &self.pitch,
            Axis::Yaw => &self.yaw,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "output_path must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("promdata.eep"),

            magic: 0x55AA,
            esc_divider: 600,

            roll: PidGains::new(
                Gain::decimal(1013, 3),
                Gain::decimal(3335, 4),
                Gain::decimal(2, 1),
            ),
            pitch: PidGains::new(
                Gain::decimal(1013, 3),
                Gain::decimal(1, 1),
                Gain::decimal(2, 1),
            ),
            yaw: PidGains::new(
                Gain::decimal(1013, 3),
                Gain::decimal(1, 1),
                Gain::decimal(2, 1),
            ),

            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug)]
pub struct ConfigOptions {
    pub config_path: PathBuf,
    pub create_if_missing: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            create_if_missing: true,
        }
    }
}

impl ConfigOptions {
    pub fn default_config_path() -> PathBuf {
        std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    options: ConfigOptions,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            options: ConfigOptions::default(),
        }
    }

    pub fn with_options(options: ConfigOptions) -> Self {
        Self { options }
    }

    pub fn path(&self) -> &Path {
        &self.options.config_path
    }

    pub fn load(&self) -> anyhow::Result<TuneConfig> {
        let config_path = self.options.config_path.clone();

        if !config_path.exists() {
            if self.options.create_if_missing {
                let default_config = TuneConfig::default();
                self.save(&default_config)
                    .context("Failed to save default config")?;
                return Ok(default_config);
            } else {
                return Err(ConfigError::FileNotFound {
                    path: config_path.clone(),
                }
                .into());
            }
        }

        let content =
            fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError { source: e })?;

        let config: TuneConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError { source: e })?;

        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, config: &TuneConfig) -> anyhow::Result<()> {
        let config_path = &self.options.config_path;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError { source: e })?;
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(config_path, content).map_err(|e| ConfigError::WriteError { source: e })?;

        Ok(())
    }
}

pub fn init_config() -> anyhow::Result<(ConfigManager, TuneConfig)> {
    let manager = ConfigManager::new();
    let config = manager.load()?;
    Ok((manager, config))
}

pub fn create_default_config<P: AsRef<Path>>(path: Option<P>) -> anyhow::Result<()> {
    let config_path = path
        .map(|p| p.as_ref().to_path_buf())
        .unwrap_or_else(ConfigOptions::default_config_path);

    let options = ConfigOptions {
        config_path,
        create_if_missing: true,
    };

    let manager = ConfigManager::with_options(options);
    manager.save(&TuneConfig::default())?;

    Ok(())
}
