use crate::domain::validation::TransactionLimits;
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("utc_offset_minutes {0} is outside +/-24h")]
    InvalidOffset(i32),
    #[error("invalid [limits]: {0}")]
    InvalidLimits(&'static str),
}

/// Runtime configuration, read from a TOML file. Every section is optional.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct AtmConfig {
    #[serde(default)]
    pub limits: TransactionLimits,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defines where one calendar day ends and the next begins.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct CalendarConfig {
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AtmConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.calendar.utc_offset()?;
        if let Some(reason) = config.limits.invalid_limit() {
            return Err(ConfigError::InvalidLimits(reason));
        }
        Ok(config)
    }
}

impl CalendarConfig {
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::InvalidOffset(self.utc_offset_minutes))
    }
}
