//! Process configuration, read once from the environment at startup.
//!
//! Unset variables fall back to defaults (logged at `info`); a variable that is set but cannot be
//! parsed aborts startup.

use common::scan::{FieldPair, ScanFields, DEFAULT_RAW_FIELD};
use log::info;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_ID_FIELDS: &str = "groupID:plant,groupID:plantID,groupId:plantId";

#[derive(Debug, Error)]
#[error("invalid value for {key}: {reason}")]
pub struct ConfigError {
    key: &'static str,
    reason: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. `*` allows any.
    pub allowed_origins: Vec<String>,
    pub database_url: String,
    /// Only meaningful for networked stores; SQLite ignores it.
    pub db_tls_verify: bool,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub scan_fields: ScanFields,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &'static str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| {
                info!("{key} not set, using default: {default}");
                default.to_string()
            })
        };

        let allowed_origins = split_list(&var("FRONTEND_URL", "http://localhost:3000"));
        let scan_fields = ScanFields {
            raw: var("SCAN_RAW_FIELD", DEFAULT_RAW_FIELD),
            pairs: parse_field_pairs(&var("SCAN_ID_FIELDS", DEFAULT_ID_FIELDS))?,
        };

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port: parse("PORT", &var("PORT", "5001"))?,
            allowed_origins,
            database_url: var("DATABASE_URL", "./PlantList.db"),
            db_tls_verify: parse_bool("DB_TLS_VERIFY", &var("DB_TLS_VERIFY", "true"))?,
            upload_dir: PathBuf::from(var("UPLOAD_DIR", "./uploads")),
            max_upload_bytes: parse("MAX_UPLOAD_BYTES", &var("MAX_UPLOAD_BYTES", "10485760"))?,
            scan_fields,
        })
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError {
        key,
        reason: e.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError {
            key,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `group:plant` pairs separated by commas, e.g. `groupID:plant,groupId:plantId`.
fn parse_field_pairs(value: &str) -> Result<Vec<FieldPair>, ConfigError> {
    let pairs = split_list(value)
        .iter()
        .map(|item| match item.split_once(':') {
            Some((group, plant)) if !group.trim().is_empty() && !plant.trim().is_empty() => {
                Ok(FieldPair::new(group.trim(), plant.trim()))
            }
            _ => Err(ConfigError {
                key: "SCAN_ID_FIELDS",
                reason: format!("'{item}' is not a group:plant pair"),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if pairs.is_empty() {
        return Err(ConfigError {
            key: "SCAN_ID_FIELDS",
            reason: "at least one group:plant pair is required".to_string(),
        });
    }
    Ok(pairs)
}
