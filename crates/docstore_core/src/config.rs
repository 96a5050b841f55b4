//! Environment-driven process configuration.
//!
//! # Responsibility
//! - Read every tunable of the store from `DOCSTORE_*` variables.
//! - Reject unparsable values up front instead of falling back silently.
//!
//! # Invariants
//! - Blank values behave like unset ones.
//! - Numeric limits are strictly positive.

use crate::cache::{CacheConfig, DEFAULT_CACHE_MAX_COST};
use crate::logging::default_log_level;
use crate::pipeline::PipelineConfig;
use crate::repo::document_repo::DEFAULT_SEARCH_LIMIT;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DB_PATH_ENV: &str = "DOCSTORE_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "DOCSTORE_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "DOCSTORE_LOG_DIR";
pub const CACHE_MAX_COST_ENV: &str = "DOCSTORE_CACHE_MAX_COST";
pub const CACHE_TTL_SECS_ENV: &str = "DOCSTORE_CACHE_TTL_SECS";
pub const INSERT_TIMEOUT_MS_ENV: &str = "DOCSTORE_INSERT_TIMEOUT_MS";
pub const SEARCH_LIMIT_ENV: &str = "DOCSTORE_SEARCH_LIMIT";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "{name} is unset"),
            Self::Invalid {
                name,
                value,
                reason,
            } => write!(f, "invalid value `{value}` for {name}: {reason}"),
        }
    }
}

impl Error for ConfigError {}

/// Fully resolved process configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file; `:memory:` selects an in-memory database.
    pub db_path: PathBuf,
    pub log_level: String,
    /// Absolute log directory. File logging stays off when `None`.
    pub log_dir: Option<String>,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
    pub search_limit: u32,
}

impl StoreConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let read = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let db_path = read(DB_PATH_ENV)
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(DB_PATH_ENV))?;
        let log_level = read(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string());
        let log_dir = read(LOG_DIR_ENV);

        let max_cost = positive::<u64>(CACHE_MAX_COST_ENV, read(CACHE_MAX_COST_ENV))?
            .unwrap_or(DEFAULT_CACHE_MAX_COST);
        let time_to_live =
            positive::<u64>(CACHE_TTL_SECS_ENV, read(CACHE_TTL_SECS_ENV))?.map(Duration::from_secs);
        let insert_timeout = positive::<u64>(INSERT_TIMEOUT_MS_ENV, read(INSERT_TIMEOUT_MS_ENV))?
            .map(Duration::from_millis);
        let search_limit = positive::<u32>(SEARCH_LIMIT_ENV, read(SEARCH_LIMIT_ENV))?
            .unwrap_or(DEFAULT_SEARCH_LIMIT);

        Ok(Self {
            db_path,
            log_level,
            log_dir,
            cache: CacheConfig {
                max_cost,
                time_to_live,
            },
            pipeline: PipelineConfig { insert_timeout },
            search_limit,
        })
    }
}

fn positive<T>(name: &'static str, raw: Option<String>) -> ConfigResult<Option<T>>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<T>() {
        Ok(value) if value > T::default() => Ok(Some(value)),
        Ok(_) => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "must be greater than zero",
        }),
        Err(_) => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "not an unsigned integer",
        }),
    }
}
