//! fleet.toml configuration parser.
//!
//! The on-disk model keeps every field optional so a partial file is valid;
//! [`FleetConfig::pool_config`] and [`FleetConfig::schedule_config`] fill in
//! defaults and turn duration strings into [`Duration`]s.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_DATA_DIR: &str = "/var/lib/fleet";
const DEFAULT_SPARE_POOL_SIZE: u32 = 0;
const DEFAULT_EXPIRY_AGE: Duration = Duration::from_secs(7 * 24 * 3600);
const DEFAULT_WRITE_MEMORY_INTERVAL: Duration = Duration::from_secs(3600);
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    pub state: Option<StateSection>,
    pub house_keeping: Option<HouseKeepingSection>,
    pub schedule: Option<ScheduleSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateSection {
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HouseKeepingSection {
    pub spare_pool_size: Option<u32>,
    pub appliance_expiry_age: Option<String>,
    pub load_balancer_expiry_age: Option<String>,
    pub write_memory_interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleSection {
    pub spare_check_interval: Option<String>,
    pub cleanup_interval: Option<String>,
}

/// Reconciler targets, read-only for the lifetime of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of unassigned appliances to keep warm.
    pub target_spare_size: u32,
    /// Minimum age of a soft-deleted appliance before it is purged.
    pub appliance_retention_age: Duration,
    /// Minimum age of a soft-deleted load balancer before it is purged.
    pub load_balancer_retention_age: Duration,
    /// Lookback window for write memory, also its tick interval.
    pub write_memory_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            target_spare_size: DEFAULT_SPARE_POOL_SIZE,
            appliance_retention_age: DEFAULT_EXPIRY_AGE,
            load_balancer_retention_age: DEFAULT_EXPIRY_AGE,
            write_memory_interval: DEFAULT_WRITE_MEMORY_INTERVAL,
        }
    }
}

/// How often the daemon fires each routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub spare_check_interval: Duration,
    pub cleanup_interval: Duration,
    pub write_memory_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            spare_check_interval: DEFAULT_CHECK_INTERVAL,
            cleanup_interval: DEFAULT_CHECK_INTERVAL,
            write_memory_interval: DEFAULT_WRITE_MEMORY_INTERVAL,
        }
    }
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Directory holding the state database.
    pub fn data_dir(&self) -> PathBuf {
        self.state
            .as_ref()
            .and_then(|s| s.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    pub fn pool_config(&self) -> Result<PoolConfig, ConfigError> {
        let defaults = PoolConfig::default();
        let Some(hk) = &self.house_keeping else {
            return Ok(defaults);
        };

        Ok(PoolConfig {
            target_spare_size: hk.spare_pool_size.unwrap_or(defaults.target_spare_size),
            appliance_retention_age: duration_or(
                "appliance_expiry_age",
                hk.appliance_expiry_age.as_deref(),
                defaults.appliance_retention_age,
            )?,
            load_balancer_retention_age: duration_or(
                "load_balancer_expiry_age",
                hk.load_balancer_expiry_age.as_deref(),
                defaults.load_balancer_retention_age,
            )?,
            write_memory_interval: duration_or(
                "write_memory_interval",
                hk.write_memory_interval.as_deref(),
                defaults.write_memory_interval,
            )?,
        })
    }

    pub fn schedule_config(&self) -> Result<ScheduleConfig, ConfigError> {
        let defaults = ScheduleConfig::default();
        let write_memory_interval = self.pool_config()?.write_memory_interval;
        let Some(sched) = &self.schedule else {
            return Ok(ScheduleConfig {
                write_memory_interval,
                ..defaults
            });
        };

        Ok(ScheduleConfig {
            spare_check_interval: duration_or(
                "spare_check_interval",
                sched.spare_check_interval.as_deref(),
                defaults.spare_check_interval,
            )?,
            cleanup_interval: duration_or(
                "cleanup_interval",
                sched.cleanup_interval.as_deref(),
                defaults.cleanup_interval,
            )?,
            write_memory_interval,
        })
    }
}

fn duration_or(
    field: &'static str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(v) => parse_duration(v).ok_or_else(|| ConfigError::InvalidDuration {
            field,
            value: v.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a duration string like "30s", "5m", "1h", "7d". A bare integer
/// is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, unit) = match s.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s, 's'),
    };
    let n: u64 = digits.trim().parse().ok()?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 24 * 3600,
        _ => return None,
    };
    n.checked_mul(multiplier).map(Duration::from_secs)
}
