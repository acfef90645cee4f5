//! arenagrid.toml configuration parser.
//!
//! Every section and field is optional; missing values take the defaults
//! below. Durations are written as strings: `"250ms"`, `"15s"`, `"5m"`, or
//! a bare number of seconds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::LaunchType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub broker: BrokerConfig,
    pub scaler: ScalerConfig,
    pub fleet: FleetConfig,
    pub cluster: ClusterConfig,
}

/// Session broker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Fleet group claimed from when no reuse ticket is queued.
    pub game_server_group: String,
    #[serde(with = "duration_str")]
    pub visibility_timeout: Duration,
    #[serde(with = "duration_str")]
    pub wait_time: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            game_server_group: "ExampleGameServerGroup".to_string(),
            visibility_timeout: Duration::from_secs(15),
            wait_time: Duration::from_secs(1),
        }
    }
}

/// Capacity scaler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerConfig {
    pub cluster: String,
    /// Stack publishing the current task definition.
    pub stack_name: String,
    /// Output key under which the task definition is published.
    pub output_key: String,
    pub launch_type: LaunchType,
    /// CPU units reserved by one game server task.
    pub cpu_per_task: u64,
    /// Memory (MiB) reserved by one game server task.
    pub memory_per_task: u64,
    /// Upper bound on tasks started per iteration.
    pub batch_cap: u32,
    /// Wake-up period of the scaler.
    #[serde(with = "duration_str")]
    pub period: Duration,
    /// Headroom left before the next wake-up.
    #[serde(with = "duration_str")]
    pub grace: Duration,
    /// Pause between two iterations of one cycle.
    #[serde(with = "duration_str")]
    pub iteration_interval: Duration,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            cluster: "game-cluster".to_string(),
            stack_name: "fleetiq-game-servers-task-definition".to_string(),
            output_key: "TaskDefinition".to_string(),
            launch_type: LaunchType::Ec2,
            cpu_per_task: 512,
            memory_per_task: 953,
            batch_cap: 10,
            period: Duration::from_secs(60),
            grace: Duration::from_secs(1),
            iteration_interval: Duration::from_secs(1),
        }
    }
}

impl ScalerConfig {
    /// Wall-clock time one cycle may spend iterating.
    pub fn budget(&self) -> Duration {
        self.period.saturating_sub(self.grace)
    }
}

/// Standalone fleet settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// How long a claim holds a server before it becomes claimable again.
    #[serde(with = "duration_str")]
    pub claim_timeout: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            claim_timeout: Duration::from_secs(60),
        }
    }
}

/// Standalone cluster settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Nodes returned per `list_nodes` page.
    pub page_size: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

impl ArenaConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: ArenaConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let s = &self.scaler;
        if s.cpu_per_task == 0 || s.memory_per_task == 0 {
            return Err(ConfigError::Invalid(
                "scaler.cpu_per_task and scaler.memory_per_task must be positive".to_string(),
            ));
        }
        if s.period.is_zero() {
            return Err(ConfigError::Invalid("scaler.period must be positive".to_string()));
        }
        if s.grace >= s.period {
            return Err(ConfigError::Invalid(format!(
                "scaler.grace ({:?}) must be shorter than scaler.period ({:?})",
                s.grace, s.period
            )));
        }
        if s.iteration_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "scaler.iteration_interval must be positive".to_string(),
            ));
        }
        if self.cluster.page_size == 0 {
            return Err(ConfigError::Invalid("cluster.page_size must be positive".to_string()));
        }
        if self.broker.game_server_group.is_empty() {
            return Err(ConfigError::Invalid(
                "broker.game_server_group must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a duration string like `"250ms"`, `"30s"` or `"5m"`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn format_duration(d: Duration) -> String {
    if d.subsec_millis() != 0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{}s", d.as_secs())
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(de)?;
        super::parse_duration(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration {raw:?}")))
    }
}
