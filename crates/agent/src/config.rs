//! Agent configuration
//!
//! The disruption settings come from unprefixed environment variables with
//! defaults: `SCHEDULE`, `NAMESPACE`, `LABEL_SELECTOR`, `NUM_PODS` and
//! `JITTER`. Agent-level settings use the `AGENT_` prefix (`AGENT_API_PORT`)
//! so service link variables injected by Kubernetes, such as `API_PORT`, are
//! never picked up. Empty variables count as unset.

use chaos_lib::{CronSchedule, DisruptionConfig, ScheduleError};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration from environment: {0}")]
    Load(#[from] config::ConfigError),

    #[error("NUM_PODS must be at least 1")]
    InvalidPodCount,

    #[error("invalid SCHEDULE: {0}")]
    InvalidSchedule(#[from] ScheduleError),
}

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Five-field cron expression
    #[serde(default = "default_schedule")]
    pub schedule: String,

    /// Namespace of the target pods
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Label selector of the target pods
    #[serde(default = "default_label_selector")]
    pub label_selector: String,

    /// Pods deleted per tick
    #[serde(default = "default_num_pods")]
    pub num_pods: u32,

    /// Maximum random delay before each tick, in seconds
    #[serde(default = "default_jitter")]
    pub jitter: u64,

    /// Port for the health/metrics server, read from `AGENT_API_PORT`
    #[serde(skip, default = "default_api_port")]
    pub api_port: u16,
}

/// Settings under the `AGENT_` prefix
#[derive(Debug, Deserialize)]
struct ServerSettings {
    #[serde(default = "default_api_port")]
    api_port: u16,
}

fn default_schedule() -> String {
    "* * * * *".to_string()
}

fn default_namespace() -> String {
    "workloads".to_string()
}

fn default_label_selector() -> String {
    "app=nginx".to_string()
}

fn default_num_pods() -> u32 {
    2
}

fn default_jitter() -> u64 {
    10
}

fn default_api_port() -> u16 {
    8080
}

impl AgentConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_vars(None)
    }

    /// Load from an explicit variable map instead of the process environment
    fn from_vars(vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let disruption = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .ignore_empty(true)
                    .source(vars.clone()),
            )
            .build()?;
        let server = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("AGENT")
                    .ignore_empty(true)
                    .source(vars),
            )
            .build()?;

        let mut agent: AgentConfig = disruption.try_deserialize()?;
        let server: ServerSettings = server.try_deserialize()?;
        agent.api_port = server.api_port;
        agent.validate()?;
        Ok(agent)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.num_pods == 0 {
            return Err(ConfigError::InvalidPodCount);
        }
        self.cron_schedule()?;
        Ok(())
    }

    pub fn cron_schedule(&self) -> Result<CronSchedule, ScheduleError> {
        CronSchedule::parse(&self.schedule)
    }

    /// Settings handed to the disruption job
    pub fn disruption(&self) -> DisruptionConfig {
        DisruptionConfig {
            namespace: self.namespace.clone(),
            label_selector: self.label_selector.clone(),
            pod_count: self.num_pods,
            jitter: Duration::from_secs(self.jitter),
        }
    }
}
