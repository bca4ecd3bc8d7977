//! Library for the pod chaos agent
//!
//! This crate provides the core functionality for:
//! - Cluster session bootstrap and pod list/delete access
//! - The randomized disruption job
//! - Cron parsing and the scheduling loop
//! - Health checks and observability

pub mod cluster;
pub mod disruption;
pub mod health;
pub mod models;
pub mod observability;
pub mod scheduler;

pub use cluster::{ClusterError, ClusterSession, CredentialSource, KubePodApi, PodApi};
pub use disruption::{DisruptionConfig, DisruptionJob, DisruptionJobBuilder};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ChaosLogger, ChaosMetrics};
pub use scheduler::{CronSchedule, CronScheduler, ScheduleError, ScheduledJob};
