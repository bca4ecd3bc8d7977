//! Observability infrastructure for the chaos agent
//!
//! Provides:
//! - Prometheus metrics (ticks, deletions, API errors, jitter and tick latency)
//! - Structured JSON event logging with tracing

use crate::cluster::CredentialSource;
use crate::models::PodRef;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Buckets for the jitter sleep, in seconds
const JITTER_BUCKETS: &[f64] = &[0.0, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Buckets for full tick duration (jitter included), in seconds
const TICK_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ChaosMetricsInner> = OnceLock::new();

struct ChaosMetricsInner {
    ticks: IntCounter,
    ticks_skipped: IntCounter,
    pods_deleted: IntCounter,
    pod_delete_errors: IntCounter,
    pod_list_errors: IntCounter,
    candidates: IntGauge,
    jitter_seconds: Histogram,
    tick_duration_seconds: Histogram,
}

impl ChaosMetricsInner {
    fn new() -> Self {
        Self {
            ticks: register_int_counter!(
                "pod_chaos_ticks_total",
                "Number of times the disruption job has fired"
            )
            .expect("Failed to register ticks_total"),

            ticks_skipped: register_int_counter!(
                "pod_chaos_ticks_skipped_total",
                "Scheduled fire times skipped because the previous tick overran"
            )
            .expect("Failed to register ticks_skipped_total"),

            pods_deleted: register_int_counter!(
                "pod_chaos_pods_deleted_total",
                "Pods successfully deleted"
            )
            .expect("Failed to register pods_deleted_total"),

            pod_delete_errors: register_int_counter!(
                "pod_chaos_pod_delete_errors_total",
                "Pod delete calls that failed"
            )
            .expect("Failed to register pod_delete_errors_total"),

            pod_list_errors: register_int_counter!(
                "pod_chaos_pod_list_errors_total",
                "Pod list calls that failed"
            )
            .expect("Failed to register pod_list_errors_total"),

            candidates: register_int_gauge!(
                "pod_chaos_candidates",
                "Running pods matching the selector at the last tick"
            )
            .expect("Failed to register candidates"),

            jitter_seconds: register_histogram!(
                "pod_chaos_jitter_seconds",
                "Random delay applied before each tick",
                JITTER_BUCKETS.to_vec()
            )
            .expect("Failed to register jitter_seconds"),

            tick_duration_seconds: register_histogram!(
                "pod_chaos_tick_duration_seconds",
                "Wall time of a full disruption tick",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_duration_seconds"),
        }
    }
}

/// Lightweight handle to the global chaos metrics
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct ChaosMetrics {
    _private: (),
}

impl Default for ChaosMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ChaosMetrics {
    /// Create a new metrics handle (registers the collectors on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ChaosMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ChaosMetricsInner {
        GLOBAL_METRICS.get_or_init(ChaosMetricsInner::new)
    }

    pub fn inc_ticks(&self) {
        self.inner().ticks.inc();
    }

    pub fn inc_ticks_skipped(&self, count: u64) {
        self.inner().ticks_skipped.inc_by(count);
    }

    pub fn inc_pods_deleted(&self) {
        self.inner().pods_deleted.inc();
    }

    pub fn inc_pod_delete_errors(&self) {
        self.inner().pod_delete_errors.inc();
    }

    pub fn inc_pod_list_errors(&self) {
        self.inner().pod_list_errors.inc();
    }

    pub fn set_candidates(&self, count: usize) {
        self.inner().candidates.set(count as i64);
    }

    pub fn observe_jitter(&self, secs: f64) {
        self.inner().jitter_seconds.observe(secs);
    }

    pub fn observe_tick_duration(&self, secs: f64) {
        self.inner().tick_duration_seconds.observe(secs);
    }

    pub fn pods_deleted(&self) -> u64 {
        self.inner().pods_deleted.get()
    }

    pub fn pod_delete_errors(&self) -> u64 {
        self.inner().pod_delete_errors.get()
    }

    pub fn pod_list_errors(&self) -> u64 {
        self.inner().pod_list_errors.get()
    }
}

/// Structured logger for disruption events
///
/// Every line carries the target namespace and selector so a log search for
/// one workload shows its full disruption history.
#[derive(Debug, Clone)]
pub struct ChaosLogger {
    namespace: String,
    label_selector: String,
}

impl ChaosLogger {
    pub fn new(namespace: impl Into<String>, label_selector: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            label_selector: label_selector.into(),
        }
    }

    pub fn log_startup(
        &self,
        version: &str,
        schedule: &str,
        pod_count: u32,
        jitter_secs: u64,
        source: CredentialSource,
    ) {
        info!(
            event = "agent_started",
            namespace = %self.namespace,
            label_selector = %self.label_selector,
            agent_version = %version,
            schedule = %schedule,
            pod_count = pod_count,
            jitter_secs = jitter_secs,
            credentials = %source,
            "Starting pod deletion schedule"
        );
    }

    pub fn log_tick_started(&self, jitter_secs: u64) {
        info!(
            event = "tick_started",
            namespace = %self.namespace,
            label_selector = %self.label_selector,
            jitter_secs = jitter_secs,
            "Sleeping {} seconds before disruption",
            jitter_secs
        );
    }

    pub fn log_pod_list_failed(&self, error: &dyn std::error::Error) {
        error!(
            event = "pod_list_failed",
            namespace = %self.namespace,
            label_selector = %self.label_selector,
            error = %error,
            "Failed to list pods, skipping this tick"
        );
    }

    pub fn log_no_candidates(&self) {
        warn!(
            event = "no_candidates",
            namespace = %self.namespace,
            label_selector = %self.label_selector,
            "No pods found with the given label selector in the specified namespace"
        );
    }

    pub fn log_candidates_clamped(&self, available: usize, requested: u32) {
        warn!(
            event = "candidates_clamped",
            namespace = %self.namespace,
            label_selector = %self.label_selector,
            available = available,
            requested = requested,
            "Fewer matching pods than requested, deleting all of them"
        );
    }

    pub fn log_pod_deleted(&self, pod: &PodRef) {
        info!(
            event = "pod_deleted",
            namespace = %pod.namespace,
            label_selector = %self.label_selector,
            pod_name = %pod.name,
            "Deleted pod"
        );
    }

    pub fn log_pod_delete_failed(&self, pod: &PodRef, error: &dyn std::error::Error) {
        error!(
            event = "pod_delete_failed",
            namespace = %pod.namespace,
            label_selector = %self.label_selector,
            pod_name = %pod.name,
            error = %error,
            "Failed to delete pod"
        );
    }

    pub fn log_shutdown(&self, reason: &str, ticks: u64) {
        info!(
            event = "agent_shutdown",
            namespace = %self.namespace,
            label_selector = %self.label_selector,
            reason = %reason,
            ticks = ticks,
            "Pod chaos agent shutting down"
        );
    }
}
