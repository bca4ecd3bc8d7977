//! The disruption job
//!
//! One invocation sleeps a random jitter, lists the pods matching the
//! configured selector and deletes a random sample of them. Every failure is
//! contained inside the tick so the scheduler keeps running.

use super::sampling::{draw_jitter, select_targets};
use crate::cluster::PodApi;
use crate::health::{components, HealthRegistry};
use crate::models::{PodRef, TickReport, TickStatus};
use crate::observability::{ChaosLogger, ChaosMetrics};
use crate::scheduler::ScheduledJob;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// What to disrupt and how often per tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisruptionConfig {
    /// Namespace holding the target pods (default: workloads)
    pub namespace: String,
    /// Label selector in `key=value` form (default: app=nginx)
    pub label_selector: String,
    /// Pods deleted per tick (default: 2)
    pub pod_count: u32,
    /// Upper bound of the random pre-deletion delay (default: 10 seconds)
    pub jitter: Duration,
}

impl Default for DisruptionConfig {
    fn default() -> Self {
        Self {
            namespace: "workloads".to_string(),
            label_selector: "app=nginx".to_string(),
            pod_count: 2,
            jitter: Duration::from_secs(10),
        }
    }
}

/// Randomly deletes pods matching a selector, once per tick
pub struct DisruptionJob {
    api: Arc<dyn PodApi>,
    config: DisruptionConfig,
    rng: StdRng,
    health: Option<HealthRegistry>,
    metrics: ChaosMetrics,
    logger: ChaosLogger,
}

impl DisruptionJob {
    pub fn new(api: Arc<dyn PodApi>, config: DisruptionConfig) -> Self {
        let logger = ChaosLogger::new(&config.namespace, &config.label_selector);
        Self {
            api,
            config,
            rng: StdRng::from_entropy(),
            health: None,
            metrics: ChaosMetrics::new(),
            logger,
        }
    }

    pub fn config(&self) -> &DisruptionConfig {
        &self.config
    }

    /// Run one disruption tick. Never fails: problems are logged and reported.
    pub async fn run_once(&mut self) -> TickReport {
        let started = Instant::now();

        let jitter = draw_jitter(&mut self.rng, self.config.jitter);
        self.logger.log_tick_started(jitter.as_secs());
        self.metrics.observe_jitter(jitter.as_secs_f64());
        sleep(jitter).await;

        let mut report = TickReport::new(jitter);
        self.disrupt(&mut report).await;

        self.metrics
            .observe_tick_duration(started.elapsed().as_secs_f64());
        debug!(
            status = ?report.status,
            candidates = report.candidates,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Disruption tick finished"
        );

        report
    }

    async fn disrupt(&mut self, report: &mut TickReport) {
        let listed = match self
            .api
            .list_pods(&self.config.namespace, &self.config.label_selector)
            .await
        {
            Ok(pods) => {
                self.set_cluster_health(None).await;
                pods
            }
            Err(e) => {
                self.logger.log_pod_list_failed(&e);
                self.metrics.inc_pod_list_errors();
                self.set_cluster_health(Some(e.to_string())).await;
                report.status = TickStatus::ListFailed;
                return;
            }
        };

        let candidates: Vec<PodRef> = listed.into_iter().filter(|p| !p.terminating).collect();
        report.candidates = candidates.len();
        self.metrics.set_candidates(candidates.len());

        if candidates.is_empty() {
            self.logger.log_no_candidates();
            report.status = TickStatus::NoCandidates;
            return;
        }

        let requested = self.config.pod_count as usize;
        if candidates.len() < requested {
            self.logger
                .log_candidates_clamped(candidates.len(), self.config.pod_count);
            report.clamped = true;
        }

        report.selected = select_targets(&mut self.rng, &candidates, requested);

        for pod in &report.selected {
            match self.api.delete_pod(pod).await {
                Ok(()) => {
                    self.logger.log_pod_deleted(pod);
                    self.metrics.inc_pods_deleted();
                    report.deleted.push(pod.clone());
                }
                Err(e) => {
                    self.logger.log_pod_delete_failed(pod, &e);
                    self.metrics.inc_pod_delete_errors();
                    report.failed.push(pod.clone());
                }
            }
        }

        if !report.failed.is_empty() {
            let message = format!(
                "{} of {} pod deletions failed",
                report.failed.len(),
                report.selected.len()
            );
            self.set_cluster_health(Some(message)).await;
        }
    }

    async fn set_cluster_health(&self, problem: Option<String>) {
        let Some(health) = &self.health else {
            return;
        };
        match problem {
            None => health.set_healthy(components::CLUSTER_API).await,
            Some(message) => health.set_degraded(components::CLUSTER_API, message).await,
        }
    }
}

#[async_trait]
impl ScheduledJob for DisruptionJob {
    async fn on_tick(&mut self, fired_at: DateTime<Utc>) {
        info!(fired_at = %fired_at, "Disruption tick triggered");
        self.run_once().await;
    }
}

/// Builder for [`DisruptionJob`]
pub struct DisruptionJobBuilder {
    api: Option<Arc<dyn PodApi>>,
    config: DisruptionConfig,
    seed: Option<u64>,
    health: Option<HealthRegistry>,
}

impl DisruptionJobBuilder {
    /// Create a new builder with the default configuration
    pub fn new() -> Self {
        Self {
            api: None,
            config: DisruptionConfig::default(),
            seed: None,
            health: None,
        }
    }

    /// Set the pod API used for listing and deleting
    pub fn pod_api(mut self, api: Arc<dyn PodApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DisruptionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    pub fn label_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.label_selector = selector.into();
        self
    }

    pub fn pod_count(mut self, count: u32) -> Self {
        self.config.pod_count = count;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    /// Seed the random generator for reproducible selections
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Report cluster API health to a registry
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Build the job
    pub fn build(self) -> Result<DisruptionJob> {
        let api = self
            .api
            .ok_or_else(|| anyhow::anyhow!("Pod API is required"))?;
        if self.config.pod_count == 0 {
            anyhow::bail!("Pod count must be at least 1");
        }
        if self.config.namespace.is_empty() {
            anyhow::bail!("Namespace must not be empty");
        }

        let mut job = DisruptionJob::new(api, self.config);
        if let Some(seed) = self.seed {
            job.rng = StdRng::seed_from_u64(seed);
        }
        job.health = self.health;
        Ok(job)
    }
}

impl Default for DisruptionJobBuilder {
    fn default() -> Self {
        Self::new()
    }
}
