//! Tests for the disruption job
//!
//! These use a recording mock in place of the cluster API so list and
//! delete failures can be injected per call.

#[cfg(test)]
mod mock_cluster_tests {
    use crate::cluster::{ClusterError, PodApi};
    use crate::disruption::{DisruptionConfig, DisruptionJob, DisruptionJobBuilder};
    use crate::health::{components, ComponentStatus, HealthRegistry};
    use crate::models::{PodRef, TickStatus};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing_test::traced_test;

    /// Count captured log lines carrying `event` at `level`
    fn count_events(lines: &[&str], level: &str, event: &str) -> usize {
        let field = format!("event=\"{event}\"");
        lines
            .iter()
            .filter(|line| line.contains(level) && line.contains(&field))
            .count()
    }

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("simulated {reason}"),
            reason: reason.to_string(),
            code,
        })
    }

    /// Mock pod API recording every call
    #[derive(Default)]
    struct MockPodApi {
        pods: Vec<PodRef>,
        fail_list: bool,
        fail_delete: HashSet<String>,
        fail_first_delete: bool,
        list_calls: AtomicUsize,
        delete_calls: Mutex<Vec<PodRef>>,
    }

    impl MockPodApi {
        fn with_pods(n: usize) -> Self {
            Self {
                pods: (0..n)
                    .map(|i| PodRef::new("workloads", format!("nginx-{i}")))
                    .collect(),
                ..Default::default()
            }
        }

        fn deleted(&self) -> Vec<PodRef> {
            self.delete_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PodApi for MockPodApi {
        async fn list_pods(
            &self,
            namespace: &str,
            label_selector: &str,
        ) -> Result<Vec<PodRef>, ClusterError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_list {
                return Err(ClusterError::List {
                    namespace: namespace.to_string(),
                    label_selector: label_selector.to_string(),
                    source: api_error(500, "InternalError"),
                });
            }
            Ok(self.pods.clone())
        }

        async fn delete_pod(&self, pod: &PodRef) -> Result<(), ClusterError> {
            let first = {
                let mut calls = self.delete_calls.lock().unwrap();
                calls.push(pod.clone());
                calls.len() == 1
            };
            if self.fail_delete.contains(&pod.name) || (self.fail_first_delete && first) {
                return Err(ClusterError::Delete {
                    pod: pod.clone(),
                    source: api_error(403, "Forbidden"),
                });
            }
            Ok(())
        }
    }

    fn job(api: Arc<MockPodApi>, pod_count: u32, jitter_secs: u64) -> DisruptionJob {
        DisruptionJobBuilder::new()
            .pod_api(api)
            .pod_count(pod_count)
            .jitter(Duration::from_secs(jitter_secs))
            .seed(11)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_deletes_requested_count_without_jitter() {
        let api = Arc::new(MockPodApi::with_pods(5));
        let mut job = job(api.clone(), 2, 0);

        let report = job.run_once().await;

        assert_eq!(report.status, TickStatus::Completed);
        assert_eq!(report.jitter, Duration::ZERO);
        assert_eq!(report.candidates, 5);
        assert!(!report.clamped);

        let deleted = api.deleted();
        assert_eq!(deleted.len(), 2);
        assert_ne!(deleted[0], deleted[1]);
        assert!(deleted.iter().all(|p| api.pods.contains(p)));
        assert_eq!(report.deleted, deleted);
    }

    #[tokio::test]
    async fn test_exact_candidate_count_deletes_all() {
        let api = Arc::new(MockPodApi::with_pods(3));
        let mut job = job(api.clone(), 3, 0);

        let report = job.run_once().await;

        let deleted: HashSet<PodRef> = api.deleted().into_iter().collect();
        assert_eq!(deleted.len(), 3);
        assert_eq!(deleted, api.pods.iter().cloned().collect());
        assert!(!report.clamped);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_empty_candidates_is_noop() {
        let api = Arc::new(MockPodApi::with_pods(0));
        let mut job = job(api.clone(), 2, 0);

        let report = job.run_once().await;

        assert_eq!(report.status, TickStatus::NoCandidates);
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
        assert!(api.deleted().is_empty());
        assert_eq!(report.delete_attempts(), 0);
        logs_assert(|lines: &[&str]| {
            match count_events(lines, "WARN", "no_candidates") {
                1 => Ok(()),
                n => Err(format!("expected one no_candidates warning, got {n}")),
            }
        });
        assert!(!logs_contain("event=\"pod_deleted\""));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_list_failure_skips_tick() {
        let api = Arc::new(MockPodApi {
            fail_list: true,
            ..MockPodApi::with_pods(5)
        });
        let health = HealthRegistry::new();
        let mut job = DisruptionJobBuilder::new()
            .pod_api(api.clone())
            .jitter(Duration::ZERO)
            .health(health.clone())
            .build()
            .unwrap();

        let report = job.run_once().await;

        assert_eq!(report.status, TickStatus::ListFailed);
        assert!(api.deleted().is_empty());
        assert_eq!(
            health.health().await.components[components::CLUSTER_API].status,
            ComponentStatus::Degraded
        );
        logs_assert(|lines: &[&str]| {
            match count_events(lines, "ERROR", "pod_list_failed") {
                1 => Ok(()),
                n => Err(format!("expected one pod_list_failed error, got {n}")),
            }
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn test_first_delete_failure_does_not_abort_batch() {
        let api = Arc::new(MockPodApi {
            fail_first_delete: true,
            ..MockPodApi::with_pods(2)
        });
        let mut job = job(api.clone(), 2, 0);

        let report = job.run_once().await;

        let attempted = api.deleted();
        assert_eq!(attempted, report.selected);
        assert_eq!(report.failed, vec![report.selected[0].clone()]);
        assert_eq!(report.deleted, vec![report.selected[1].clone()]);
        assert_eq!(report.status, TickStatus::Completed);
        logs_assert(|lines: &[&str]| {
            let failed = count_events(lines, "ERROR", "pod_delete_failed");
            let deleted = count_events(lines, "INFO", "pod_deleted");
            if failed == 1 && deleted == 1 {
                Ok(())
            } else {
                Err(format!("expected 1 failure and 1 deletion, got {failed} and {deleted}"))
            }
        });
    }

    #[tokio::test]
    async fn test_named_pod_delete_failure_is_isolated() {
        let api = Arc::new(MockPodApi {
            fail_delete: ["nginx-0".to_string()].into_iter().collect(),
            ..MockPodApi::with_pods(2)
        });
        let mut job = job(api.clone(), 2, 0);

        let report = job.run_once().await;

        assert_eq!(api.deleted().len(), 2);
        assert_eq!(report.failed, vec![PodRef::new("workloads", "nginx-0")]);
        assert_eq!(report.deleted, vec![PodRef::new("workloads", "nginx-1")]);
    }

    #[tokio::test]
    async fn test_every_delete_failing_still_attempts_all() {
        let api = Arc::new(MockPodApi {
            fail_delete: (0..4).map(|i| format!("nginx-{i}")).collect(),
            ..MockPodApi::with_pods(4)
        });
        let mut job = job(api.clone(), 3, 0);

        let report = job.run_once().await;

        assert_eq!(api.deleted().len(), 3);
        assert_eq!(report.failed.len(), 3);
        assert!(report.deleted.is_empty());
    }

    #[tokio::test]
    async fn test_fewer_candidates_than_requested_clamps() {
        let api = Arc::new(MockPodApi::with_pods(2));
        let mut job = job(api.clone(), 4, 0);

        let report = job.run_once().await;

        assert!(report.clamped);
        assert_eq!(report.status, TickStatus::Completed);
        let deleted: HashSet<PodRef> = api.deleted().into_iter().collect();
        assert_eq!(deleted, api.pods.iter().cloned().collect());
    }

    #[tokio::test]
    async fn test_terminating_pods_are_not_candidates() {
        let mut api = MockPodApi::with_pods(3);
        api.pods[0].terminating = true;
        api.pods[2].terminating = true;
        let api = Arc::new(api);
        let mut job = job(api.clone(), 2, 0);

        let report = job.run_once().await;

        assert_eq!(report.candidates, 1);
        assert!(report.clamped);
        assert_eq!(api.deleted(), vec![PodRef::new("workloads", "nginx-1")]);
    }

    #[tokio::test]
    async fn test_only_terminating_pods_is_noop() {
        let mut api = MockPodApi::with_pods(2);
        for pod in &mut api.pods {
            pod.terminating = true;
        }
        let api = Arc::new(api);
        let mut job = job(api.clone(), 1, 0);

        let report = job.run_once().await;

        assert_eq!(report.status, TickStatus::NoCandidates);
        assert!(api.deleted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_delays_listing() {
        let api = Arc::new(MockPodApi::with_pods(5));
        let mut job = job(api.clone(), 1, 10);
        let started = tokio::time::Instant::now();

        let report = job.run_once().await;

        let elapsed = started.elapsed();
        assert!(report.jitter <= Duration::from_secs(10));
        assert!(elapsed >= report.jitter);
        assert!(elapsed < report.jitter + Duration::from_millis(5));
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeated_ticks_respect_count_and_uniqueness() {
        let api = Arc::new(MockPodApi::with_pods(6));
        let mut job = job(api.clone(), 3, 0);

        for _ in 0..50 {
            let report = job.run_once().await;
            assert_eq!(report.selected.len(), 3);
            let unique: HashSet<&PodRef> = report.selected.iter().collect();
            assert_eq!(unique.len(), 3);
        }
        assert_eq!(api.deleted().len(), 150);
    }

    #[tokio::test]
    async fn test_same_seed_same_selection() {
        let first = Arc::new(MockPodApi::with_pods(10));
        let second = Arc::new(MockPodApi::with_pods(10));

        job(first.clone(), 3, 0).run_once().await;
        job(second.clone(), 3, 0).run_once().await;

        assert_eq!(first.deleted(), second.deleted());
    }

    #[tokio::test]
    async fn test_health_recovers_after_successful_list() {
        let health = HealthRegistry::new();
        let failing = Arc::new(MockPodApi {
            fail_list: true,
            ..Default::default()
        });
        let healthy = Arc::new(MockPodApi::with_pods(1));

        let build = |api: Arc<MockPodApi>| {
            DisruptionJobBuilder::new()
                .pod_api(api)
                .pod_count(1)
                .jitter(Duration::ZERO)
                .health(health.clone())
                .build()
                .unwrap()
        };

        build(failing).run_once().await;
        assert_eq!(health.health().await.status, ComponentStatus::Degraded);

        build(healthy).run_once().await;
        assert_eq!(health.health().await.status, ComponentStatus::Healthy);
    }

    #[test]
    fn test_builder_requires_pod_api() {
        assert!(DisruptionJobBuilder::new().build().is_err());
    }

    #[test]
    fn test_builder_rejects_zero_pod_count() {
        let result = DisruptionJobBuilder::new()
            .pod_api(Arc::new(MockPodApi::default()))
            .pod_count(0)
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_builder_applies_config() {
        let config = DisruptionConfig {
            namespace: "payments".to_string(),
            label_selector: "app=api".to_string(),
            pod_count: 1,
            jitter: Duration::from_secs(30),
        };

        let job = DisruptionJobBuilder::new()
            .pod_api(Arc::new(MockPodApi::default()))
            .config(config.clone())
            .build()
            .unwrap();

        assert_eq!(job.config(), &config);
    }

    #[test]
    fn test_default_config() {
        let config = DisruptionConfig::default();
        assert_eq!(config.namespace, "workloads");
        assert_eq!(config.label_selector, "app=nginx");
        assert_eq!(config.pod_count, 2);
        assert_eq!(config.jitter, Duration::from_secs(10));
    }
}
