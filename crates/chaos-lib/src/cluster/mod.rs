//! Access to the Kubernetes control plane
//!
//! The disruption job only needs two cluster operations: listing pods by
//! namespace and label selector, and deleting a single pod. They are exposed
//! through the [`PodApi`] trait so the job can be exercised against a mock,
//! with [`KubePodApi`] as the production implementation.

mod session;

pub use session::{BootstrapError, ClusterSession, CredentialSource};

use crate::models::PodRef;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, ResourceExt};
use thiserror::Error;
use tracing::debug;

/// Errors returned by cluster API calls
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("failed to list pods in namespace {namespace} matching {label_selector}: {source}")]
    List {
        namespace: String,
        label_selector: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to delete pod {pod}: {source}")]
    Delete {
        pod: PodRef,
        #[source]
        source: kube::Error,
    },
}

/// Pod operations needed by the disruption job
#[async_trait]
pub trait PodApi: Send + Sync {
    /// List pods in `namespace` matching `label_selector`
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodRef>, ClusterError>;

    /// Delete a single pod
    async fn delete_pod(&self, pod: &PodRef) -> Result<(), ClusterError>;
}

/// [`PodApi`] backed by a `kube` client
#[derive(Clone)]
pub struct KubePodApi {
    client: kube::Client,
}

impl KubePodApi {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodApi for KubePodApi {
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodRef>, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(label_selector);

        let pods = api.list(&params).await.map_err(|source| ClusterError::List {
            namespace: namespace.to_string(),
            label_selector: label_selector.to_string(),
            source,
        })?;

        debug!(
            namespace = %namespace,
            label_selector = %label_selector,
            count = pods.items.len(),
            "Listed pods"
        );

        Ok(pods
            .items
            .iter()
            .map(|pod| pod_ref(pod, namespace))
            .collect())
    }

    async fn delete_pod(&self, pod: &PodRef) -> Result<(), ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &pod.namespace);

        api.delete(&pod.name, &DeleteParams::default())
            .await
            .map_err(|source| ClusterError::Delete {
                pod: pod.clone(),
                source,
            })?;

        Ok(())
    }
}

/// Convert an API object into the identity the job works with
fn pod_ref(pod: &Pod, fallback_namespace: &str) -> PodRef {
    PodRef {
        name: pod.name_any(),
        namespace: pod
            .namespace()
            .unwrap_or_else(|| fallback_namespace.to_string()),
        terminating: pod.metadata.deletion_timestamp.is_some(),
    }
}
