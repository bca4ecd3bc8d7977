//! Cluster session bootstrap
//!
//! Resolves credentials once at startup: the pod's service account when
//! running inside the cluster, otherwise the local kubeconfig.

use super::KubePodApi;
use kube::config::{InClusterError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while establishing the cluster session
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("no usable cluster credentials (in-cluster: {in_cluster}; kubeconfig: {kubeconfig})")]
    NoCredentials {
        in_cluster: InClusterError,
        kubeconfig: KubeconfigError,
    },

    #[error("failed to load kubeconfig from {}: {source}", .path.display())]
    KubeconfigFile {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    #[error("failed to build Kubernetes client: {0}")]
    Client(#[from] kube::Error),
}

/// Where the session credentials came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Service account mounted into the pod
    InCluster,
    /// Local kubeconfig file
    Kubeconfig,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::InCluster => f.write_str("in-cluster"),
            CredentialSource::Kubeconfig => f.write_str("kubeconfig"),
        }
    }
}

/// Authenticated access to the cluster API, established once per process
#[derive(Clone)]
pub struct ClusterSession {
    client: kube::Client,
    source: CredentialSource,
}

impl ClusterSession {
    /// Connect using in-cluster credentials, falling back to the default kubeconfig
    pub async fn bootstrap() -> Result<Self, BootstrapError> {
        let (config, source) = infer_config().await?;
        Self::from_config(config, source)
    }

    /// Connect using an explicit kubeconfig file
    pub async fn from_kubeconfig_path(path: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let config = kubeconfig_file_config(path.as_ref()).await?;
        Self::from_config(config, CredentialSource::Kubeconfig)
    }

    /// Build the client from an already resolved configuration
    pub fn from_config(
        config: kube::Config,
        source: CredentialSource,
    ) -> Result<Self, BootstrapError> {
        debug!(cluster_url = %config.cluster_url, source = %source, "Creating Kubernetes client");
        let client = kube::Client::try_from(config)?;
        Ok(Self { client, source })
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn client(&self) -> kube::Client {
        self.client.clone()
    }

    /// Pod API handle sharing this session's client
    pub fn pod_api(&self) -> KubePodApi {
        KubePodApi::new(self.client.clone())
    }
}

/// Resolve the client configuration, preferring in-cluster credentials
pub async fn infer_config() -> Result<(kube::Config, CredentialSource), BootstrapError> {
    let in_cluster = match kube::Config::incluster() {
        Ok(config) => {
            info!("Loaded in-cluster Kubernetes configuration");
            return Ok((config, CredentialSource::InCluster));
        }
        Err(e) => e,
    };
    debug!(error = %in_cluster, "In-cluster configuration unavailable, trying kubeconfig");

    match kube::Config::from_kubeconfig(&KubeConfigOptions::default()).await {
        Ok(config) => {
            info!("Loaded Kubernetes configuration from kubeconfig");
            Ok((config, CredentialSource::Kubeconfig))
        }
        Err(kubeconfig) => Err(BootstrapError::NoCredentials {
            in_cluster,
            kubeconfig,
        }),
    }
}

/// Load the client configuration from a specific kubeconfig file
pub async fn kubeconfig_file_config(path: &Path) -> Result<kube::Config, BootstrapError> {
    let file_error = |source| BootstrapError::KubeconfigFile {
        path: path.to_path_buf(),
        source,
    };

    let kubeconfig = Kubeconfig::read_from(path).map_err(file_error)?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(file_error)?;

    info!(path = %path.display(), "Loaded Kubernetes configuration from kubeconfig");
    Ok(config)
}
