//! Container engine seam: the few daemon calls the runtime needs, plus the
//! plain snapshot types they return.

use crate::bollard::container::{
    InspectContainerOptions, ListContainersOptions, RemoveContainerOptions,
};
use crate::bollard::errors::Error as BollardError;
use crate::bollard::models::ContainerInspectResponse;
use crate::bollard::Docker;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};
use wsinfra_common::InfrastructureError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Docker API error: {0}")]
    DockerApi(#[from] BollardError),
    #[error("Container {0} not found")]
    NotFound(String),
    #[error("Inspect response for container {id} has no {field}")]
    Incomplete { id: String, field: &'static str },
}

impl From<EngineError> for InfrastructureError {
    fn from(err: EngineError) -> Self {
        InfrastructureError::engine(err)
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// One host-side binding of a container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub host_ip: Option<String>,
    pub host_port: String,
}

impl PortBinding {
    pub fn new(host_ip: Option<&str>, host_port: impl Into<String>) -> Self {
        Self {
            host_ip: host_ip.map(str::to_string),
            host_port: host_port.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NetworkSettings {
    /// Container port (`8080/tcp`) to its host bindings, in binding order.
    pub ports: BTreeMap<String, Vec<PortBinding>>,
    pub gateway: Option<String>,
}

/// Immutable view of an inspected container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    pub id: String,
    pub image: String,
    pub network_settings: NetworkSettings,
    pub labels: HashMap<String, String>,
}

/// Short container description as returned by a list call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerListEntry {
    pub id: String,
    pub labels: HashMap<String, String>,
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn inspect_container(&self, container_id: &str) -> EngineResult<ContainerSnapshot>;

    /// Running containers carrying every given `key=value` label.
    async fn list_containers(
        &self,
        labels: &[(String, String)],
    ) -> EngineResult<Vec<ContainerListEntry>>;

    async fn remove_container(&self, container_id: &str) -> EngineResult<()>;
}

/// [`ContainerEngine`] backed by the local Docker daemon.
#[derive(Clone)]
pub struct DockerEngine {
    docker_client: Arc<Docker>,
}

impl DockerEngine {
    pub fn new(docker_client: Arc<Docker>) -> Self {
        Self { docker_client }
    }

    pub fn connect_with_local_defaults() -> EngineResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::new(Arc::new(docker)))
    }
}

fn map_not_found(container_id: &str, err: BollardError) -> EngineError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => EngineError::NotFound(container_id.to_string()),
        other => EngineError::DockerApi(other),
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    #[instrument(skip(self))]
    async fn inspect_container(&self, container_id: &str) -> EngineResult<ContainerSnapshot> {
        debug!(%container_id, "Inspecting container");
        let response = self
            .docker_client
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_not_found(container_id, e))?;
        snapshot_from_inspect(container_id, response)
    }

    #[instrument(skip(self))]
    async fn list_containers(
        &self,
        labels: &[(String, String)],
    ) -> EngineResult<Vec<ContainerListEntry>> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            labels
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>(),
        );
        let options = ListContainersOptions::<String> {
            all: false,
            filters,
            ..Default::default()
        };

        let summaries = self.docker_client.list_containers(Some(options)).await?;
        let entries: Vec<ContainerListEntry> = summaries
            .into_iter()
            .filter_map(|summary| {
                summary.id.map(|id| ContainerListEntry {
                    id,
                    labels: summary.labels.unwrap_or_default(),
                })
            })
            .collect();
        debug!(count = entries.len(), "Listed containers");
        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, container_id: &str) -> EngineResult<()> {
        info!(%container_id, "Removing container...");
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        self.docker_client
            .remove_container(container_id, Some(options))
            .await
            .map_err(|e| map_not_found(container_id, e))
    }
}

/// Reduce a full inspect response to the fields the runtime consumes.
pub(crate) fn snapshot_from_inspect(
    container_id: &str,
    response: ContainerInspectResponse,
) -> EngineResult<ContainerSnapshot> {
    let id = response.id.unwrap_or_else(|| container_id.to_string());
    let config = response.config.ok_or_else(|| EngineError::Incomplete {
        id: id.clone(),
        field: "config",
    })?;
    let image = config.image.ok_or_else(|| EngineError::Incomplete {
        id: id.clone(),
        field: "image",
    })?;

    let network_settings = response
        .network_settings
        .map(|settings| {
            let ports = settings
                .ports
                .unwrap_or_default()
                .into_iter()
                .map(|(port, bindings)| {
                    let bindings = bindings
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|b| {
                            b.host_port.map(|host_port| PortBinding {
                                host_ip: b.host_ip.filter(|ip| !ip.is_empty()),
                                host_port,
                            })
                        })
                        .collect();
                    (port, bindings)
                })
                .collect();

            // Containers on user-defined networks only report a gateway per network.
            let gateway = settings.gateway.filter(|g| !g.is_empty()).or_else(|| {
                settings
                    .networks
                    .unwrap_or_default()
                    .into_values()
                    .filter_map(|endpoint| endpoint.gateway)
                    .find(|g| !g.is_empty())
            });

            NetworkSettings { ports, gateway }
        })
        .unwrap_or_default();

    Ok(ContainerSnapshot {
        id,
        image,
        network_settings,
        labels: config.labels.unwrap_or_default(),
    })
}
