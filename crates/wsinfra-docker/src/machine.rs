use crate::engine::ContainerEngine;
use crate::server_mapper::ResolvedServer;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};
use wsinfra_common::{MachineStatus, Result};

/// Handle onto the process that watches containers for unexpected stops.
pub trait StopDetector: Send + Sync {
    fn start_detection(&self, container_id: &str, machine_name: &str);
    fn stop_detection(&self, container_id: &str);
}

/// A running container of a workspace, with its externally reachable servers.
#[derive(Clone)]
pub struct DockerMachine {
    container: String,
    image: String,
    engine: Arc<dyn ContainerEngine>,
    servers: BTreeMap<String, ResolvedServer>,
    registry: String,
    stop_detector: Arc<dyn StopDetector>,
    status: MachineStatus,
    attributes: BTreeMap<String, String>,
}

impl DockerMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        container: String,
        image: String,
        engine: Arc<dyn ContainerEngine>,
        servers: BTreeMap<String, ResolvedServer>,
        registry: String,
        stop_detector: Arc<dyn StopDetector>,
        status: MachineStatus,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            container,
            image,
            engine,
            servers,
            registry,
            stop_detector,
            status,
            attributes,
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn servers(&self) -> &BTreeMap<String, ResolvedServer> {
        &self.servers
    }

    pub fn server_url(&self, name: &str) -> Option<&str> {
        self.servers.get(name).map(ResolvedServer::url)
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    pub fn set_status(&mut self, status: MachineStatus) {
        self.status = status;
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Stops watching the container and force-removes it with its volumes.
    #[instrument(skip(self), fields(container = %self.container))]
    pub async fn destroy(&mut self) -> Result<()> {
        self.stop_detector.stop_detection(&self.container);
        self.engine.remove_container(&self.container).await?;
        self.status = MachineStatus::Stopped;
        info!("Machine destroyed");
        Ok(())
    }
}

impl fmt::Debug for DockerMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerMachine")
            .field("container", &self.container)
            .field("image", &self.image)
            .field("servers", &self.servers)
            .field("registry", &self.registry)
            .field("status", &self.status)
            .field("attributes", &self.attributes)
            .finish()
    }
}
