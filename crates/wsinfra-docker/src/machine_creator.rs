use crate::engine::{ContainerEngine, ContainerListEntry, ContainerSnapshot};
use crate::labels::{Deserializer, LABEL_WORKSPACE_ID};
use crate::machine::{DockerMachine, StopDetector};
use crate::server_mapper::ServersMapper;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use wsinfra_common::{HostProtocol, InfraConfig, MachineStatus, Result};

/// Builds [`DockerMachine`]s from already started containers.
#[derive(Clone)]
pub struct MachineCreator {
    engine: Arc<dyn ContainerEngine>,
    registry: String,
    internal_ip: Option<String>,
    host_protocol: HostProtocol,
    stop_detector: Arc<dyn StopDetector>,
}

impl MachineCreator {
    pub fn new(
        config: &InfraConfig,
        engine: Arc<dyn ContainerEngine>,
        stop_detector: Arc<dyn StopDetector>,
    ) -> Self {
        Self {
            engine,
            registry: config.registry.clone(),
            internal_ip: config.internal_ip.clone(),
            host_protocol: config.host_protocol,
            stop_detector,
        }
    }

    /// Inspects the listed container and assembles a machine from the result.
    #[instrument(skip(self, entry), fields(container_id = %entry.id))]
    pub async fn create_from_entry(&self, entry: &ContainerListEntry) -> Result<DockerMachine> {
        let snapshot = self
            .engine
            .inspect_container(&entry.id)
            .await
            .inspect_err(|e| error!(error = %e, "Container inspect failed"))?;
        self.create(&snapshot)
    }

    /// Assembles a RUNNING machine from a full container description.
    pub fn create(&self, container: &ContainerSnapshot) -> Result<DockerMachine> {
        self.assemble(container).map(|(_, machine)| machine)
    }

    /// Machines of every running container labelled with `workspace_id`, by
    /// machine name. Stop detection is started for each of them.
    #[instrument(skip(self))]
    pub async fn create_workspace_machines(
        &self,
        workspace_id: &str,
    ) -> Result<BTreeMap<String, DockerMachine>> {
        let filter = [(LABEL_WORKSPACE_ID.to_string(), workspace_id.to_string())];
        let entries = self.engine.list_containers(&filter).await?;

        let mut machines = BTreeMap::new();
        for entry in &entries {
            let snapshot = self.engine.inspect_container(&entry.id).await?;
            let (name, machine) = self.assemble(&snapshot)?;
            self.stop_detector.start_detection(machine.container(), &name);
            machines.insert(name, machine);
        }
        info!(count = machines.len(), "Assembled workspace machines");
        Ok(machines)
    }

    fn assemble(&self, container: &ContainerSnapshot) -> Result<(String, DockerMachine)> {
        let settings = &container.network_settings;
        let deserializer = Deserializer::new(&container.labels);
        let machine_name = deserializer.machine_name()?;
        let servers = deserializer.servers()?;
        let attributes = deserializer.machine_attributes()?;

        let mapper =
            ServersMapper::for_container(self.host_protocol, self.internal_ip.as_deref(), settings)?;
        let resolved = mapper.map(&settings.ports, &servers)?;
        info!(
            container_id = %container.id,
            machine = %machine_name,
            host = %mapper.hostname(),
            servers = resolved.len(),
            "Machine assembled"
        );

        let machine = DockerMachine::new(
            container.id.clone(),
            container.image.clone(),
            self.engine.clone(),
            resolved,
            self.registry.clone(),
            self.stop_detector.clone(),
            MachineStatus::Running,
            attributes,
        );
        Ok((machine_name, machine))
    }
}
