use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wsinfra_common::{InfrastructureError, Result, ServerConfig};

/// Servers and attributes declared for one machine of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InternalMachineConfig {
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Docker-level settings of the container backing a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DockerContainerConfig {
    pub image: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub expose: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
}

/// Workspace environment as prepared for container creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DockerEnvironment {
    #[serde(default)]
    pub machines: BTreeMap<String, InternalMachineConfig>,
    #[serde(default)]
    pub containers: BTreeMap<String, DockerContainerConfig>,
}

impl DockerEnvironment {
    pub fn container_mut(&mut self, machine_name: &str) -> Result<&mut DockerContainerConfig> {
        self.containers
            .get_mut(machine_name)
            .ok_or_else(|| InfrastructureError::MissingContainer(machine_name.to_string()))
    }
}
