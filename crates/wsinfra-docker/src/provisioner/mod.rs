//! Steps that adjust a workspace environment before its containers are created.

use crate::environment::DockerEnvironment;
use std::collections::BTreeMap;
use wsinfra_common::{Result, RuntimeIdentity};

pub mod hostname;
pub mod machine_labels;
pub mod single_port;

pub use hostname::SinglePortHostnameBuilder;
pub use machine_labels::MachineLabelsProvisioner;
pub use single_port::{entry_points, service_name, ServiceRoute, SinglePortLabelsProvisioner};

pub trait ConfigurationProvisioner: Send + Sync {
    fn provision(&self, env: &mut DockerEnvironment, identity: &RuntimeIdentity) -> Result<()>;
}

/// Merge a finished label set into the container of `machine_name`.
pub(crate) fn merge_labels(
    env: &mut DockerEnvironment,
    machine_name: &str,
    labels: BTreeMap<String, String>,
) -> Result<()> {
    env.container_mut(machine_name)?.labels.extend(labels);
    Ok(())
}
