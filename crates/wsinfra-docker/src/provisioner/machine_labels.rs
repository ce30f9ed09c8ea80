use super::{merge_labels, ConfigurationProvisioner};
use crate::environment::DockerEnvironment;
use crate::labels::Serializer;
use std::collections::BTreeMap;
use tracing::{debug, instrument};
use wsinfra_common::{Result, RuntimeIdentity};

/// Writes machine name, runtime identity, servers and machine attributes into
/// container labels, where the machine creator reads them back from.
#[derive(Debug, Clone, Copy, Default)]
pub struct MachineLabelsProvisioner;

impl ConfigurationProvisioner for MachineLabelsProvisioner {
    #[instrument(skip(self, env), fields(workspace_id = %identity.workspace_id))]
    fn provision(&self, env: &mut DockerEnvironment, identity: &RuntimeIdentity) -> Result<()> {
        let label_sets: Vec<(String, BTreeMap<String, String>)> = env
            .machines
            .iter()
            .map(|(name, machine)| {
                let labels = Serializer::new()
                    .machine_name(name)
                    .runtime_id(identity)
                    .servers(&machine.servers)
                    .machine_attributes(&machine.attributes)
                    .labels();
                (name.clone(), labels)
            })
            .collect();

        for (machine_name, labels) in label_sets {
            debug!(machine = %machine_name, labels = labels.len(), "Applying machine labels");
            merge_labels(env, &machine_name, labels)?;
        }
        Ok(())
    }
}
