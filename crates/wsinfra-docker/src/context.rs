use crate::engine::ContainerEngine;
use crate::environment::DockerEnvironment;
use crate::machine::StopDetector;
use crate::machine_creator::MachineCreator;
use crate::provisioner::{
    ConfigurationProvisioner, MachineLabelsProvisioner, SinglePortLabelsProvisioner,
};
use std::sync::Arc;
use tracing::info;
use wsinfra_common::{InfraConfig, Result, RuntimeIdentity};

/// Process-wide docker infrastructure state. Built once at startup and shared by reference.
#[derive(Clone)]
pub struct InfraContext {
    pub config: Arc<InfraConfig>,
    pub engine: Arc<dyn ContainerEngine>,
    pub machine_creator: MachineCreator,
    provisioners: Arc<Vec<Box<dyn ConfigurationProvisioner>>>,
}

impl InfraContext {
    pub fn new(
        config: InfraConfig,
        engine: Arc<dyn ContainerEngine>,
        stop_detector: Arc<dyn StopDetector>,
    ) -> Self {
        info!(
            host_protocol = %config.host_protocol,
            internal_ip = ?config.internal_ip,
            network = ?config.network,
            "Initializing docker infrastructure context"
        );
        let machine_creator = MachineCreator::new(&config, engine.clone(), stop_detector);
        let provisioners: Vec<Box<dyn ConfigurationProvisioner>> = vec![
            Box::new(MachineLabelsProvisioner),
            Box::new(SinglePortLabelsProvisioner::new(&config)),
        ];

        Self {
            config: Arc::new(config),
            engine,
            machine_creator,
            provisioners: Arc::new(provisioners),
        }
    }

    /// Runs every provisioner, in order, over the environment.
    pub fn provision(&self, env: &mut DockerEnvironment, identity: &RuntimeIdentity) -> Result<()> {
        for provisioner in self.provisioners.iter() {
            provisioner.provision(env, identity)?;
        }
        Ok(())
    }
}
