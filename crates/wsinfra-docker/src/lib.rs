// Re-export dependencies potentially needed by consumers (like the binary)
pub use bollard;
pub use wsinfra_common as common;

pub mod context;
pub mod engine;
pub mod environment;
pub mod labels;
pub mod machine;
pub mod machine_creator;
pub mod provisioner;
pub mod server_mapper;

pub use context::InfraContext;
pub use engine::{
    ContainerEngine, ContainerListEntry, ContainerSnapshot, DockerEngine, EngineError,
    NetworkSettings, PortBinding,
};
pub use environment::{DockerContainerConfig, DockerEnvironment, InternalMachineConfig};
pub use machine::{DockerMachine, StopDetector};
pub use machine_creator::MachineCreator;
pub use server_mapper::{ResolvedServer, ServersMapper};
