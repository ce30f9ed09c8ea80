// Re-export dependencies used in public interfaces of common types

pub use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;
pub mod model;

pub use config::{HostProtocol, InfraConfig};
pub use model::{MachineStatus, RuntimeIdentity, ServerConfig, INTERNAL_SERVER_ATTRIBUTE};

/// Malformed or missing structured data in container labels.
#[derive(Error, Debug)]
pub enum DecodingError {
    #[error("Machine name label is missing")]
    MissingMachineName,

    #[error("Server '{server}' has no port label")]
    MissingPort { server: String },

    #[error("Server '{server}' has malformed port '{value}'")]
    MalformedPort { server: String, value: String },

    #[error("Label '{key}' does not hold a JSON string map: {source}")]
    MalformedAttributes {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A declared server could not be mapped onto the container's network.
#[derive(Error, Debug)]
pub enum AddressResolutionError {
    #[error("Server '{server}' port {port} has no host binding")]
    NoBinding { server: String, port: String },

    #[error("No internal address configured and container has no gateway")]
    NoHost,
}

#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("Container labels could not be decoded: {0}")]
    Decoding(#[from] DecodingError),

    #[error("Server addresses could not be resolved: {0}")]
    AddressResolution(#[from] AddressResolutionError),

    #[error("Container engine error: {message}")]
    Engine {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("No container configuration for machine '{0}'")]
    MissingContainer(String),
}

impl InfrastructureError {
    pub fn engine<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        InfrastructureError::Engine {
            message: source.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, InfrastructureError>;
