use crate::engine::{NetworkSettings, PortBinding};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use wsinfra_common::{AddressResolutionError, HostProtocol, ServerConfig};

/// A declared server together with the URL it is reachable at from outside
/// the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedServer {
    url: String,
    #[serde(flatten)]
    server: ServerConfig,
}

impl ResolvedServer {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The declaration this server was resolved from.
    pub fn config(&self) -> &ServerConfig {
        &self.server
    }

    pub fn port(&self) -> &str {
        &self.server.port
    }

    pub fn protocol(&self) -> Option<&str> {
        self.server.protocol.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.server.path.as_deref()
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.server.attributes
    }
}

/// Maps declared servers onto a container's host port bindings.
#[derive(Debug, Clone)]
pub struct ServersMapper {
    host_protocol: HostProtocol,
    hostname: String,
}

impl ServersMapper {
    pub fn new(host_protocol: HostProtocol, hostname: impl Into<String>) -> Self {
        Self {
            host_protocol,
            hostname: hostname.into(),
        }
    }

    /// Uses `internal_ip` when configured, otherwise the container's gateway.
    pub fn for_container(
        host_protocol: HostProtocol,
        internal_ip: Option<&str>,
        settings: &NetworkSettings,
    ) -> Result<Self, AddressResolutionError> {
        let hostname = internal_ip
            .or(settings.gateway.as_deref())
            .filter(|host| !host.is_empty())
            .ok_or(AddressResolutionError::NoHost)?;
        Ok(Self::new(host_protocol, hostname))
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn map(
        &self,
        ports: &BTreeMap<String, Vec<PortBinding>>,
        servers: &BTreeMap<String, ServerConfig>,
    ) -> Result<BTreeMap<String, ResolvedServer>, AddressResolutionError> {
        servers
            .iter()
            .map(|(name, server)| {
                let binding_key = server.binding_key();
                let host_port = ports
                    .get(&binding_key)
                    .and_then(|bindings| bindings.first())
                    .map(|binding| binding.host_port.as_str())
                    .filter(|port| !port.is_empty())
                    .ok_or_else(|| AddressResolutionError::NoBinding {
                        server: name.clone(),
                        port: binding_key.clone(),
                    })?;

                let url = self.url(server, host_port);
                debug!(server = %name, %url, "Resolved server address");
                let resolved = ResolvedServer {
                    url,
                    server: server.clone(),
                };
                Ok::<_, AddressResolutionError>((name.clone(), resolved))
            })
            .collect()
    }

    fn url(&self, server: &ServerConfig, host_port: &str) -> String {
        let scheme = self.scheme(server.protocol.as_deref());
        let path = match server.path.as_deref() {
            None | Some("") => String::new(),
            Some(path) if path.starts_with('/') => path.to_string(),
            Some(path) => format!("/{path}"),
        };
        format!("{scheme}://{}:{host_port}{path}", self.hostname)
    }

    fn scheme(&self, protocol: Option<&str>) -> String {
        match (self.host_protocol, protocol) {
            (_, None) => "tcp".to_string(),
            (HostProtocol::Https, Some("http")) => "https".to_string(),
            (HostProtocol::Https, Some("ws")) => "wss".to_string(),
            (_, Some(other)) => other.to_string(),
        }
    }
}
