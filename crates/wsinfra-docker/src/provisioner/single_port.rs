//! Container labels for the single-port ingress proxy (Traefik).
//!
//! Every non-internal server gets its own frontend keyed by a service name
//! derived from its hostname, so all workspaces can share one proxy port and
//! be told apart by `Host:` rules alone.

use super::{merge_labels, ConfigurationProvisioner, SinglePortHostnameBuilder};
use crate::environment::{DockerEnvironment, InternalMachineConfig};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};
use wsinfra_common::{HostProtocol, InfraConfig, Result, RuntimeIdentity, ServerConfig};

pub const PROXY_LABEL_PREFIX: &str = "traefik";
/// Activates per-service frontend rules on a container.
pub const FRONTEND_RULE_LABEL: &str = "traefik.frontend.rule";
/// Network the proxy uses to reach the container.
pub const DOCKER_NETWORK_LABEL: &str = "traefik.docker.network";

/// Ingress routing for one server. Recomputed on every provisioning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRoute {
    pub service_name: String,
    /// Comma-joined entry point tags.
    pub entry_points: String,
    pub port: String,
    pub hostname: String,
}

impl ServiceRoute {
    pub fn entry_point_tags(&self) -> impl Iterator<Item = &str> {
        self.entry_points.split(',')
    }

    pub fn host_rule(&self) -> String {
        format!("Host:{}", self.hostname)
    }

    pub fn labels(&self) -> [(String, String); 3] {
        let service = &self.service_name;
        [
            (
                format!("{PROXY_LABEL_PREFIX}.{service}.frontend.entryPoints"),
                self.entry_points.clone(),
            ),
            (
                format!("{PROXY_LABEL_PREFIX}.{service}.port"),
                self.port.clone(),
            ),
            (
                format!("{PROXY_LABEL_PREFIX}.{service}.frontend.rule"),
                self.host_rule(),
            ),
        ]
    }
}

/// Service name of a hostname: everything before the character that precedes
/// the first dot, when that dot sits at index > 1; the whole hostname otherwise.
///
/// `exec-agent.dev-machine.workspaceabc123` becomes `exec-agen`.
pub fn service_name(hostname: &str) -> &str {
    match hostname.find('.') {
        Some(idx) if idx > 1 => {
            // step back one whole character, not one byte
            let end = hostname[..idx]
                .char_indices()
                .last()
                .map_or(0, |(last, _)| last);
            &hostname[..end]
        }
        _ => hostname,
    }
}

/// Proxy entry points for a server protocol under the global host protocol.
/// Protocols other than `http`/`ws` pass through unchanged.
pub fn entry_points(host_protocol: HostProtocol, protocol: &str) -> String {
    match (host_protocol, protocol) {
        (HostProtocol::Https, "http" | "ws") => "https,wss".to_string(),
        (HostProtocol::Http, "http" | "ws") => "http,ws".to_string(),
        (_, other) => other.to_string(),
    }
}

/// Sets the container labels the single-port proxy routes by.
#[derive(Debug, Clone)]
pub struct SinglePortLabelsProvisioner {
    hostname_builder: SinglePortHostnameBuilder,
    host_protocol: HostProtocol,
    network: Option<String>,
}

impl SinglePortLabelsProvisioner {
    pub fn new(config: &InfraConfig) -> Self {
        Self {
            hostname_builder: SinglePortHostnameBuilder::new(config),
            host_protocol: config.host_protocol,
            network: config.network.clone(),
        }
    }

    /// Route for one server, or `None` for internal servers.
    pub fn route(
        &self,
        server_name: &str,
        server: &ServerConfig,
        machine_name: &str,
        workspace_id: &str,
    ) -> Option<ServiceRoute> {
        if server.is_internal() {
            return None;
        }
        let hostname = self
            .hostname_builder
            .build(server_name, machine_name, workspace_id);
        Some(ServiceRoute {
            service_name: service_name(&hostname).to_string(),
            entry_points: entry_points(
                self.host_protocol,
                server.protocol.as_deref().unwrap_or_default(),
            ),
            port: server.port_number().to_string(),
            hostname,
        })
    }

    /// All proxy labels for one machine's container.
    pub fn machine_labels(
        &self,
        machine_name: &str,
        machine: &InternalMachineConfig,
        workspace_id: &str,
    ) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        for (server_name, server) in &machine.servers {
            let Some(route) = self.route(server_name, server, machine_name, workspace_id) else {
                debug!(server = %server_name, machine = %machine_name, "Skipping internal server");
                continue;
            };
            debug!(
                server = %server_name,
                service = %route.service_name,
                hostname = %route.hostname,
                entry_points = %route.entry_points,
                "Routing server"
            );
            labels.extend(route.labels());
            labels.insert(FRONTEND_RULE_LABEL.to_string(), machine_name.to_string());
        }
        // keeps proxy traffic on the shared network in multi-user setups
        if let Some(network) = &self.network {
            labels.insert(DOCKER_NETWORK_LABEL.to_string(), network.clone());
        }
        labels
    }
}

impl ConfigurationProvisioner for SinglePortLabelsProvisioner {
    #[instrument(skip(self, env), fields(workspace_id = %identity.workspace_id))]
    fn provision(&self, env: &mut DockerEnvironment, identity: &RuntimeIdentity) -> Result<()> {
        let label_sets: Vec<(String, BTreeMap<String, String>)> = env
            .machines
            .iter()
            .map(|(name, machine)| {
                let labels = self.machine_labels(name, machine, &identity.workspace_id);
                (name.clone(), labels)
            })
            .collect();

        for (machine_name, labels) in label_sets {
            info!(machine = %machine_name, labels = labels.len(), "Applying single-port labels");
            merge_labels(env, &machine_name, labels)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_drops_char_before_first_dot() {
        assert_eq!(service_name("exec-agent.dev-machine.workspaceabc123"), "exec-agen");
        assert_eq!(
            service_name("terminal-dev-machine-wsabc.172.17.0.1.nip.io"),
            "terminal-dev-machine-wsab"
        );
    }

    #[test]
    fn test_service_name_boundaries() {
        assert_eq!(service_name("localhost"), "localhost");
        // dot at index 0 or 1 keeps the hostname unchanged
        assert_eq!(service_name(".example"), ".example");
        assert_eq!(service_name("a.example"), "a.example");
        assert_eq!(service_name("ab.example"), "a");
    }

    #[test]
    fn test_service_name_idempotent() {
        for host in [
            "exec-agent.dev-machine.workspaceabc123",
            "localhost",
            "ab.cd",
            "x.y",
        ] {
            let once = service_name(host);
            assert_eq!(service_name(once), once, "not idempotent for {host}");
        }
    }

    #[test]
    fn test_entry_point_table() {
        assert_eq!(entry_points(HostProtocol::Https, "http"), "https,wss");
        assert_eq!(entry_points(HostProtocol::Https, "ws"), "https,wss");
        assert_eq!(entry_points(HostProtocol::Http, "http"), "http,ws");
        assert_eq!(entry_points(HostProtocol::Http, "ws"), "http,ws");
        assert_eq!(entry_points(HostProtocol::Https, "tcp"), "tcp");
        assert_eq!(entry_points(HostProtocol::Http, "jdwp"), "jdwp");
        assert_eq!(entry_points(HostProtocol::Http, "HTTP"), "HTTP");
    }

    #[test]
    fn test_route_labels() {
        let provisioner = SinglePortLabelsProvisioner::new(&InfraConfig::default());
        let server = ServerConfig::new("4401/tcp", Some("http"));
        let route = provisioner
            .route("exec-agent", &server, "dev-machine", "wsabc")
            .unwrap();

        assert_eq!(route.hostname, "exec-agent-dev-machine-wsabc-a79cd44a");
        assert_eq!(route.service_name, "exec-agent-dev-machine-wsabc-a79cd44a");
        assert_eq!(route.port, "4401");
        assert_eq!(route.entry_point_tags().collect::<Vec<_>>(), ["http", "ws"]);

        let labels: BTreeMap<_, _> = route.labels().into_iter().collect();
        assert_eq!(
            labels["traefik.exec-agent-dev-machine-wsabc-a79cd44a.frontend.entryPoints"],
            "http,ws"
        );
        assert_eq!(labels["traefik.exec-agent-dev-machine-wsabc-a79cd44a.port"], "4401");
        assert_eq!(
            labels["traefik.exec-agent-dev-machine-wsabc-a79cd44a.frontend.rule"],
            "Host:exec-agent-dev-machine-wsabc-a79cd44a"
        );
    }

    #[test]
    fn test_internal_server_has_no_route() {
        let provisioner = SinglePortLabelsProvisioner::new(&InfraConfig::default());
        let server = ServerConfig::new("4401/tcp", Some("http")).with_attribute("internal", "true");
        assert!(provisioner.route("exec-agent", &server, "dev-machine", "wsabc").is_none());
    }

    #[test]
    fn test_servers_that_normalize_alike_keep_both_routes() {
        let config = InfraConfig {
            internal_ip: Some("172.17.0.1".to_string()),
            ..Default::default()
        };
        let provisioner = SinglePortLabelsProvisioner::new(&config);
        let machine = InternalMachineConfig {
            servers: BTreeMap::from([
                ("exec.agent".to_string(), ServerConfig::new("4401/tcp", Some("http"))),
                ("exec-agent".to_string(), ServerConfig::new("4402/tcp", Some("http"))),
            ]),
            ..Default::default()
        };

        let labels = provisioner.machine_labels("dev-machine", &machine, "wsabc");
        let ports: Vec<_> = labels
            .iter()
            .filter(|(k, _)| k.ends_with(".port"))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            ports,
            [
                ("traefik.exec-agent-dev-machine-wsabc-a79cd44.port", "4402"),
                ("traefik.exec-agent-dev-machine-wsabc-c351a32.port", "4401"),
            ]
        );
    }

    #[test]
    fn test_machine_with_only_internal_servers() {
        let provisioner = SinglePortLabelsProvisioner::new(&InfraConfig::default());
        let machine = InternalMachineConfig {
            servers: BTreeMap::from([(
                "wsagent-debug".to_string(),
                ServerConfig::new("4403/tcp", Some("http")).with_attribute("internal", "true"),
            )]),
            ..Default::default()
        };
        assert!(provisioner.machine_labels("db", &machine, "wsabc").is_empty());
    }
}
