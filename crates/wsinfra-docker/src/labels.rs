//! Container label schema carrying machine and server metadata.
//!
//! Servers are declared by a `<prefix>server.<name>.port` label; protocol,
//! path and JSON attributes hang off the same `<prefix>server.<name>.` stem.
//! Machine attributes are a single JSON object label.

use std::collections::{BTreeMap, HashMap};
use wsinfra_common::{DecodingError, RuntimeIdentity, ServerConfig};

pub const LABEL_PREFIX: &str = "dev.wsinfra.";
pub const LABEL_MACHINE_NAME: &str = "dev.wsinfra.machine.name";
pub const LABEL_MACHINE_ATTRIBUTES: &str = "dev.wsinfra.machine.attributes";
pub const LABEL_WORKSPACE_ID: &str = "dev.wsinfra.workspace.id";
pub const LABEL_ENV_NAME: &str = "dev.wsinfra.env.name";
pub const LABEL_OWNER_ID: &str = "dev.wsinfra.owner.id";

const SERVER_PREFIX: &str = "dev.wsinfra.server.";
const PORT_SUFFIX: &str = ".port";
const PROTOCOL_SUFFIX: &str = ".protocol";
const PATH_SUFFIX: &str = ".path";
const ATTRIBUTES_SUFFIX: &str = ".attributes";
const SERVER_SUFFIXES: [&str; 4] = [PORT_SUFFIX, PROTOCOL_SUFFIX, PATH_SUFFIX, ATTRIBUTES_SUFFIX];

fn server_label(name: &str, suffix: &str) -> String {
    format!("{SERVER_PREFIX}{name}{suffix}")
}

/// Builds the label map written onto a container before it starts.
#[derive(Debug, Default, Clone)]
pub struct Serializer {
    labels: BTreeMap<String, String>,
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn machine_name(mut self, name: &str) -> Self {
        self.labels
            .insert(LABEL_MACHINE_NAME.to_string(), name.to_string());
        self
    }

    pub fn runtime_id(mut self, identity: &RuntimeIdentity) -> Self {
        self.labels
            .insert(LABEL_WORKSPACE_ID.to_string(), identity.workspace_id.clone());
        self.labels
            .insert(LABEL_ENV_NAME.to_string(), identity.env_name.clone());
        self.labels
            .insert(LABEL_OWNER_ID.to_string(), identity.owner_id.clone());
        self
    }

    pub fn machine_attributes(mut self, attributes: &BTreeMap<String, String>) -> Self {
        if !attributes.is_empty() {
            self.labels.insert(
                LABEL_MACHINE_ATTRIBUTES.to_string(),
                encode_map(attributes),
            );
        }
        self
    }

    pub fn server(mut self, name: &str, server: &ServerConfig) -> Self {
        self.labels
            .insert(server_label(name, PORT_SUFFIX), server.port.clone());
        if let Some(protocol) = &server.protocol {
            self.labels
                .insert(server_label(name, PROTOCOL_SUFFIX), protocol.clone());
        }
        if let Some(path) = &server.path {
            self.labels
                .insert(server_label(name, PATH_SUFFIX), path.clone());
        }
        if !server.attributes.is_empty() {
            self.labels.insert(
                server_label(name, ATTRIBUTES_SUFFIX),
                encode_map(&server.attributes),
            );
        }
        self
    }

    pub fn servers(self, servers: &BTreeMap<String, ServerConfig>) -> Self {
        servers
            .iter()
            .fold(self, |serializer, (name, server)| serializer.server(name, server))
    }

    pub fn labels(self) -> BTreeMap<String, String> {
        self.labels
    }
}

// A map of strings always serializes.
fn encode_map(map: &BTreeMap<String, String>) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
}

fn decode_map(key: &str, raw: &str) -> Result<BTreeMap<String, String>, DecodingError> {
    serde_json::from_str(raw).map_err(|source| DecodingError::MalformedAttributes {
        key: key.to_string(),
        source,
    })
}

/// Reads machine and server metadata back from a container's labels.
#[derive(Debug, Clone, Copy)]
pub struct Deserializer<'a> {
    labels: &'a HashMap<String, String>,
}

impl<'a> Deserializer<'a> {
    pub fn new(labels: &'a HashMap<String, String>) -> Self {
        Self { labels }
    }

    pub fn machine_name(&self) -> Result<String, DecodingError> {
        self.labels
            .get(LABEL_MACHINE_NAME)
            .filter(|name| !name.is_empty())
            .cloned()
            .ok_or(DecodingError::MissingMachineName)
    }

    /// Runtime identity, if the container was labelled with one.
    pub fn runtime_id(&self) -> Option<RuntimeIdentity> {
        let workspace_id = self.labels.get(LABEL_WORKSPACE_ID)?;
        Some(RuntimeIdentity {
            workspace_id: workspace_id.clone(),
            env_name: self.labels.get(LABEL_ENV_NAME).cloned().unwrap_or_default(),
            owner_id: self.labels.get(LABEL_OWNER_ID).cloned().unwrap_or_default(),
        })
    }

    pub fn machine_attributes(&self) -> Result<BTreeMap<String, String>, DecodingError> {
        match self.labels.get(LABEL_MACHINE_ATTRIBUTES) {
            Some(raw) => decode_map(LABEL_MACHINE_ATTRIBUTES, raw),
            None => Ok(BTreeMap::new()),
        }
    }

    pub fn servers(&self) -> Result<BTreeMap<String, ServerConfig>, DecodingError> {
        let mut servers = BTreeMap::new();

        for key in self.labels.keys() {
            let Some(stem) = key.strip_prefix(SERVER_PREFIX) else {
                continue;
            };
            let Some(name) = SERVER_SUFFIXES
                .iter()
                .find_map(|suffix| stem.strip_suffix(suffix))
                .filter(|name| !name.is_empty())
            else {
                continue;
            };
            if servers.contains_key(name) {
                continue;
            }
            servers.insert(name.to_string(), self.server(name)?);
        }

        Ok(servers)
    }

    fn server(&self, name: &str) -> Result<ServerConfig, DecodingError> {
        let port = self
            .labels
            .get(&server_label(name, PORT_SUFFIX))
            .ok_or_else(|| DecodingError::MissingPort {
                server: name.to_string(),
            })?;
        if !is_valid_port(port) {
            return Err(DecodingError::MalformedPort {
                server: name.to_string(),
                value: port.clone(),
            });
        }

        let attributes_key = server_label(name, ATTRIBUTES_SUFFIX);
        let attributes = match self.labels.get(&attributes_key) {
            Some(raw) => decode_map(&attributes_key, raw)?,
            None => BTreeMap::new(),
        };

        Ok(ServerConfig {
            port: port.clone(),
            protocol: self.labels.get(&server_label(name, PROTOCOL_SUFFIX)).cloned(),
            path: self.labels.get(&server_label(name, PATH_SUFFIX)).cloned(),
            attributes,
        })
    }
}

/// `<number>` or `<number>/<transport>`.
fn is_valid_port(port: &str) -> bool {
    let (number, transport) = match port.split_once('/') {
        Some((number, transport)) => (number, Some(transport)),
        None => (port, None),
    };
    let number_ok = number.parse::<u16>().is_ok_and(|n| n > 0);
    let transport_ok = transport.map_or(true, |t| {
        !t.is_empty() && t.chars().all(|c| c.is_ascii_alphanumeric())
    });
    number_ok && transport_ok
}
