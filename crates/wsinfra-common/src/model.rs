use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Server attribute marking a server that must never be routed externally.
pub const INTERNAL_SERVER_ATTRIBUTE: &str = "internal";

/// A named network endpoint declared on a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// Container port with transport suffix, e.g. `8080/tcp`.
    pub port: String,
    pub protocol: Option<String>,
    pub path: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ServerConfig {
    pub fn new(port: impl Into<String>, protocol: Option<&str>) -> Self {
        Self {
            port: port.into(),
            protocol: protocol.map(str::to_string),
            path: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// True when the `internal` attribute parses as boolean true (case-insensitive).
    pub fn is_internal(&self) -> bool {
        self.attributes
            .get(INTERNAL_SERVER_ATTRIBUTE)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Port number without the transport suffix.
    pub fn port_number(&self) -> &str {
        self.port.split('/').next().unwrap_or_default()
    }

    /// Port in the `<number>/<transport>` form used as network binding key.
    pub fn binding_key(&self) -> String {
        if self.port.contains('/') {
            self.port.clone()
        } else {
            format!("{}/tcp", self.port)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MachineStatus {
    Starting,
    Running,
    Stopped,
    Failed,
}

impl Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MachineStatus::Starting => "STARTING",
            MachineStatus::Running => "RUNNING",
            MachineStatus::Stopped => "STOPPED",
            MachineStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Identifies one workspace runtime. Only `workspace_id` takes part in hostnames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeIdentity {
    pub workspace_id: String,
    pub env_name: String,
    pub owner_id: String,
}

impl RuntimeIdentity {
    pub fn new(
        workspace_id: impl Into<String>,
        env_name: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            env_name: env_name.into(),
            owner_id: owner_id.into(),
        }
    }
}
