use crate::{InfrastructureError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

pub const DEFAULT_REGISTRY: &str = "localhost:5000";

/// Protocol the workspace master is served with; decides plain vs. secure ingress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostProtocol {
    #[default]
    Http,
    Https,
}

impl HostProtocol {
    pub fn is_secure(&self) -> bool {
        matches!(self, HostProtocol::Https)
    }
}

impl FromStr for HostProtocol {
    type Err = InfrastructureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(HostProtocol::Http),
            "https" => Ok(HostProtocol::Https),
            other => Err(InfrastructureError::Config(format!(
                "unsupported host protocol '{other}', expected http or https"
            ))),
        }
    }
}

impl Display for HostProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostProtocol::Http => f.write_str("http"),
            HostProtocol::Https => f.write_str("https"),
        }
    }
}

/// Immutable docker infrastructure settings, built once at process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraConfig {
    /// Registry machine images are pushed to and pulled from.
    pub registry: String,
    /// Address under which containers are reached. When unset the container's
    /// gateway address is used instead.
    pub internal_ip: Option<String>,
    /// Address of the docker host as seen from outside; preferred over
    /// `internal_ip` when building wildcard hostnames.
    pub external_ip: Option<String>,
    /// Overlay network the ingress proxy must use to reach containers.
    pub network: Option<String>,
    pub host_protocol: HostProtocol,
    /// Wildcard DNS domain, e.g. `nip.io` or a custom `*.example.com` host.
    pub wildcard_domain_host: Option<String>,
    /// Wildcard domain resolves on its own; no address is embedded in hostnames.
    pub wildcard_domain_ipless: bool,
    /// Opaque certificate provider tag, passed through to consumers.
    pub certificate_provider: Option<String>,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            internal_ip: None,
            external_ip: None,
            network: None,
            host_protocol: HostProtocol::Http,
            wildcard_domain_host: None,
            wildcard_domain_ipless: false,
            certificate_provider: None,
        }
    }
}

impl InfraConfig {
    /// Load configuration from `WSINFRA_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host_protocol = match get("WSINFRA_HOST_PROTOCOL") {
            Some(value) => value.parse()?,
            None => HostProtocol::default(),
        };

        let wildcard_domain_ipless = match get("WSINFRA_SINGLEPORT_WILDCARD_DOMAIN_IPLESS") {
            Some(value) if value.eq_ignore_ascii_case("true") => true,
            Some(value) if value.eq_ignore_ascii_case("false") => false,
            Some(value) => {
                return Err(InfrastructureError::Config(format!(
                    "WSINFRA_SINGLEPORT_WILDCARD_DOMAIN_IPLESS must be true or false, got '{value}'"
                )))
            }
            None => false,
        };

        Ok(Self {
            registry: get("WSINFRA_DOCKER_REGISTRY").unwrap_or_else(|| DEFAULT_REGISTRY.to_string()),
            internal_ip: get("WSINFRA_DOCKER_IP"),
            external_ip: get("WSINFRA_DOCKER_IP_EXTERNAL"),
            network: get("WSINFRA_DOCKER_NETWORK"),
            host_protocol,
            wildcard_domain_host: get("WSINFRA_SINGLEPORT_WILDCARD_DOMAIN_HOST"),
            wildcard_domain_ipless,
            certificate_provider: get("WSINFRA_HTTPS_CERTIFICATE_PROVIDER"),
        })
    }
}
