use sha2::{Digest, Sha256};
use wsinfra_common::InfraConfig;

const DEFAULT_WILDCARD_HOST: &str = "nip.io";
/// Longest DNS label allowed by RFC 1035.
pub const MAX_LABEL_LEN: usize = 63;
/// Hex digits of the identity digest closing every first label.
const DIGEST_LEN: usize = 8;

/// Builds the external hostname of one server in single-port ingress mode.
///
/// The first DNS label is `<server>-<machine>-<workspace>-<digest>`: the
/// readable part is lowercased with every run of characters outside
/// `[a-z0-9]` folded into one `-`, and cut so the whole label fits in 63
/// characters. The digest is taken over the raw identifiers, so two triples
/// that normalize alike (`exec.agent` and `exec-agent`, or `exec-agent`/`dev`
/// and `exec`/`agent-dev`) still get different labels.
///
/// The wildcard domain, when one can be derived, follows after a dot:
///
/// * ip-less wildcard host: `<label>.<wildcard host>`
/// * known address: `<label>.<address>.<wildcard host or nip.io>`
/// * wildcard host only: `<label>.<wildcard host>`
/// * nothing configured: `<label>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinglePortHostnameBuilder {
    domain: Option<String>,
    certificate_provider: Option<String>,
}

impl SinglePortHostnameBuilder {
    pub fn new(config: &InfraConfig) -> Self {
        Self {
            domain: wildcard_domain(config),
            certificate_provider: config.certificate_provider.clone(),
        }
    }

    pub fn build(&self, server_name: &str, machine_name: &str, workspace_id: &str) -> String {
        let label = first_label([server_name, machine_name, workspace_id]);
        match &self.domain {
            Some(domain) => format!("{label}.{domain}"),
            None => label,
        }
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn certificate_provider(&self) -> Option<&str> {
        self.certificate_provider.as_deref()
    }
}

fn wildcard_domain(config: &InfraConfig) -> Option<String> {
    let wildcard_host = config.wildcard_domain_host.as_deref();
    if config.wildcard_domain_ipless {
        if let Some(host) = wildcard_host {
            return Some(host.to_string());
        }
    }
    let address = config
        .external_ip
        .as_deref()
        .or(config.internal_ip.as_deref());
    match (address, wildcard_host) {
        (Some(address), host) => Some(format!(
            "{address}.{}",
            host.unwrap_or(DEFAULT_WILDCARD_HOST)
        )),
        (None, Some(host)) => Some(host.to_string()),
        (None, None) => None,
    }
}

fn first_label(parts: [&str; 3]) -> String {
    let digest = identity_digest(&parts);
    let readable = normalize(&parts.join("-"));
    // normalized text is ASCII, so byte offsets are char boundaries
    let budget = MAX_LABEL_LEN - DIGEST_LEN - 1;
    let readable = readable[..readable.len().min(budget)].trim_end_matches('-');
    if readable.is_empty() {
        digest
    } else {
        format!("{readable}-{digest}")
    }
}

/// Length-prefixed so part boundaries take part in the digest.
fn identity_digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(DIGEST_LEN);
    digest
}

/// Lowercase, fold every run outside `[a-z0-9]` into one `-`, trim edge dashes.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.truncate(out.trim_end_matches('-').len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(
        internal: Option<&str>,
        external: Option<&str>,
        host: Option<&str>,
        ipless: bool,
    ) -> SinglePortHostnameBuilder {
        SinglePortHostnameBuilder::new(&InfraConfig {
            internal_ip: internal.map(str::to_string),
            external_ip: external.map(str::to_string),
            wildcard_domain_host: host.map(str::to_string),
            wildcard_domain_ipless: ipless,
            ..Default::default()
        })
    }

    fn is_dns_label(label: &str) -> bool {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    #[test]
    fn test_bare_label_without_domain() {
        let b = builder(None, None, None, false);
        assert_eq!(
            b.build("exec-agent", "dev-machine", "wsabc"),
            "exec-agent-dev-machine-wsabc-a79cd44a"
        );
        assert!(b.domain().is_none());
    }

    #[test]
    fn test_address_prefers_external() {
        let b = builder(Some("172.17.0.1"), Some("203.0.113.7"), None, false);
        assert_eq!(
            b.build("terminal", "dev-machine", "wsabc"),
            "terminal-dev-machine-wsabc-aad93e09.203.0.113.7.nip.io"
        );

        let b = builder(Some("172.17.0.1"), None, Some("xip.example.net"), false);
        assert_eq!(
            b.build("terminal", "dev-machine", "wsabc"),
            "terminal-dev-machine-wsabc-aad93e09.172.17.0.1.xip.example.net"
        );
    }

    #[test]
    fn test_ipless_wildcard_host() {
        let b = builder(Some("172.17.0.1"), None, Some("ws.example.com"), true);
        assert_eq!(
            b.build("terminal", "dev-machine", "wsabc"),
            "terminal-dev-machine-wsabc-aad93e09.ws.example.com"
        );

        // ip-less without a wildcard host falls back to the address form
        let b = builder(Some("172.17.0.1"), None, None, true);
        assert_eq!(b.domain(), Some("172.17.0.1.nip.io"));
    }

    #[test]
    fn test_normalizes_identifiers() {
        let b = builder(None, None, Some("example.com"), false);
        assert_eq!(
            b.build("Exec.Agent/HTTP", "dev_machine", "WorkspaceAO6K"),
            "exec-agent-http-dev-machine-workspaceao6k-0011a182.example.com"
        );
        assert_eq!(
            b.build("-exec-", "-dev-", "wsabc"),
            "exec-dev-wsabc-fabbb520.example.com"
        );
    }

    #[test]
    fn test_deterministic() {
        let b = builder(Some("10.0.0.1"), None, None, false);
        assert_eq!(
            b.build("exec", "dev-machine", "wsabc"),
            b.build("exec", "dev-machine", "wsabc")
        );
        assert_ne!(
            b.build("exec", "dev-machine", "wsabc"),
            b.build("terminal", "dev-machine", "wsabc")
        );
    }

    #[test]
    fn test_identifiers_that_normalize_alike_stay_distinct() {
        let b = builder(Some("172.17.0.1"), None, None, false);
        assert_eq!(
            b.build("exec.agent", "dev-machine", "wsabc"),
            "exec-agent-dev-machine-wsabc-c351a32d.172.17.0.1.nip.io"
        );
        assert_ne!(
            b.build("exec.agent", "dev-machine", "wsabc"),
            b.build("exec-agent", "dev-machine", "wsabc")
        );
        assert_ne!(
            b.build("Exec-Agent", "dev-machine", "wsabc"),
            b.build("exec-agent", "dev-machine", "wsabc")
        );

        // the same dashes split differently between server and machine
        assert_eq!(first_label(["exec-agent", "dev", "wsabc"]), "exec-agent-dev-wsabc-9774a1d5");
        assert_eq!(first_label(["exec", "agent-dev", "wsabc"]), "exec-agent-dev-wsabc-eff513c3");
    }

    #[test]
    fn test_long_identifiers_fit_one_label() {
        let label = first_label([
            "workspace-agent-language-server",
            "dev-machine-with-a-long-name",
            "workspacelmmv5izvzp0ikfte",
        ]);
        assert_eq!(label, "workspace-agent-language-server-dev-machine-with-a-lon-f88c2baf");
        assert_eq!(label.len(), MAX_LABEL_LEN);

        let long = "x".repeat(200);
        let a = first_label([long.as_str(), "dev-machine", "wsabc"]);
        let b = first_label([long.as_str(), "dev-machine", "wsabd"]);
        assert!(is_dns_label(&a) && is_dns_label(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_edge_characters_yield_valid_labels() {
        let dashes = "-".repeat(80);
        for parts in [
            ["-exec-", "-dev-", "wsabc"],
            ["...", "___", ""],
            ["", "", ""],
            ["Ünïcode", "dev machine", "ws/abc"],
            ["exec", "dev", dashes.as_str()],
        ] {
            let label = first_label(parts);
            assert!(is_dns_label(&label), "invalid label {label:?} for {parts:?}");
        }
        assert_eq!(first_label(["...", "___", ""]), "b8b6854a");
    }

    #[test]
    fn test_certificate_provider_carried() {
        let b = SinglePortHostnameBuilder::new(&InfraConfig {
            certificate_provider: Some("letsencrypt".to_string()),
            ..Default::default()
        });
        assert_eq!(b.certificate_provider(), Some("letsencrypt"));
    }
}
