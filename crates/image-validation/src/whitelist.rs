//! Registry whitelisting.
//!
//! A [`RegistryWhitelister`] decides whether a registry may be contacted,
//! given an ordered list of host/port globs. Entries carry a transport:
//! secure entries without an explicit port only cover `443`, insecure
//! ones only `80`.

use std::{
    collections::HashSet,
    fmt::{self, Display},
};

use docker_reference::{
    DOCKER_DEFAULT_REGISTRY, DOCKER_DEFAULT_V1_REGISTRY, DOCKER_DEFAULT_V2_REGISTRY,
    DockerImageReference, ReferenceError, join_host_port, split_host_port,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// At most this many entries are listed in a rejection message.
const SHOW_MAX: usize = 5;

/// Which transport an admitted registry must be reachable over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WhitelistTransport {
    /// HTTPS only.
    #[default]
    Secure,
    /// Plain HTTP only.
    Insecure,
    /// Either.
    Any,
}

impl WhitelistTransport {
    /// The transport used to check a reference whose import may be insecure.
    pub fn for_insecure(insecure: bool) -> Self {
        if insecure { Self::Any } else { Self::Secure }
    }
}

/// A single configured whitelist entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RegistryLocation {
    /// A host glob with an optional port glob, e.g. `*.example.com:5000`.
    pub domain_name: String,
    #[serde(default)]
    pub insecure: bool,
}

pub type AllowedRegistries = Vec<RegistryLocation>;

/// The hostnames of the cluster's own registry, which are always admitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistryHostnames {
    pub internal: Option<String>,
    pub external: Option<String>,
}

impl RegistryHostnames {
    fn contains(&self, registry: &str) -> bool {
        [&self.internal, &self.external]
            .into_iter()
            .flatten()
            .any(|hostname| !hostname.is_empty() && hostname == registry)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WhitelistError {
    #[error("missing hostname in \"{0}\"")]
    MissingHostname(String),
    #[error("failed to parse allowed registry \"{0}\"")]
    InvalidEntry(String),
    #[error("registry \"{hostname}\" not allowed by empty whitelist")]
    EmptyWhitelist { hostname: String },
    #[error("registry \"{hostname}\" not allowed by whitelist: {entries}")]
    NotAllowed { hostname: String, entries: String },
    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

/// A case-insensitive glob where `*` matches any run of characters.
#[derive(Clone, Debug)]
enum Glob {
    Any,
    Pattern { source: String, regex: Regex },
}

impl Glob {
    fn new(pattern: &str) -> Result<Self, regex::Error> {
        if pattern == "*" {
            return Ok(Self::Any);
        }

        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        Ok(Self::Pattern {
            source: pattern.into(),
            regex: Regex::new(&format!("(?i)^{body}$"))?,
        })
    }

    fn is_match(&self, s: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Pattern { regex, .. } => regex.is_match(s),
        }
    }
}

impl Display for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Pattern { source, .. } => f.write_str(source),
        }
    }
}

#[derive(Clone, Debug)]
struct HostPortGlob {
    host: Glob,
    port: Glob,
}

impl HostPortGlob {
    fn matches(&self, host: &str, port: &str) -> bool {
        if !self.host.is_match(host) {
            return false;
        }

        // Without a port, accept entries covering either default port.
        if port.is_empty() {
            return matches!(self.port.to_string().as_str(), "80" | "443" | "*");
        }

        self.port.is_match(port)
    }
}

impl Display for HostPortGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Decides whether registries may be contacted.
///
/// Cloning produces a fully independent whitelister: grandfathering
/// references into a clone never affects the original.
#[derive(Clone, Debug)]
pub struct RegistryWhitelister {
    whitelist: Vec<HostPortGlob>,
    pull_specs: HashSet<String>,
    hostnames: RegistryHostnames,
}

impl RegistryWhitelister {
    /// Builds a whitelister from configured entries, keeping their order.
    pub fn new(
        allowed: &[RegistryLocation],
        hostnames: RegistryHostnames,
    ) -> Result<Self, WhitelistError> {
        let mut whitelister = Self {
            whitelist: Vec::with_capacity(allowed.len()),
            pull_specs: HashSet::new(),
            hostnames,
        };

        // Each entry is prepended, so walk backwards to keep configured order.
        for location in allowed.iter().rev() {
            let transport = if location.insecure {
                WhitelistTransport::Insecure
            } else {
                WhitelistTransport::Secure
            };
            whitelister.whitelist_registry(&location.domain_name, transport)?;
        }

        Ok(whitelister)
    }

    /// A whitelister admitting every registry.
    pub fn allow_all() -> Self {
        Self {
            whitelist: vec![HostPortGlob {
                host: Glob::Any,
                port: Glob::Any,
            }],
            pull_specs: HashSet::new(),
            hostnames: RegistryHostnames::default(),
        }
    }

    /// Returns the configured entries as `host:port` globs, in match order.
    pub fn entries(&self) -> impl Iterator<Item = String> + '_ {
        self.whitelist.iter().map(|hp| hp.to_string())
    }

    /// Admits a bare `host[:port]`.
    pub fn admit_hostname(
        &self,
        hostport: &str,
        transport: WhitelistTransport,
    ) -> Result<(), WhitelistError> {
        let reference = DockerImageReference {
            registry: hostport.into(),
            ..Default::default()
        };
        self.admit_docker_image_reference(&reference, transport)
    }

    /// Parses and admits a pull spec.
    pub fn admit_pull_spec(
        &self,
        pull_spec: &str,
        transport: WhitelistTransport,
    ) -> Result<(), WhitelistError> {
        let reference = DockerImageReference::parse(pull_spec)?;
        self.admit_docker_image_reference(&reference, transport)
    }

    pub fn admit_docker_image_reference(
        &self,
        reference: &DockerImageReference,
        transport: WhitelistTransport,
    ) -> Result<(), WhitelistError> {
        if self.is_grandfathered(reference) {
            tracing::debug!("admitting grandfathered reference {}", reference.exact());
            return Ok(());
        }

        if self.hostnames.contains(&reference.registry) {
            return Ok(());
        }

        let (host, port) = match transport {
            WhitelistTransport::Any => {
                let (host, port) = match split_host_port(&reference.registry) {
                    Some((host, port)) if !port.is_empty() => (host.to_string(), port.to_string()),
                    _ => (reference.registry.clone(), String::new()),
                };
                if host.is_empty() {
                    (reference.registry_host_port(false).0, port)
                } else {
                    (host, port)
                }
            }
            WhitelistTransport::Insecure => reference.registry_host_port(true),
            WhitelistTransport::Secure => reference.registry_host_port(false),
        };

        let matched = match host.as_str() {
            // Try plain docker.io first so that `docker.io:*` style entries apply.
            DOCKER_DEFAULT_V1_REGISTRY | DOCKER_DEFAULT_V2_REGISTRY => {
                self.matches(DOCKER_DEFAULT_REGISTRY, &port) || self.matches(&host, &port)
            }
            _ => self.matches(&host, &port),
        };
        if matched {
            return Ok(());
        }

        let hostname = match (reference.registry.as_str(), port.as_str()) {
            ("", "") => host,
            ("", port) => join_host_port(&host, port),
            (registry, _) => registry.into(),
        };

        if self.whitelist.is_empty() {
            return Err(WhitelistError::EmptyWhitelist { hostname });
        }

        let mut shown = self
            .whitelist
            .iter()
            .take(SHOW_MAX)
            .map(|hp| format!("\"{hp}\""))
            .collect::<Vec<_>>();
        if self.whitelist.len() > SHOW_MAX {
            shown.push("...".into());
        }

        Err(WhitelistError::NotAllowed {
            hostname,
            entries: shown.join(", "),
        })
    }

    /// Prepends an entry, so it takes precedence over existing ones.
    pub fn whitelist_registry(
        &mut self,
        host_port_glob: &str,
        transport: WhitelistTransport,
    ) -> Result<(), WhitelistError> {
        let parts = host_port_glob.splitn(3, ':').collect::<Vec<_>>();
        let (host, port) = match parts.as_slice() {
            [host] => {
                let port = match transport {
                    WhitelistTransport::Secure => "443",
                    WhitelistTransport::Insecure => "80",
                    WhitelistTransport::Any => "*",
                };
                (*host, port)
            }
            [host, port] => (*host, *port),
            _ => return Err(WhitelistError::InvalidEntry(host_port_glob.into())),
        };

        if host.is_empty() {
            return Err(WhitelistError::MissingHostname(host_port_glob.into()));
        }

        let invalid = |_| WhitelistError::InvalidEntry(host_port_glob.into());
        let entry = HostPortGlob {
            host: Glob::new(host).map_err(invalid)?,
            port: Glob::new(port).map_err(invalid)?,
        };
        self.whitelist.insert(0, entry);

        Ok(())
    }

    /// Grandfathers a single previously stored pull spec, so that it
    /// stays admissible even if the whitelist no longer covers it.
    pub fn whitelist_repository(&mut self, pull_spec: &str) -> Result<(), ReferenceError> {
        let reference = DockerImageReference::parse(pull_spec)?;
        self.pull_specs.insert(reference.exact());
        Ok(())
    }

    /// Grandfathers every pull spec, skipping (and logging) unparsable ones.
    pub fn whitelist_pull_specs<'a>(&mut self, pull_specs: impl IntoIterator<Item = &'a str>) {
        for pull_spec in pull_specs {
            if let Err(err) = self.whitelist_repository(pull_spec) {
                tracing::debug!("not grandfathering \"{pull_spec}\": {err}");
            }
        }
    }

    fn is_grandfathered(&self, reference: &DockerImageReference) -> bool {
        if self.pull_specs.is_empty() {
            return false;
        }

        [
            reference.exact(),
            reference.docker_client_defaults().exact(),
            reference.daemon_minimal().exact(),
        ]
        .iter()
        .any(|form| self.pull_specs.contains(form))
    }

    fn matches(&self, host: &str, port: &str) -> bool {
        self.whitelist.iter().any(|hp| hp.matches(host, port))
    }
}
