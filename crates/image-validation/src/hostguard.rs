//! Guarding against imports that reach into the cluster's own network.
//!
//! Before a registry is contacted on a user's behalf, its host is resolved
//! and every address is checked: loopback and link-local addresses are
//! never contacted, and neither is anything inside a blocked prefix,
//! unless that particular address is explicitly allowed.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv6Addr},
};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("lookup failed")]
    Io(#[from] std::io::Error),
    #[error("no such host")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid registry url \"{0}\"")]
    InvalidRegistryUrl(String),
    #[error("loopback import not allowed")]
    Loopback,
    #[error("link-local import not allowed")]
    LinkLocal,
    #[error("import from {0} not allowed")]
    Blocked(IpNet),
    #[error("failed to resolve \"{host}\": {source}")]
    Resolve {
        host: String,
        #[source]
        source: ResolveError,
    },
    #[error("\"{0}\" did not resolve to any address")]
    NoAddresses(String),
}

/// Resolves hostnames to addresses.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Resolves through the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

#[async_trait::async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Resolves from a fixed table. Unknown hosts fail to resolve.
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, addrs: impl Into<Vec<IpAddr>>) -> Self {
        self.hosts.insert(host.into(), addrs.into());
        self
    }
}

#[async_trait::async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        self.hosts.get(host).cloned().ok_or(ResolveError::NotFound)
    }
}

/// Address prefixes that may or may not be contacted.
///
/// An address in `allowed` passes every check, including the loopback
/// and link-local ones.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostPolicy {
    pub blocked: Vec<IpNet>,
    pub allowed: Vec<IpNet>,
}

impl HostPolicy {
    fn check(&self, ip: IpAddr) -> Result<(), HostError> {
        let ip = ip.to_canonical();

        if self.allowed.iter().any(|net| net.contains(&ip)) {
            return Ok(());
        }

        // The unspecified address routes to the local host.
        if ip.is_loopback() || ip.is_unspecified() {
            return Err(HostError::Loopback);
        }

        if is_link_local(ip) {
            return Err(HostError::LinkLocal);
        }

        match self.blocked.iter().find(|net| net.contains(&ip)) {
            Some(net) => Err(HostError::Blocked(*net)),
            None => Ok(()),
        }
    }
}

fn is_link_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            // 224.0.0.0/24 is link-local multicast.
            v4.is_link_local() || (v4.octets()[..3] == [224, 0, 0])
        }
        IpAddr::V6(v6) => v6.is_unicast_link_local() || v6.segments()[0] == 0xff02,
    }
}

/// Extracts the bare host from `host`, `host:port`, `[v6]` or `[v6]:port`.
///
/// Returns `None` for an empty input.
pub fn split_registry_host(host: &str) -> Result<Option<&str>, HostError> {
    if host.is_empty() {
        return Ok(None);
    }

    let invalid = || HostError::InvalidRegistryUrl(host.into());

    let (hostname, port) = if let Some(rest) = host.strip_prefix('[') {
        let (inner, after) = rest.split_once(']').ok_or_else(invalid)?;
        inner.parse::<Ipv6Addr>().map_err(|_| invalid())?;
        match after {
            "" => (inner, None),
            _ => (inner, Some(after.strip_prefix(':').ok_or_else(invalid)?)),
        }
    } else {
        match host.split_once(':') {
            // More than one colon means an unbracketed IPv6 address.
            Some((_, port)) if port.contains(':') => return Err(invalid()),
            Some((hostname, port)) => (hostname, Some(port)),
            None => (host, None),
        }
    };

    if hostname.is_empty()
        || hostname.contains(['[', ']', '/', '@', ' '])
        || port.is_some_and(|port| port.parse::<u16>().is_err())
    {
        return Err(invalid());
    }

    Ok(Some(hostname))
}

/// Returns an error if `host` should not be contacted under `policy`.
///
/// Every address the host resolves to must pass; one bad address rejects
/// the whole host. The returned future can be dropped at any await point,
/// and performs no retries.
pub async fn should_contact_host(
    host: &str,
    policy: &HostPolicy,
    resolver: &dyn Resolver,
) -> Result<(), HostError> {
    let Some(hostname) = split_registry_host(host)? else {
        return Ok(());
    };

    let addrs = match hostname.parse::<IpAddr>() {
        Ok(ip) => vec![ip],
        Err(_) => resolver
            .resolve(hostname)
            .await
            .map_err(|source| HostError::Resolve {
                host: hostname.into(),
                source,
            })?,
    };

    if addrs.is_empty() {
        return Err(HostError::NoAddresses(hostname.into()));
    }

    tracing::debug!("{hostname} resolved to {} address(es)", addrs.len());

    for ip in addrs {
        policy.check(ip)?;
    }

    Ok(())
}
