//! Docker/OCI image pull spec parsing.
//!
//! This follows the `docker/distribution` reference grammar, except
//! that no implicit `docker.io` normalization happens at parse time:
//! a parsed reference records exactly what the user wrote, and the
//! various defaulting forms ([`DockerImageReference::docker_client_defaults`],
//! [`DockerImageReference::daemon_minimal`], etc.) are applied explicitly.

use std::{
    fmt::{self, Display},
    str::FromStr,
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

/// The registry Docker clients assume when none is given.
pub const DOCKER_DEFAULT_REGISTRY: &str = "docker.io";
/// The legacy (v1) Docker Hub endpoint.
pub const DOCKER_DEFAULT_V1_REGISTRY: &str = "index.docker.io";
/// The Docker Hub endpoint that actually serves the v2 API.
pub const DOCKER_DEFAULT_V2_REGISTRY: &str = "registry-1.docker.io";
/// The implicit namespace of official Docker Hub images.
pub const DOCKER_DEFAULT_NAMESPACE: &str = "library";
/// The tag Docker clients assume when neither a tag nor a digest is given.
pub const DOCKER_DEFAULT_TAG: &str = "latest";
/// The maximum length of a repository name, registry included.
pub const NAME_TOTAL_LENGTH_MAX: usize = 255;

/// The pattern a single repository path component must match.
pub const NAME_COMPONENT_PATTERN: &str = r"[a-z0-9]+(?:(?:[._]|__|[-]*)[a-z0-9]+)*";
const DOMAIN_COMPONENT: &str = r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])";
const TAG: &str = r"[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}";
const DIGEST: &str = r"[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{32,}";

/// Matches a full reference, capturing (1) the name, (2) the tag
/// and (3) the digest.
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    let domain = format!(
        r"(?:{DOMAIN_COMPONENT}(?:\.{DOMAIN_COMPONENT})*|\[[a-fA-F0-9:]+\])(?::[0-9]+)?"
    );
    let name = format!("(?:{domain}/)?{NAME_COMPONENT_PATTERN}(?:/{NAME_COMPONENT_PATTERN})*");

    Regex::new(&format!("^({name})(?::({TAG}))?(?:@({DIGEST}))?$"))
        .expect("invalid reference pattern")
});

static ANCHORED_DIGEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{DIGEST}$")).expect("invalid digest pattern"));

static ANCHORED_PATH_COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{NAME_COMPONENT_PATTERN}$")).expect("invalid path component pattern")
});

/// Errors produced while parsing a pull spec.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("repository name must have at least one component")]
    Empty,
    #[error("invalid reference format")]
    InvalidFormat,
    #[error("invalid reference format: repository name must be lowercase")]
    NameContainsUppercase,
    #[error("repository name must not be more than {NAME_TOTAL_LENGTH_MAX} characters")]
    NameTooLong,
    #[error("invalid reference format: a reference may carry a tag or a digest, not both")]
    TagAndDigest,
}

/// A pull spec decomposed into its parts.
///
/// Empty strings mean "absent". Parsed references never carry both
/// a tag and an ID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DockerImageReference {
    pub registry: String,
    pub namespace: String,
    pub name: String,
    pub tag: String,
    pub id: String,
}

impl DockerImageReference {
    /// Parse a pull spec such as `quay.io/openshift/origin-cli:4.14`.
    pub fn parse(spec: &str) -> Result<Self, ReferenceError> {
        if spec.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let Some(caps) = REFERENCE.captures(spec) else {
            // Give a more useful error for the common mistake of
            // capitalizing a repository name.
            if REFERENCE.is_match(&spec.to_ascii_lowercase()) {
                return Err(ReferenceError::NameContainsUppercase);
            }
            return Err(ReferenceError::InvalidFormat);
        };

        let full_name = &caps[1];
        if full_name.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(ReferenceError::NameTooLong);
        }

        let tag = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let id = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        if !tag.is_empty() && !id.is_empty() {
            return Err(ReferenceError::TagAndDigest);
        }

        // The first component is only a registry if it looks like a host.
        let (registry, remainder) = match full_name.split_once('/') {
            Some((first, rest)) if first.contains(['.', ':']) || first == "localhost" => {
                (first, rest)
            }
            _ => ("", full_name),
        };

        let (namespace, name) = remainder.split_once('/').unwrap_or(("", remainder));

        Ok(Self {
            registry: registry.into(),
            namespace: namespace.into(),
            name: name.into(),
            tag: tag.into(),
            id: id.into(),
        })
    }

    /// Returns the `name[:tag|@id]` portion of this reference.
    pub fn name_string(&self) -> String {
        match (self.name.as_str(), self.tag.as_str(), self.id.as_str()) {
            ("", _, _) => String::new(),
            (name, tag, _) if !tag.is_empty() => format!("{name}:{tag}"),
            (name, _, id) if !id.is_empty() => {
                if is_digest(id) {
                    format!("{name}@{id}")
                } else {
                    format!("{name}:{id}")
                }
            }
            (name, _, _) => name.into(),
        }
    }

    /// Returns the reference exactly as described, with no defaults applied.
    pub fn exact(&self) -> String {
        let name = self.name_string();
        if name.is_empty() {
            return name;
        }

        let mut exact = String::new();
        if !self.registry.is_empty() {
            exact.push_str(&self.registry);
            exact.push('/');
        }
        if !self.namespace.is_empty() {
            exact.push_str(&self.namespace);
            exact.push('/');
        }
        exact.push_str(&name);
        exact
    }

    /// Returns `[namespace/]name`.
    pub fn repository_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }

    /// Returns a copy of this reference without its tag or ID.
    pub fn as_repository(&self) -> Self {
        Self {
            tag: String::new(),
            id: String::new(),
            ..self.clone()
        }
    }

    /// Returns a copy with the defaults a Docker client would apply.
    pub fn docker_client_defaults(&self) -> Self {
        let mut r = self.clone();
        if r.registry.is_empty() {
            r.registry = DOCKER_DEFAULT_REGISTRY.into();
        }
        if r.namespace.is_empty() && is_registry_docker_hub(&r.registry) {
            r.namespace = DOCKER_DEFAULT_NAMESPACE.into();
        }
        if r.tag.is_empty() && r.id.is_empty() {
            r.tag = DOCKER_DEFAULT_TAG.into();
        }
        r
    }

    /// Returns a copy without a `latest` tag.
    pub fn minimal(&self) -> Self {
        let mut r = self.clone();
        if r.tag == DOCKER_DEFAULT_TAG {
            r.tag = String::new();
        }
        r
    }

    /// Returns a copy with Docker Hub aliases rewritten to the host
    /// that serves the v2 registry API.
    pub fn as_v2(&self) -> Self {
        let mut r = self.clone();
        if r.registry == DOCKER_DEFAULT_REGISTRY || r.registry == DOCKER_DEFAULT_V1_REGISTRY {
            r.registry = DOCKER_DEFAULT_V2_REGISTRY.into();
        }
        r
    }

    /// Returns the shortest form a Docker daemon would display for
    /// this reference.
    pub fn daemon_minimal(&self) -> Self {
        let mut r = self.clone();
        if r.registry == DOCKER_DEFAULT_V1_REGISTRY || r.registry == DOCKER_DEFAULT_V2_REGISTRY {
            r.registry = DOCKER_DEFAULT_REGISTRY.into();
        }
        if is_registry_docker_hub(&r.registry) && r.namespace == DOCKER_DEFAULT_NAMESPACE {
            r.namespace = String::new();
        }
        r.minimal()
    }

    /// Returns the host and port a client would contact to pull this
    /// reference. The port defaults to 443, or 80 when `insecure`.
    pub fn registry_host_port(&self, insecure: bool) -> (String, String) {
        let registry = self.docker_client_defaults().as_v2().registry;

        match split_host_port(&registry) {
            Some((host, port)) if !port.is_empty() => (host.into(), port.into()),
            Some((host, _)) => (host.into(), default_port(insecure).into()),
            None => {
                let host = registry
                    .strip_prefix('[')
                    .and_then(|host| host.strip_suffix(']'))
                    .unwrap_or(&registry);
                (host.into(), default_port(insecure).into())
            }
        }
    }
}

impl Display for DockerImageReference {
    /// Renders the reference with the implicit Docker Hub namespace made
    /// explicit. Use [`DockerImageReference::exact`] for the verbatim form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() && is_registry_docker_hub(&self.registry) {
            let r = Self {
                namespace: DOCKER_DEFAULT_NAMESPACE.into(),
                ..self.clone()
            };
            write!(f, "{}", r.exact())
        } else {
            write!(f, "{}", self.exact())
        }
    }
}

impl FromStr for DockerImageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DockerImageReference {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.exact())
    }
}

impl<'de> Deserialize<'de> for DockerImageReference {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

fn default_port(insecure: bool) -> &'static str {
    if insecure { "80" } else { "443" }
}

/// Returns whether `registry` is one of the Docker Hub aliases.
pub fn is_registry_docker_hub(registry: &str) -> bool {
    matches!(
        registry,
        DOCKER_DEFAULT_REGISTRY | DOCKER_DEFAULT_V1_REGISTRY | DOCKER_DEFAULT_V2_REGISTRY
    )
}

/// Returns whether `id` is a well-formed `algorithm:hex` digest.
pub fn is_digest(id: &str) -> bool {
    ANCHORED_DIGEST.is_match(id)
}

/// Returns whether `component` is a valid single repository path component.
pub fn is_repository_name_component(component: &str) -> bool {
    ANCHORED_PATH_COMPONENT.is_match(component)
}

/// Splits `host:port` or `[v6]:port` into its host and port.
///
/// Returns `None` when there is no port separator, or when an IPv6
/// address appears without brackets. The port may be empty.
pub fn split_host_port(hostport: &str) -> Option<(&str, &str)> {
    if let Some(rest) = hostport.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        if host.contains(['[', ']']) || port.contains(['[', ']', ':']) {
            return None;
        }
        return Some((host, port));
    }

    let (host, port) = hostport.rsplit_once(':')?;
    if host.contains([':', '[', ']']) || port.contains(['[', ']']) {
        return None;
    }
    Some((host, port))
}

/// Joins a host and port, bracketing IPv6 hosts.
pub fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{DockerImageReference, ReferenceError, join_host_port, split_host_port};

    const DIGEST: &str = "sha256:958608f8ecc1dc62c93b6c610f3a834dae4220c9642e6e8b4e0f2b3ad7cbd238";

    #[test]
    fn test_parse_fully_qualified() {
        insta::assert_debug_snapshot!(
            DockerImageReference::parse("docker.io/library/busybox:latest").unwrap(),
            @r#"
        DockerImageReference {
            registry: "docker.io",
            namespace: "library",
            name: "busybox",
            tag: "latest",
            id: "",
        }
        "#
        );
    }

    #[test]
    fn test_parse_nested_namespace() {
        // Everything after the first namespace component is the name.
        insta::assert_debug_snapshot!(
            DockerImageReference::parse("quay.io/openshift/release/ocp:4.14").unwrap(),
            @r#"
        DockerImageReference {
            registry: "quay.io",
            namespace: "openshift",
            name: "release/ocp",
            tag: "4.14",
            id: "",
        }
        "#
        );
    }

    #[test]
    fn test_parse_vectors() {
        let vectors: &[(&str, (&str, &str, &str, &str, &str))] = &[
            ("busybox", ("", "", "busybox", "", "")),
            ("openshift/ruby-19-centos", ("", "openshift", "ruby-19-centos", "", "")),
            ("foo:bar", ("", "", "foo", "bar", "")),
            ("localhost/foo", ("localhost", "", "foo", "", "")),
            ("localhost:5000/foo/bar", ("localhost:5000", "foo", "bar", "", "")),
            ("example.com/repo", ("example.com", "", "repo", "", "")),
            ("example.com:443/repo", ("example.com:443", "", "repo", "", "")),
            ("[::1]:5000/repo:v1", ("[::1]:5000", "", "repo", "v1", "")),
            ("192.168.1.1/ns/img", ("192.168.1.1", "ns", "img", "", "")),
            ("a__b/c--d.e", ("", "a__b", "c--d.e", "", "")),
        ];

        for (spec, (registry, namespace, name, tag, id)) in vectors {
            let parsed = DockerImageReference::parse(spec).unwrap();
            assert_eq!(parsed.registry, *registry, "registry for {spec}");
            assert_eq!(parsed.namespace, *namespace, "namespace for {spec}");
            assert_eq!(parsed.name, *name, "name for {spec}");
            assert_eq!(parsed.tag, *tag, "tag for {spec}");
            assert_eq!(parsed.id, *id, "id for {spec}");
            assert_eq!(parsed.exact(), *spec);
        }

        let with_digest = DockerImageReference::parse(&format!("quay.io/a/b@{DIGEST}")).unwrap();
        assert_eq!(with_digest.id, DIGEST);
        assert!(with_digest.tag.is_empty());
        assert_eq!(with_digest.exact(), format!("quay.io/a/b@{DIGEST}"));
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(DockerImageReference::parse(""), Err(ReferenceError::Empty));
        assert_eq!(
            DockerImageReference::parse("Upper/case"),
            Err(ReferenceError::NameContainsUppercase)
        );
        assert_eq!(
            DockerImageReference::parse(&format!("foo:bar@{DIGEST}")),
            Err(ReferenceError::TagAndDigest)
        );
        assert_eq!(
            DockerImageReference::parse(&"a".repeat(256)),
            Err(ReferenceError::NameTooLong)
        );

        for spec in [
            "foo bar",
            "-leading/dash",
            "trailing-/dash",
            "foo::bar",
            "foo:",
            "foo@sha256:abc",
            "foo/",
            "/foo",
            "example.com:port/foo",
            "foo:-tag",
        ] {
            assert_eq!(
                DockerImageReference::parse(spec),
                Err(ReferenceError::InvalidFormat),
                "expected {spec:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_defaults() {
        let r = DockerImageReference::parse("busybox").unwrap();
        assert_eq!(r.docker_client_defaults().exact(), "docker.io/library/busybox:latest");
        assert_eq!(r.to_string(), "busybox");
        assert_eq!(
            DockerImageReference::parse("docker.io/busybox").unwrap().to_string(),
            "docker.io/library/busybox"
        );

        let r = DockerImageReference::parse("index.docker.io/library/busybox:latest").unwrap();
        assert_eq!(r.daemon_minimal().exact(), "docker.io/busybox");
        assert_eq!(r.as_v2().registry, "registry-1.docker.io");

        let r = DockerImageReference::parse(&format!("quay.io/a/b@{DIGEST}")).unwrap();
        // Digest references don't pick up a default tag.
        assert_eq!(r.docker_client_defaults().exact(), format!("quay.io/a/b@{DIGEST}"));
        assert_eq!(r.as_repository().exact(), "quay.io/a/b");
        assert_eq!(r.repository_name(), "a/b");
    }

    #[test]
    fn test_registry_host_port() {
        let vectors = [
            ("busybox", false, ("registry-1.docker.io", "443")),
            ("busybox", true, ("registry-1.docker.io", "80")),
            ("example.com/repo", false, ("example.com", "443")),
            ("example.com/repo", true, ("example.com", "80")),
            ("example.com:5000/repo", true, ("example.com", "5000")),
            ("[fd00::1]:5000/repo", false, ("fd00::1", "5000")),
            ("[fd00::1]/repo", true, ("fd00::1", "80")),
        ];

        for (spec, insecure, (host, port)) in vectors {
            let r = DockerImageReference::parse(spec).unwrap();
            assert_eq!(
                r.registry_host_port(insecure),
                (host.to_string(), port.to_string()),
                "failed for {spec} (insecure={insecure})"
            );
        }
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("example.com:80"), Some(("example.com", "80")));
        assert_eq!(split_host_port("example.com:"), Some(("example.com", "")));
        assert_eq!(split_host_port("[::1]:5000"), Some(("::1", "5000")));
        assert_eq!(split_host_port("example.com"), None);
        assert_eq!(split_host_port("[::1]"), None);
        assert_eq!(split_host_port("::1:5000"), None);
        assert_eq!(join_host_port("::1", "80"), "[::1]:80");
        assert_eq!(join_host_port("example.com", "443"), "example.com:443");
    }

    #[test]
    fn test_serde() {
        let r: DockerImageReference = serde_json::from_str(r#""quay.io/a/b:c""#).unwrap();
        assert_eq!(r.tag, "c");
        assert_eq!(serde_json::to_string(&r).unwrap(), r#""quay.io/a/b:c""#);
        assert!(serde_json::from_str::<DockerImageReference>(r#""NOPE""#).is_err());
    }

    fn pull_spec() -> impl Strategy<Value = String> {
        let registry = prop_oneof![
            Just(String::new()),
            "[a-z]{1,8}\\.(com|io|org)".prop_map(|r| format!("{r}/")),
            "localhost:[1-9][0-9]{1,3}".prop_map(|r| format!("{r}/")),
        ];
        let path = prop::collection::vec("[a-z0-9]{1,6}([._-][a-z0-9]{1,6})?", 1..4)
            .prop_map(|components| components.join("/"));
        let suffix = prop_oneof![
            Just(String::new()),
            "[A-Za-z0-9_][A-Za-z0-9_.-]{0,12}".prop_map(|tag| format!(":{tag}")),
            "[0-9a-f]{64}".prop_map(|hex| format!("@sha256:{hex}")),
        ];

        (registry, path, suffix).prop_map(|(registry, path, suffix)| {
            format!("{registry}{path}{suffix}")
        })
    }

    proptest! {
        #[test]
        fn test_exact_round_trips(spec in pull_spec()) {
            let parsed = DockerImageReference::parse(&spec).unwrap();
            let reparsed = DockerImageReference::parse(&parsed.exact()).unwrap();
            prop_assert_eq!(parsed, reparsed);
        }
    }
}
