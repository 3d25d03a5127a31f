use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use image_validation::{
    AllowedRegistries, HostPolicy, RegistryHostnames, RegistryWhitelister, WhitelistError,
};
use ipnet::IpNet;
use serde::Deserialize;
use thiserror::Error;

use crate::App;

const CONFIG_CANDIDATES: &[&str] = &[
    ".imageguard.yml",
    ".imageguard.yaml",
    "imageguard.yml",
    "imageguard.yaml",
];

#[derive(Error, Debug)]
#[error("configuration error in {path}")]
pub(crate) struct ConfigError {
    /// The path to the configuration file that caused this error.
    path: String,
    /// The source of this error.
    #[source]
    pub(crate) source: ConfigErrorInner,
}

#[derive(Error, Debug)]
pub(crate) enum ConfigErrorInner {
    /// An I/O error occurred while loading the config.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is syntactically invalid.
    #[error("invalid configuration syntax")]
    Syntax(#[source] serde_yaml::Error),

    /// An `allowed-registries-for-import` entry couldn't be used.
    #[error("invalid `allowed-registries-for-import` entry")]
    Whitelist(#[from] WhitelistError),
}

/// The configuration file, as written.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    /// Absent allows every registry; present but empty allows none.
    allowed_registries_for_import: Option<AllowedRegistries>,
    internal_registry_hostname: Option<String>,
    external_registry_hostname: Option<String>,
    #[serde(default)]
    blocked_import_cidrs: Vec<IpNet>,
    #[serde(default)]
    allowed_import_cidrs: Vec<IpNet>,
}

impl RawConfig {
    fn load(contents: &str) -> Result<Self, ConfigErrorInner> {
        // An empty file is a valid, empty config.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(contents).map_err(ConfigErrorInner::Syntax)
    }
}

/// imageguard's configuration.
///
/// The whitelister and host policy are built up front, so that a bad
/// whitelist entry fails the run before any input is validated.
#[derive(Clone, Debug, Default)]
pub(crate) struct Config {
    /// `None` disables registry whitelisting.
    pub(crate) whitelister: Option<RegistryWhitelister>,
    pub(crate) host_policy: HostPolicy,
}

impl Config {
    fn load(contents: &str) -> Result<Self, ConfigErrorInner> {
        let raw = RawConfig::load(contents)?;

        let whitelister = raw
            .allowed_registries_for_import
            .map(|allowed| {
                RegistryWhitelister::new(
                    &allowed,
                    RegistryHostnames {
                        internal: raw.internal_registry_hostname,
                        external: raw.external_registry_hostname,
                    },
                )
            })
            .transpose()?;

        Ok(Self {
            whitelister,
            host_policy: HostPolicy {
                blocked: raw.blocked_import_cidrs,
                allowed: raw.allowed_import_cidrs,
            },
        })
    }

    fn load_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        tracing::debug!("loading config from `{path}`");

        fs::read_to_string(path)
            .map_err(ConfigErrorInner::Io)
            .and_then(|contents| Self::load(&contents))
            .map_err(|source| ConfigError {
                path: path.to_string(),
                source,
            })
    }

    /// Loads the [`Config`] for the given [`App`].
    ///
    /// `--no-config` disables config loading, `--config <file>` loads
    /// that file, and otherwise a config is discovered starting from the
    /// current directory. No config at all means the default config.
    pub(crate) fn new(app: &App) -> Result<Self, ConfigError> {
        if app.no_config {
            tracing::debug!("skipping config discovery: explicitly disabled");
            return Ok(Self::default());
        }

        if let Some(path) = &app.config {
            return Self::load_file(path);
        }

        let cwd = std::env::current_dir()
            .map_err(ConfigErrorInner::Io)
            .and_then(|cwd| {
                Utf8PathBuf::try_from(cwd).map_err(|e| ConfigErrorInner::Io(e.into_io_error()))
            })
            .map_err(|source| ConfigError {
                path: ".".into(),
                source,
            })?;

        match Self::discover(&cwd).map_err(|source| ConfigError {
            path: cwd.to_string(),
            source,
        })? {
            Some(path) => Self::load_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Finds the nearest config file at or above `dir`.
    ///
    /// The search stops at the filesystem root or at the first directory
    /// containing `.git`.
    fn discover(dir: &Utf8Path) -> Result<Option<Utf8PathBuf>, ConfigErrorInner> {
        let canonical = dir.canonicalize_utf8()?;
        let mut candidate_path = canonical.as_path();

        loop {
            for candidate in CONFIG_CANDIDATES {
                let path = candidate_path.join(candidate);
                if path.is_file() {
                    tracing::debug!("found config candidate at `{path}`");
                    return Ok(Some(path));
                }
            }

            if candidate_path.join(".git").is_dir() {
                tracing::debug!("found `{candidate_path}/.git`, stopping search");
                return Ok(None);
            }

            let Some(parent) = candidate_path.parent() else {
                tracing::debug!("reached filesystem root without finding a config");
                return Ok(None);
            };

            candidate_path = parent;
        }
    }
}
