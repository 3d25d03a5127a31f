//! Validation of OpenShift image resources.
//!
//! The pieces are usable independently:
//!
//! * [`field`]: Kubernetes-style field errors, the output of every validator.
//! * [`whitelist`]: which registries image references may point at.
//! * [`hostguard`]: which hosts may actually be contacted during imports.
//! * [`transport`]: an HTTP client that enforces the host guard.
//! * [`validation`]: validators for images, streams, tags and imports.

pub mod field;
pub mod hostguard;
pub mod meta;
pub mod transport;
pub mod validation;
pub mod whitelist;

pub use field::{ErrorList, ErrorType, FieldError, InvalidError, Path};
pub use hostguard::{
    HostError, HostPolicy, ResolveError, Resolver, StaticResolver, SystemResolver,
};
pub use whitelist::{
    AllowedRegistries, RegistryHostnames, RegistryLocation, RegistryWhitelister,
    WhitelistError, WhitelistTransport,
};
