//! Validators for image resources.
//!
//! Every validator returns the complete [`ErrorList`] for its object.
//! Validators taking an `Option<&RegistryWhitelister>` skip registry
//! whitelisting entirely when given `None`.

use docker_reference::DockerImageReference;

use crate::{
    field::{ErrorList, FieldError, Path},
    whitelist::{RegistryWhitelister, WhitelistTransport},
};

mod image;
mod import;
mod stream;
mod tag;

pub use image::{validate_image, validate_image_signature, validate_image_update};
pub use import::{
    validate_image_stream_import, validate_image_stream_import_allowed_registries,
    validate_image_stream_import_disallowed_hosts,
};
pub use stream::{
    validate_image_stream, validate_image_stream_status_update,
    validate_image_stream_status_update_with_whitelister, validate_image_stream_update,
    validate_image_stream_update_with_whitelister, validate_image_stream_with_whitelister,
};
pub use tag::{
    validate_image_stream_tag, validate_image_stream_tag_reference,
    validate_image_stream_tag_update, validate_image_stream_tag_update_with_whitelister,
    validate_image_stream_tag_with_whitelister, validate_image_tag, validate_image_tag_update,
    validate_image_tag_update_with_whitelister, validate_image_tag_with_whitelister,
};

/// Parses `pull_spec`, recording an `Invalid` error on failure.
fn parse_reference(
    pull_spec: &str,
    path: &Path,
    errs: &mut ErrorList,
) -> Option<DockerImageReference> {
    match DockerImageReference::parse(pull_spec) {
        Ok(reference) => Some(reference),
        Err(err) => {
            errs.push(FieldError::invalid(path, pull_spec, err.to_string()));
            None
        }
    }
}

/// Runs `reference` through the whitelister, if any, recording a
/// `Forbidden` error when it is rejected.
fn admit_reference(
    whitelister: Option<&RegistryWhitelister>,
    reference: &DockerImageReference,
    insecure: bool,
    path: &Path,
    errs: &mut ErrorList,
) {
    let Some(whitelister) = whitelister else {
        return;
    };

    let transport = WhitelistTransport::for_insecure(insecure);
    if let Err(err) = whitelister.admit_docker_image_reference(reference, transport) {
        errs.push(FieldError::forbidden(path, err.to_string()));
    }
}

/// Returns a copy of `whitelister` with `pull_specs` grandfathered in.
///
/// Failures are only logged: a stored reference that no longer parses
/// must still be removable.
fn grandfather<'a>(
    whitelister: Option<&RegistryWhitelister>,
    pull_specs: impl IntoIterator<Item = &'a str>,
) -> Option<RegistryWhitelister> {
    whitelister.map(|whitelister| {
        let mut copy = whitelister.clone();
        copy.whitelist_pull_specs(pull_specs.into_iter().filter(|spec| !spec.is_empty()));
        copy
    })
}
