use docker_reference::{DockerImageReference, join_host_port};
use image_api::{DOCKER_IMAGE_KIND, ImageStreamImport, ObjectReference};

use super::{parse_reference, tag::validate_import_mode};
use crate::{
    field::{ErrorList, FieldError, Path},
    hostguard::{HostPolicy, Resolver, should_contact_host},
    meta::{validate_image_stream_name, validate_object_meta},
    whitelist::{RegistryWhitelister, WhitelistTransport},
};

/// Every `DockerImage` entry of `isi`, with its `from` path and whether it
/// imports insecurely.
fn docker_image_sources(isi: &ImageStreamImport) -> Vec<(&ObjectReference, Path, bool)> {
    let spec_path = Path::new("spec");

    let images = isi.spec.images.iter().enumerate().map(|(i, image)| {
        (
            &image.from,
            spec_path.child("images").index(i).child("from"),
            image.import_policy.insecure,
        )
    });
    let repository = isi.spec.repository.iter().map(|repository| {
        (
            &repository.from,
            spec_path.child("repository").child("from"),
            repository.import_policy.insecure,
        )
    });

    images
        .chain(repository)
        .filter(|(from, _, _)| from.kind == DOCKER_IMAGE_KIND)
        .collect()
}

/// Checks `from` is a `DockerImage` with a parsable name.
fn validate_from(
    from: &ObjectReference,
    path: &Path,
    errs: &mut ErrorList,
) -> Option<DockerImageReference> {
    if from.kind != DOCKER_IMAGE_KIND {
        errs.push(FieldError::invalid(
            &path.child("kind"),
            from.kind.as_str(),
            "only DockerImage is supported",
        ));
        return None;
    }

    let name_path = path.child("name");
    if from.name.is_empty() {
        errs.push(FieldError::required(&name_path, ""));
        return None;
    }

    parse_reference(&from.name, &name_path, errs)
}

pub fn validate_image_stream_import(isi: &ImageStreamImport) -> ErrorList {
    let spec_path = Path::new("spec");
    let mut errs = ErrorList::new();

    for (i, image) in isi.spec.images.iter().enumerate() {
        let path = spec_path.child("images").index(i);

        if let Some(reference) = validate_from(&image.from, &path.child("from"), &mut errs)
            && !reference.id.is_empty()
            && image.import_policy.scheduled
        {
            errs.push(FieldError::invalid(
                &path.child("importPolicy").child("scheduled"),
                true,
                "only tags can be scheduled for import",
            ));
        }

        if let Some(to) = &image.to
            && to.name.is_empty()
        {
            errs.push(FieldError::required(&path.child("to").child("name"), ""));
        }

        errs.extend(validate_import_mode(
            &image.import_policy.import_mode,
            &path.child("importPolicy").child("importMode"),
        ));
    }

    if let Some(repository) = &isi.spec.repository {
        let path = spec_path.child("repository");
        let from_path = path.child("from");

        if let Some(reference) = validate_from(&repository.from, &from_path, &mut errs)
            && (!reference.tag.is_empty() || !reference.id.is_empty())
        {
            errs.push(FieldError::invalid(
                &from_path.child("name"),
                repository.from.name.as_str(),
                "you must specify an image repository, not a tag or ID",
            ));
        }

        errs.extend(validate_import_mode(
            &repository.import_policy.import_mode,
            &path.child("importPolicy").child("importMode"),
        ));
    }

    if isi.spec.images.is_empty() && isi.spec.repository.is_none() {
        errs.push(FieldError::invalid(
            &spec_path.child("images"),
            serde_json::Value::Null,
            "you must specify at least one image or a repository import",
        ));
    }

    errs.extend(validate_object_meta(
        &isi.metadata,
        true,
        validate_image_stream_name,
        &Path::new("metadata"),
    ));

    errs
}

/// Checks the registry of every import source against `whitelister`.
///
/// The registry is admitted as a `host:port` pair before any image is
/// pulled from it. Sources that don't parse are left to
/// [`validate_image_stream_import`].
pub fn validate_image_stream_import_allowed_registries(
    whitelister: Option<&RegistryWhitelister>,
    isi: &ImageStreamImport,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(whitelister) = whitelister else {
        return errs;
    };

    for (from, path, insecure) in docker_image_sources(isi) {
        let Ok(reference) = DockerImageReference::parse(&from.name) else {
            continue;
        };

        let (host, port) = reference.registry_host_port(insecure);
        if let Err(err) = whitelister.admit_hostname(
            &join_host_port(&host, &port),
            WhitelistTransport::for_insecure(insecure),
        ) {
            errs.push(FieldError::forbidden(&path.child("name"), err.to_string()));
        }
    }

    errs
}

/// Checks every registry `isi` would contact against `policy`.
///
/// Entries that aren't `DockerImage` references or don't parse are left to
/// [`validate_image_stream_import`]. References without a registry resolve
/// to Docker Hub and are not checked.
pub async fn validate_image_stream_import_disallowed_hosts(
    isi: &ImageStreamImport,
    policy: &HostPolicy,
    resolver: &dyn Resolver,
) -> ErrorList {
    let mut errs = ErrorList::new();
    for (from, path, _) in docker_image_sources(isi) {
        let Ok(reference) = DockerImageReference::parse(&from.name) else {
            continue;
        };

        if let Err(err) = should_contact_host(&reference.registry, policy, resolver).await {
            tracing::debug!("import of {} refused: {err}", from.name);
            errs.push(FieldError::forbidden(&path.child("name"), err.to_string()));
        }
    }

    errs
}
