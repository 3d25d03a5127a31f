use docker_reference::NAME_TOTAL_LENGTH_MAX;
use image_api::ImageStream;

use super::{
    admit_reference, grandfather, parse_reference, tag::validate_image_stream_tag_reference,
};
use crate::{
    field::{ErrorList, FieldError, Path},
    meta::{validate_image_stream_name, validate_object_meta, validate_object_meta_update},
    whitelist::RegistryWhitelister,
};

pub fn validate_image_stream(stream: &ImageStream) -> ErrorList {
    validate_image_stream_with_whitelister(None, stream)
}

pub fn validate_image_stream_with_whitelister(
    whitelister: Option<&RegistryWhitelister>,
    stream: &ImageStream,
) -> ErrorList {
    let meta_path = Path::new("metadata");
    let mut errs = validate_object_meta(
        &stream.metadata,
        true,
        validate_image_stream_name,
        &meta_path,
    );

    // The stream must be addressable as a repository in the cluster registry.
    let repository = format!("{}/{}", stream.metadata.namespace, stream.metadata.name);
    if repository.len() > NAME_TOTAL_LENGTH_MAX {
        errs.push(FieldError::invalid(
            &meta_path.child("name"),
            stream.metadata.name.as_str(),
            format!("'namespace/name' cannot be longer than {NAME_TOTAL_LENGTH_MAX} characters"),
        ));
    }

    let insecure_repository = stream.is_repository_insecure();

    if !stream.spec.docker_image_repository.is_empty() {
        let path = Path::new("spec").child("dockerImageRepository");
        let repo = stream.spec.docker_image_repository.as_str();

        if let Some(reference) = parse_reference(repo, &path, &mut errs) {
            if !reference.tag.is_empty() {
                errs.push(FieldError::invalid(
                    &path,
                    repo,
                    "the repository name may not contain a tag",
                ));
            }
            if !reference.id.is_empty() {
                errs.push(FieldError::invalid(
                    &path,
                    repo,
                    "the repository name may not contain an ID",
                ));
            }
            admit_reference(
                whitelister,
                &reference,
                insecure_repository,
                &path,
                &mut errs,
            );
        }
    }

    let tags_path = Path::new("spec").child("tags");
    for (tag, tag_ref) in &stream.spec.tags {
        errs.extend(validate_image_stream_tag_reference(
            whitelister,
            insecure_repository,
            tag_ref,
            &tags_path.key(tag),
        ));
    }

    let status_path = Path::new("status").child("tags");
    for (tag, history) in &stream.status.tags {
        let insecure = insecure_repository || stream.is_tag_insecure(tag);

        for (i, event) in history.items.iter().enumerate() {
            let path = status_path
                .key(tag)
                .child("items")
                .index(i)
                .child("dockerImageReference");

            let pull_spec = event.docker_image_reference.as_str();
            if pull_spec.is_empty() {
                errs.push(FieldError::required(&path, ""));
                continue;
            }

            if let Some(reference) = parse_reference(pull_spec, &path, &mut errs) {
                admit_reference(whitelister, &reference, insecure, &path, &mut errs);
            }
        }
    }

    errs
}

pub fn validate_image_stream_update(new: &ImageStream, old: &ImageStream) -> ErrorList {
    validate_image_stream_update_with_whitelister(None, new, old)
}

/// Validates an update of an image stream.
///
/// References already stored on `old` are grandfathered: they remain
/// valid even when the whitelist no longer admits them, so that they can
/// be kept or removed. New references are validated as on creation.
pub fn validate_image_stream_update_with_whitelister(
    whitelister: Option<&RegistryWhitelister>,
    new: &ImageStream,
    old: &ImageStream,
) -> ErrorList {
    let mut errs =
        validate_object_meta_update(&new.metadata, &old.metadata, &Path::new("metadata"));

    let stored = std::iter::once(old.spec.docker_image_repository.as_str())
        .chain(
            old.spec
                .tags
                .values()
                .filter_map(|tag_ref| tag_ref.docker_image_pull_spec()),
        )
        .chain(
            old.status
                .tags
                .values()
                .flat_map(|history| &history.items)
                .map(|event| event.docker_image_reference.as_str()),
        );
    let whitelister = grandfather(whitelister, stored);

    errs.extend(validate_image_stream_with_whitelister(whitelister.as_ref(), new));

    errs
}

pub fn validate_image_stream_status_update(new: &ImageStream, old: &ImageStream) -> ErrorList {
    validate_image_stream_status_update_with_whitelister(None, new, old)
}

/// Validates a status-only update of an image stream.
///
/// Tag events whose reference already appears in the same tag's history
/// on `old` are not checked again.
pub fn validate_image_stream_status_update_with_whitelister(
    whitelister: Option<&RegistryWhitelister>,
    new: &ImageStream,
    old: &ImageStream,
) -> ErrorList {
    let mut errs =
        validate_object_meta_update(&new.metadata, &old.metadata, &Path::new("metadata"));

    let insecure_repository = new.is_repository_insecure();
    let status_path = Path::new("status").child("tags");

    for (tag, history) in &new.status.tags {
        let old_history = old.status.tags.get(tag);
        let insecure = insecure_repository || new.is_tag_insecure(tag);

        for (i, event) in history.items.iter().enumerate() {
            let pull_spec = event.docker_image_reference.as_str();
            let unchanged = old_history.is_some_and(|old_history| {
                old_history
                    .items
                    .iter()
                    .any(|old_event| old_event.docker_image_reference == pull_spec)
            });
            if unchanged {
                continue;
            }

            let path = status_path
                .key(tag)
                .child("items")
                .index(i)
                .child("dockerImageReference");

            if pull_spec.is_empty() {
                errs.push(FieldError::required(&path, ""));
                continue;
            }

            if let Some(reference) = parse_reference(pull_spec, &path, &mut errs) {
                admit_reference(whitelister, &reference, insecure, &path, &mut errs);
            }
        }
    }

    errs
}
