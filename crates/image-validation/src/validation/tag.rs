use image_api::{
    DOCKER_IMAGE_KIND, IMAGE_STREAM_IMAGE_KIND, IMAGE_STREAM_TAG_KIND, IMPORT_MODE_LEGACY,
    IMPORT_MODE_PRESERVE_ORIGINAL, ImageStreamTag, ImageTag, ObjectMeta, TagReference,
    TagReferencePolicyType, split_image_stream_tag,
};

use super::{admit_reference, grandfather, parse_reference};
use crate::{
    field::{ErrorList, FieldError, Path},
    meta::{validate_object_meta, validate_object_meta_update, validate_path_segment_name},
    whitelist::RegistryWhitelister,
};

/// Validates a single spec tag.
///
/// Only `DockerImage` references are whitelisted; references to other
/// tags or images within the cluster are exempt. A `Local` reference
/// policy does not change which checks are made.
pub fn validate_image_stream_tag_reference(
    whitelister: Option<&RegistryWhitelister>,
    insecure_repository: bool,
    tag_ref: &TagReference,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();

    if let Some(from) = &tag_ref.from {
        let name_path = path.child("from").child("name");
        if from.name.is_empty() {
            errs.push(FieldError::required(&name_path, ""));
        }

        match from.kind.as_str() {
            DOCKER_IMAGE_KIND => {
                if !from.name.is_empty()
                    && let Some(reference) = parse_reference(&from.name, &name_path, &mut errs)
                {
                    admit_reference(
                        whitelister,
                        &reference,
                        tag_ref.import_policy.insecure || insecure_repository,
                        &name_path,
                        &mut errs,
                    );
                }
            }
            IMAGE_STREAM_IMAGE_KIND | IMAGE_STREAM_TAG_KIND => {
                if tag_ref.import_policy.scheduled {
                    errs.push(FieldError::invalid(
                        &path.child("importPolicy").child("scheduled"),
                        true,
                        "only tags pointing to Docker repositories may be scheduled for background import",
                    ));
                }
            }
            _ => errs.push(FieldError::required(
                &path.child("from").child("kind"),
                "valid values are 'DockerImage', 'ImageStreamImage', 'ImageStreamTag'",
            )),
        }
    }

    let policy = &tag_ref.reference_policy.type_;
    if let TagReferencePolicyType::Other(other) = policy {
        errs.push(FieldError::not_supported(
            &path.child("referencePolicy").child("type"),
            other.as_str(),
            &[
                TagReferencePolicyType::Source.as_str(),
                TagReferencePolicyType::Local.as_str(),
            ],
        ));
    }

    errs.extend(validate_import_mode(
        &tag_ref.import_policy.import_mode,
        &path.child("importPolicy").child("importMode"),
    ));

    errs
}

pub(super) fn validate_import_mode(mode: &str, path: &Path) -> ErrorList {
    match mode {
        "" | IMPORT_MODE_LEGACY | IMPORT_MODE_PRESERVE_ORIGINAL => ErrorList::new(),
        other => [FieldError::not_supported(
            path,
            other,
            &[IMPORT_MODE_LEGACY, IMPORT_MODE_PRESERVE_ORIGINAL],
        )]
        .into_iter()
        .collect(),
    }
}

pub fn validate_image_stream_tag(ist: &ImageStreamTag) -> ErrorList {
    validate_image_stream_tag_with_whitelister(None, ist)
}

pub fn validate_image_stream_tag_with_whitelister(
    whitelister: Option<&RegistryWhitelister>,
    ist: &ImageStreamTag,
) -> ErrorList {
    let mut errs = validate_tag_meta(&ist.metadata);

    if let Some(tag) = &ist.tag {
        let path = Path::new("tag");
        errs.extend(validate_tag_body(whitelister, tag, &ist.metadata, &path));
    }

    errs
}

pub fn validate_image_stream_tag_update(new: &ImageStreamTag, old: &ImageStreamTag) -> ErrorList {
    validate_image_stream_tag_update_with_whitelister(None, new, old)
}

/// Only the tag and the annotations of an image stream tag may change.
pub fn validate_image_stream_tag_update_with_whitelister(
    whitelister: Option<&RegistryWhitelister>,
    new: &ImageStreamTag,
    old: &ImageStreamTag,
) -> ErrorList {
    let mut errs =
        validate_object_meta_update(&new.metadata, &old.metadata, &Path::new("metadata"));

    if let Some(tag) = &new.tag {
        let whitelister = grandfather(
            whitelister,
            old.tag.as_ref().and_then(|t| t.docker_image_pull_spec()),
        );
        let path = Path::new("tag");
        errs.extend(validate_tag_body(whitelister.as_ref(), tag, &new.metadata, &path));
    }

    let strip = |ist: &ImageStreamTag| ImageStreamTag {
        metadata: ObjectMeta {
            annotations: Default::default(),
            ..ist.metadata.clone()
        },
        tag: None,
        generation: 0,
        lookup_policy: Default::default(),
        ..ist.clone()
    };
    if strip(new) != strip(old) {
        errs.push(FieldError::invalid(
            &Path::new("metadata"),
            "",
            "may not update fields other than metadata.annotations",
        ));
    }

    errs
}

pub fn validate_image_tag(itag: &ImageTag) -> ErrorList {
    validate_image_tag_with_whitelister(None, itag)
}

pub fn validate_image_tag_with_whitelister(
    whitelister: Option<&RegistryWhitelister>,
    itag: &ImageTag,
) -> ErrorList {
    let mut errs = validate_tag_meta(&itag.metadata);

    if let Some(spec) = &itag.spec {
        errs.extend(validate_image_tag_spec(whitelister, itag, spec));
    }

    errs
}

pub fn validate_image_tag_update(new: &ImageTag, old: &ImageTag) -> ErrorList {
    validate_image_tag_update_with_whitelister(None, new, old)
}

/// Only the spec and the annotations of an image tag may change.
pub fn validate_image_tag_update_with_whitelister(
    whitelister: Option<&RegistryWhitelister>,
    new: &ImageTag,
    old: &ImageTag,
) -> ErrorList {
    let mut errs =
        validate_object_meta_update(&new.metadata, &old.metadata, &Path::new("metadata"));

    if let Some(spec) = &new.spec {
        let whitelister = grandfather(
            whitelister,
            old.spec.as_ref().and_then(|t| t.docker_image_pull_spec()),
        );
        errs.extend(validate_image_tag_spec(whitelister.as_ref(), new, spec));
    }

    // Status and image are owned by the server.
    let strip = |itag: &ImageTag| ImageTag {
        metadata: ObjectMeta {
            annotations: Default::default(),
            ..itag.metadata.clone()
        },
        spec: None,
        status: None,
        image: None,
    };
    if strip(new) != strip(old) {
        errs.push(FieldError::invalid(
            &Path::new("metadata"),
            "",
            "may not update fields other than metadata.annotations",
        ));
    }

    errs
}

fn validate_image_tag_spec(
    whitelister: Option<&RegistryWhitelister>,
    itag: &ImageTag,
    spec: &TagReference,
) -> ErrorList {
    let path = Path::new("spec");
    let mut errs = validate_tag_body(whitelister, spec, &itag.metadata, &path);

    if let Some((_, tag)) = split_image_stream_tag(&itag.metadata.name)
        && spec.name != tag
    {
        errs.push(FieldError::invalid(
            &path.child("name"),
            spec.name.as_str(),
            "must match the tag portion of metadata.name",
        ));
    }

    errs
}

/// Tag objects are named `<stream>:<tag>`.
fn validate_tag_meta(meta: &ObjectMeta) -> ErrorList {
    let path = Path::new("metadata");
    let mut errs = validate_object_meta(meta, true, validate_path_segment_name, &path);

    if !meta.name.is_empty() && split_image_stream_tag(&meta.name).is_none() {
        errs.push(FieldError::invalid(
            &path.child("name"),
            meta.name.as_str(),
            "must be of the form <stream_name>:<tag>",
        ));
    }

    errs
}

/// The tag reference itself, plus its annotations, which when set
/// must mirror the object's own.
fn validate_tag_body(
    whitelister: Option<&RegistryWhitelister>,
    tag: &TagReference,
    meta: &ObjectMeta,
    path: &Path,
) -> ErrorList {
    let mut errs = validate_image_stream_tag_reference(whitelister, false, tag, path);

    if let Some(annotations) = &tag.annotations
        && *annotations != meta.annotations
    {
        errs.push(FieldError::invalid(
            &path.child("annotations"),
            serde_json::to_value(annotations).unwrap_or_default(),
            "tag annotations must not be provided or must be equal to the object meta annotations",
        ));
    }

    errs
}
