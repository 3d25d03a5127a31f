use image_api::{Image, ImageSignature};

use super::parse_reference;
use crate::{
    field::{ErrorList, FieldError, Path},
    meta::{validate_object_meta, validate_object_meta_update, validate_path_segment_name},
};

pub fn validate_image(image: &Image) -> ErrorList {
    let mut errs = validate_object_meta(
        &image.metadata,
        false,
        validate_path_segment_name,
        &Path::new("metadata"),
    );

    let path = Path::new("dockerImageReference");
    if image.docker_image_reference.is_empty() {
        errs.push(FieldError::required(&path, ""));
    } else {
        parse_reference(&image.docker_image_reference, &path, &mut errs);
    }

    for (i, signature) in image.signatures.iter().enumerate() {
        errs.extend(validate_image_signature(
            signature,
            &Path::new("signatures").index(i),
        ));
    }

    errs
}

pub fn validate_image_update(new: &Image, old: &Image) -> ErrorList {
    let mut errs =
        validate_object_meta_update(&new.metadata, &old.metadata, &Path::new("metadata"));
    errs.extend(validate_image(new));
    errs
}

/// Signatures are named `<image>@<signature>` and carry neither labels
/// nor annotations.
pub fn validate_image_signature(signature: &ImageSignature, path: &Path) -> ErrorList {
    let meta_path = path.child("metadata");
    let mut errs = validate_object_meta(
        &signature.metadata,
        false,
        validate_path_segment_name,
        &meta_path,
    );

    if !signature.metadata.labels.is_empty() {
        errs.push(FieldError::forbidden(
            &meta_path.child("labels"),
            "signature labels cannot be set",
        ));
    }
    if !signature.metadata.annotations.is_empty() {
        errs.push(FieldError::forbidden(
            &meta_path.child("annotations"),
            "signature annotations cannot be set",
        ));
    }

    let well_formed = matches!(
        signature.metadata.name.split('@').collect::<Vec<_>>().as_slice(),
        [image, sig] if !image.is_empty() && !sig.is_empty()
    );
    if !well_formed {
        errs.push(FieldError::invalid(
            &meta_path.child("name"),
            signature.metadata.name.as_str(),
            "name must be of format <imageName>@<signatureName>",
        ));
    }

    if signature.type_.is_empty() {
        errs.push(FieldError::required(&path.child("type"), ""));
    }
    if signature.content.is_empty() {
        errs.push(FieldError::required(&path.child("content"), ""));
    }

    errs
}
