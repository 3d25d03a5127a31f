//! Images and their signatures.

use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

/// An immutable image, identified by its digest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Image {
    pub metadata: ObjectMeta,
    pub docker_image_reference: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub docker_image_manifest_media_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<ImageSignature>,
}

/// A signature attached to an image. Its name is `<image>@<signature>`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSignature {
    pub metadata: ObjectMeta,
    #[serde(rename = "type")]
    pub type_: String,
    /// Base64 encoded signature blob.
    pub content: String,
}
