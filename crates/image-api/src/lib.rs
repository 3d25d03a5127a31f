//! Data models for OpenShift image resources.
//!
//! These models cover the `image.openshift.io` resources that carry
//! image pull specs: [`ImageStream`], [`ImageStreamTag`], [`ImageTag`],
//! [`ImageStreamImport`] and [`Image`]. They deserialize from the
//! external (YAML or JSON) API representation, with tag lists folded into
//! ordered maps keyed by tag name.

use serde::{Deserialize, Serialize};

pub mod image;
pub mod import;
pub mod meta;
pub mod stream;

pub use image::{Image, ImageSignature};
pub use import::{ImageImportSpec, ImageStreamImport, ImageStreamImportSpec, RepositoryImportSpec};
pub use meta::{LocalObjectReference, ObjectMeta, ObjectReference};
pub use stream::{
    ImageLookupPolicy, ImageStream, ImageStreamSpec, ImageStreamStatus, ImageStreamTag, ImageTag,
    NamedTagEventList, TagEvent, TagEventCondition, TagEventList, TagImportPolicy, TagReference,
    TagReferencePolicy, TagReferencePolicyType, split_image_stream_tag,
};

/// Annotation marking an image stream's repository as insecure.
pub const INSECURE_REPOSITORY_ANNOTATION: &str = "openshift.io/image.insecureRepository";

/// A tag pointing directly at a pull spec.
pub const DOCKER_IMAGE_KIND: &str = "DockerImage";
/// A tag pointing at another tag of a stream.
pub const IMAGE_STREAM_TAG_KIND: &str = "ImageStreamTag";
/// A tag pointing at an image within a stream.
pub const IMAGE_STREAM_IMAGE_KIND: &str = "ImageStreamImage";

/// Import only the manifest of the requested platform.
pub const IMPORT_MODE_LEGACY: &str = "Legacy";
/// Import the manifest list as-is.
pub const IMPORT_MODE_PRESERVE_ORIGINAL: &str = "PreserveOriginal";

/// Any of the image resources, tagged by `kind`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Object {
    Image(Image),
    ImageStream(ImageStream),
    ImageStreamTag(ImageStreamTag),
    ImageTag(ImageTag),
    ImageStreamImport(ImageStreamImport),
}

impl Object {
    /// Load a single object from YAML (or JSON, which is a subset).
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Object::Image(_) => "Image",
            Object::ImageStream(_) => "ImageStream",
            Object::ImageStreamTag(_) => "ImageStreamTag",
            Object::ImageTag(_) => "ImageTag",
            Object::ImageStreamImport(_) => "ImageStreamImport",
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Object::Image(image) => &image.metadata,
            Object::ImageStream(stream) => &stream.metadata,
            Object::ImageStreamTag(ist) => &ist.metadata,
            Object::ImageTag(itag) => &itag.metadata,
            Object::ImageStreamImport(isi) => &isi.metadata,
        }
    }
}
