//! Requests to import images from remote registries.

use serde::{Deserialize, Serialize};

use crate::{
    meta::{LocalObjectReference, ObjectMeta, ObjectReference},
    stream::{TagImportPolicy, TagReferencePolicy},
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageStreamImport {
    pub metadata: ObjectMeta,
    pub spec: ImageStreamImportSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageStreamImportSpec {
    /// Whether the results should be written back to the stream.
    pub import: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryImportSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageImportSpec>,
}

/// Imports every tag of a remote repository.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepositoryImportSpec {
    pub from: ObjectReference,
    pub import_policy: TagImportPolicy,
    pub reference_policy: TagReferencePolicy,
    pub include_manifest: bool,
}

/// Imports a single image, optionally into a named tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageImportSpec {
    pub from: ObjectReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<LocalObjectReference>,
    pub import_policy: TagImportPolicy,
    pub reference_policy: TagReferencePolicy,
    pub include_manifest: bool,
}
