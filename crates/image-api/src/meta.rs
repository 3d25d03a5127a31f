//! Object metadata and references shared by every image resource.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kubernetes object metadata, restricted to the fields validation reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub generate_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub generation: i64,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, String>,
}

/// A reference to another object, e.g. the `from` of a tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl ObjectReference {
    /// A `DockerImage` reference to the given pull spec.
    pub fn docker_image(pull_spec: impl Into<String>) -> Self {
        Self {
            kind: crate::DOCKER_IMAGE_KIND.into(),
            name: pull_spec.into(),
            ..Default::default()
        }
    }

    pub fn is_docker_image(&self) -> bool {
        self.kind == crate::DOCKER_IMAGE_KIND
    }
}

/// A reference to an object in the same namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalObjectReference {
    pub name: String,
}

pub(crate) fn is_zero(n: &i64) -> bool {
    *n == 0
}
