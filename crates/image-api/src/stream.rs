//! Image streams and their tags.
//!
//! Resources:
//! * [ImageStream](https://docs.openshift.com/container-platform/latest/rest_api/image_apis/imagestream-image-openshift-io-v1.html)
//! * [ImageStreamTag](https://docs.openshift.com/container-platform/latest/rest_api/image_apis/imagestreamtag-image-openshift-io-v1.html)
//! * [ImageTag](https://docs.openshift.com/container-platform/latest/rest_api/image_apis/imagetag-image-openshift-io-v1.html)

use std::fmt::{self, Display};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{INSECURE_REPOSITORY_ANNOTATION, image::Image, meta::ObjectMeta};

/// A named, mutable view over a set of images.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageStream {
    pub metadata: ObjectMeta,
    pub spec: ImageStreamSpec,
    pub status: ImageStreamStatus,
}

impl ImageStream {
    /// Returns whether the stream is annotated as pulling from an
    /// insecure repository.
    pub fn is_repository_insecure(&self) -> bool {
        self.metadata
            .annotations
            .get(INSECURE_REPOSITORY_ANNOTATION)
            .is_some_and(|v| v == "true")
    }

    /// Returns whether the spec tag named `tag` imports insecurely.
    pub fn is_tag_insecure(&self, tag: &str) -> bool {
        self.spec
            .tags
            .get(tag)
            .is_some_and(|t| t.import_policy.insecure)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageStreamSpec {
    pub lookup_policy: ImageLookupPolicy,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub docker_image_repository: String,
    /// Spec tags, keyed by tag name. Serialized as a list.
    #[serde(with = "spec_tags", skip_serializing_if = "IndexMap::is_empty")]
    pub tags: IndexMap<String, TagReference>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageStreamStatus {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub docker_image_repository: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub public_docker_image_repository: String,
    /// Tag history, keyed by tag name. Serialized as a list.
    #[serde(with = "status_tags", skip_serializing_if = "IndexMap::is_empty")]
    pub tags: IndexMap<String, TagEventList>,
}

/// Whether tags may be resolved by short name within the namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageLookupPolicy {
    pub local: bool,
}

/// A spec tag: where the tag's images come from and how they are imported.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagReference {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<IndexMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<crate::meta::ObjectReference>,
    pub reference: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
    pub import_policy: TagImportPolicy,
    pub reference_policy: TagReferencePolicy,
}

impl TagReference {
    /// Returns the pull spec of this tag if it points at a `DockerImage`.
    pub fn docker_image_pull_spec(&self) -> Option<&str> {
        self.from
            .as_ref()
            .filter(|from| from.is_docker_image())
            .map(|from| from.name.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagImportPolicy {
    pub insecure: bool,
    pub scheduled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub import_mode: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagReferencePolicy {
    #[serde(rename = "type")]
    pub type_: TagReferencePolicyType,
}

/// How pull specs for a tag are handed out to consumers.
///
/// Unknown values are preserved so validation can reject them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TagReferencePolicyType {
    /// Consumers pull from the image's source location.
    #[default]
    Source,
    /// Consumers pull through the integrated registry.
    Local,
    Other(String),
}

impl TagReferencePolicyType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Source => "Source",
            Self::Local => "Local",
            Self::Other(other) => other,
        }
    }
}

impl Display for TagReferencePolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TagReferencePolicyType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Source" => Self::Source,
            "Local" => Self::Local,
            _ => Self::Other(value),
        }
    }
}

impl From<TagReferencePolicyType> for String {
    fn from(value: TagReferencePolicyType) -> Self {
        match value {
            TagReferencePolicyType::Other(other) => other,
            known => known.as_str().into(),
        }
    }
}

/// One historical resolution of a tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    pub docker_image_reference: String,
    pub image: String,
    pub generation: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagEventCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub generation: i64,
}

/// The history of a single tag, newest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagEventList {
    pub items: Vec<TagEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<TagEventCondition>,
}

/// A [`TagEventList`] as it appears on the wire, carrying its tag name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedTagEventList {
    pub tag: String,
    pub items: Vec<TagEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<TagEventCondition>,
}

/// A single tag of an image stream, addressed as `<stream>:<tag>`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageStreamTag {
    pub metadata: ObjectMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<TagReference>,
    pub generation: i64,
    pub lookup_policy: ImageLookupPolicy,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<TagEventCondition>,
    pub image: Image,
}

/// The newer, spec/status shaped view of a single image stream tag.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageTag {
    pub metadata: ObjectMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<TagReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NamedTagEventList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
}

/// Splits an `<stream>:<tag>` name. Both halves must be non-empty.
pub fn split_image_stream_tag(name: &str) -> Option<(&str, &str)> {
    match name.split_once(':') {
        Some((stream, tag)) if !stream.is_empty() && !tag.is_empty() => Some((stream, tag)),
        _ => None,
    }
}

mod spec_tags {
    use super::*;

    pub(super) fn deserialize<'de, D>(de: D) -> Result<IndexMap<String, TagReference>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tags = Option::<Vec<TagReference>>::deserialize(de)?;

        let mut keyed = IndexMap::new();
        for tag in tags.unwrap_or_default() {
            if keyed.contains_key(&tag.name) {
                return Err(de::Error::custom(format!(
                    "duplicate spec tag {:?}",
                    tag.name
                )));
            }
            keyed.insert(tag.name.clone(), tag);
        }
        Ok(keyed)
    }

    pub(super) fn serialize<S>(
        tags: &IndexMap<String, TagReference>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(tags.values())
    }
}

mod status_tags {
    use super::*;

    pub(super) fn deserialize<'de, D>(de: D) -> Result<IndexMap<String, TagEventList>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tags = Option::<Vec<NamedTagEventList>>::deserialize(de)?;

        let mut keyed = IndexMap::new();
        for named in tags.unwrap_or_default() {
            let list = TagEventList {
                items: named.items,
                conditions: named.conditions,
            };
            if keyed.insert(named.tag.clone(), list).is_some() {
                return Err(de::Error::custom(format!(
                    "duplicate status tag {:?}",
                    named.tag
                )));
            }
        }
        Ok(keyed)
    }

    pub(super) fn serialize<S>(
        tags: &IndexMap<String, TagEventList>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(tags.iter().map(|(tag, list)| NamedTagEventList {
            tag: tag.clone(),
            items: list.items.clone(),
            conditions: list.conditions.clone(),
        }))
    }
}
