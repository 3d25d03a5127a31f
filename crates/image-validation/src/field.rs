//! Structured, field-level validation errors.
//!
//! These mirror Kubernetes' `field.ErrorList`: every validator returns an
//! [`ErrorList`] describing all independent problems with an object,
//! rather than failing on the first one.

use std::fmt::{self, Display};

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A JSON-path-like location within an object, e.g. `spec.tags[latest].from`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Path(String);

impl Path {
    /// A path rooted at `name`. An empty root produces relative paths.
    pub fn new(name: &str) -> Self {
        Self(name.into())
    }

    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.into())
        } else {
            Self(format!("{}.{name}", self.0))
        }
    }

    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{index}]", self.0))
    }

    pub fn key(&self, key: &str) -> Self {
        Self(format!("{}[{key}]", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The class of a [`FieldError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrorType {
    #[serde(rename = "FieldValueNotFound")]
    NotFound,
    #[serde(rename = "FieldValueRequired")]
    Required,
    #[serde(rename = "FieldValueDuplicate")]
    Duplicate,
    #[serde(rename = "FieldValueInvalid")]
    Invalid,
    #[serde(rename = "FieldValueNotSupported")]
    NotSupported,
    #[serde(rename = "FieldValueForbidden")]
    Forbidden,
    #[serde(rename = "FieldValueTooLong")]
    TooLong,
    #[serde(rename = "InternalError")]
    Internal,
}

impl ErrorType {
    /// Whether the rendered error leaves out the offending value.
    fn omits_value(self) -> bool {
        matches!(
            self,
            Self::Required | Self::Forbidden | Self::TooLong | Self::Internal
        )
    }
}

impl Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotFound => "Not found",
            Self::Required => "Required value",
            Self::Duplicate => "Duplicate value",
            Self::Invalid => "Invalid value",
            Self::NotSupported => "Unsupported value",
            Self::Forbidden => "Forbidden",
            Self::TooLong => "Too long",
            Self::Internal => "Internal error",
        };
        f.write_str(msg)
    }
}

/// A single problem with a single field.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    #[serde(rename = "type")]
    pub type_: ErrorType,
    pub field: String,
    pub bad_value: Value,
    pub detail: String,
}

impl FieldError {
    fn new(type_: ErrorType, field: &Path, bad_value: Value, detail: impl Into<String>) -> Self {
        Self {
            type_,
            field: field.to_string(),
            bad_value,
            detail: detail.into(),
        }
    }

    pub fn required(field: &Path, detail: impl Into<String>) -> Self {
        Self::new(ErrorType::Required, field, Value::String(String::new()), detail)
    }

    pub fn invalid(field: &Path, value: impl Into<Value>, detail: impl Into<String>) -> Self {
        Self::new(ErrorType::Invalid, field, value.into(), detail)
    }

    pub fn not_supported(field: &Path, value: impl Into<Value>, supported: &[&str]) -> Self {
        let detail = if supported.is_empty() {
            String::new()
        } else {
            let quoted = supported
                .iter()
                .map(|s| format!("\"{s}\""))
                .collect::<Vec<_>>()
                .join(", ");
            format!("supported values: {quoted}")
        };
        Self::new(ErrorType::NotSupported, field, value.into(), detail)
    }

    pub fn forbidden(field: &Path, detail: impl Into<String>) -> Self {
        Self::new(ErrorType::Forbidden, field, Value::String(String::new()), detail)
    }

    pub fn too_long(field: &Path, value: impl Into<Value>, max: usize) -> Self {
        Self::new(
            ErrorType::TooLong,
            field,
            value.into(),
            format!("must have at most {max} bytes"),
        )
    }

    /// The message without the field prefix.
    pub fn body(&self) -> String {
        let mut body = self.type_.to_string();

        if !self.type_.omits_value() {
            body.push_str(": ");
            match &self.bad_value {
                Value::Null => body.push_str("\"null\""),
                value => body.push_str(&value.to_string()),
            }
        }

        if !self.detail.is_empty() {
            body.push_str(": ");
            body.push_str(&self.detail);
        }

        body
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.body())
    }
}

impl std::error::Error for FieldError {}

/// An ordered collection of [`FieldError`]s. Empty means valid.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorList(Vec<FieldError>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: FieldError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// Returns only the errors of the given type.
    pub fn filter_type(&self, type_: ErrorType) -> Self {
        self.iter().filter(|e| e.type_ == type_).cloned().collect()
    }

    /// Converts a non-empty list into the error an API server would
    /// return for the object.
    pub fn into_invalid(
        self,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<(), InvalidError> {
        if self.is_empty() {
            return Ok(());
        }

        Err(InvalidError {
            kind: kind.into(),
            name: name.into(),
            errors: self,
        })
    }
}

impl Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => Ok(()),
            [only] => write!(f, "{only}"),
            many => {
                let msgs = many.iter().map(|e| e.to_string()).collect::<Vec<_>>();
                write!(f, "[{}]", msgs.join(", "))
            }
        }
    }
}

impl FromIterator<FieldError> for ErrorList {
    fn from_iter<T: IntoIterator<Item = FieldError>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<FieldError> for ErrorList {
    fn extend<T: IntoIterator<Item = FieldError>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for ErrorList {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A rejected object, as an API server would report it.
#[derive(Debug, Error)]
#[error("{kind} \"{name}\" is invalid: {errors}")]
pub struct InvalidError {
    pub kind: String,
    pub name: String,
    pub errors: ErrorList,
}

impl InvalidError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorList, ErrorType, FieldError, Path};

    #[test]
    fn test_path() {
        let path = Path::new("spec")
            .child("tags")
            .key("latest")
            .child("from")
            .index(0);
        assert_eq!(path.to_string(), "spec.tags[latest].from[0]");

        assert_eq!(Path::new("").child("metadata").as_str(), "metadata");
    }

    #[test]
    fn test_field_error_display() {
        let path = Path::new("spec").child("dockerImageRepository");

        assert_eq!(
            FieldError::invalid(&path, "a:b", "the repository name may not contain a tag")
                .to_string(),
            r#"spec.dockerImageRepository: Invalid value: "a:b": the repository name may not contain a tag"#
        );
        assert_eq!(
            FieldError::required(&path, "").to_string(),
            "spec.dockerImageRepository: Required value"
        );
        assert_eq!(
            FieldError::forbidden(&path, "nope").to_string(),
            "spec.dockerImageRepository: Forbidden: nope"
        );
        assert_eq!(
            FieldError::not_supported(&path, "Remote", &["Source", "Local"]).to_string(),
            r#"spec.dockerImageRepository: Unsupported value: "Remote": supported values: "Source", "Local""#
        );
        assert_eq!(
            FieldError::invalid(&path, true, "bad").to_string(),
            "spec.dockerImageRepository: Invalid value: true: bad"
        );
    }

    #[test]
    fn test_error_list() {
        let path = Path::new("metadata");
        let mut errs = ErrorList::new();
        assert!(errs.is_empty());
        assert!(errs.clone().into_invalid("ImageStream", "ruby").is_ok());

        errs.push(FieldError::required(&path.child("name"), ""));
        assert_eq!(errs.to_string(), "metadata.name: Required value");

        errs.push(FieldError::forbidden(&path.child("namespace"), "not allowed"));
        assert_eq!(errs.len(), 2);
        assert_eq!(errs.filter_type(ErrorType::Forbidden).len(), 1);

        let err = errs.into_invalid("ImageStream", "ruby").unwrap_err();
        assert_eq!(err.status_code().as_u16(), 422);
        insta::assert_snapshot!(
            err,
            @r#"ImageStream "ruby" is invalid: [metadata.name: Required value, metadata.namespace: Forbidden: not allowed]"#
        );
    }

    #[test]
    fn test_error_list_json() {
        let errs: ErrorList = [FieldError::invalid(
            &Path::new("spec").child("x"),
            "y",
            "detail",
        )]
        .into_iter()
        .collect();

        insta::assert_snapshot!(
            serde_json::to_string(&errs).unwrap(),
            @r#"[{"type":"FieldValueInvalid","field":"spec.x","badValue":"y","detail":"detail"}]"#
        );
    }
}
