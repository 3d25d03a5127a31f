//! Object metadata validation, following the Kubernetes API conventions.

use std::sync::LazyLock;

use docker_reference::{NAME_COMPONENT_PATTERN, is_repository_name_component};
use image_api::ObjectMeta;
use indexmap::IndexMap;
use regex::Regex;

use crate::field::{ErrorList, FieldError, Path};

/// Validates an object name, returning the reasons it is unacceptable.
/// `prefix` is set when validating a `generateName` prefix.
pub type NameValidator = fn(&str, bool) -> Vec<String>;

const DNS1123_LABEL_MAX_LENGTH: usize = 63;
const DNS1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const QUALIFIED_NAME_MAX_LENGTH: usize = 63;
const LABEL_VALUE_MAX_LENGTH: usize = 63;
const TOTAL_ANNOTATION_SIZE_LIMIT: usize = 256 * 1024;

static DNS1123_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("invalid DNS-1123 label pattern")
});

static DNS1123_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("invalid DNS-1123 subdomain pattern")
});

static QUALIFIED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$")
        .expect("invalid qualified name pattern")
});

static LABEL_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])?$")
        .expect("invalid label value pattern")
});

/// Validates `meta` for an object being created.
pub fn validate_object_meta(
    meta: &ObjectMeta,
    namespaced: bool,
    name_fn: NameValidator,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();

    if !meta.generate_name.is_empty() {
        for msg in name_fn(&meta.generate_name, true) {
            errs.push(FieldError::invalid(
                &path.child("generateName"),
                meta.generate_name.as_str(),
                msg,
            ));
        }
    }

    if meta.name.is_empty() {
        if meta.generate_name.is_empty() {
            errs.push(FieldError::required(
                &path.child("name"),
                "name or generateName is required",
            ));
        }
    } else {
        for msg in name_fn(&meta.name, false) {
            errs.push(FieldError::invalid(
                &path.child("name"),
                meta.name.as_str(),
                msg,
            ));
        }
    }

    if namespaced {
        if meta.namespace.is_empty() {
            errs.push(FieldError::required(&path.child("namespace"), ""));
        } else {
            for msg in validate_dns1123_label(&meta.namespace) {
                errs.push(FieldError::invalid(
                    &path.child("namespace"),
                    meta.namespace.as_str(),
                    msg,
                ));
            }
        }
    } else if !meta.namespace.is_empty() {
        errs.push(FieldError::forbidden(
            &path.child("namespace"),
            "not allowed on this type",
        ));
    }

    if meta.generation < 0 {
        errs.push(FieldError::invalid(
            &path.child("generation"),
            meta.generation,
            "must be greater than or equal to 0",
        ));
    }

    errs.extend(validate_labels(&meta.labels, &path.child("labels")));
    errs.extend(validate_annotations(
        &meta.annotations,
        &path.child("annotations"),
    ));

    errs
}

/// Validates `new` as an update of `old`: identity fields are immutable.
pub fn validate_object_meta_update(new: &ObjectMeta, old: &ObjectMeta, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();

    let immutable = [
        ("name", &new.name, &old.name),
        ("namespace", &new.namespace, &old.namespace),
        ("uid", &new.uid, &old.uid),
    ];
    for (field, new_value, old_value) in immutable {
        if new_value != old_value {
            errs.push(FieldError::invalid(
                &path.child(field),
                new_value.as_str(),
                "field is immutable",
            ));
        }
    }

    if new.generation < old.generation {
        errs.push(FieldError::invalid(
            &path.child("generation"),
            new.generation,
            "must not be decremented",
        ));
    }

    errs.extend(validate_labels(&new.labels, &path.child("labels")));
    errs.extend(validate_annotations(
        &new.annotations,
        &path.child("annotations"),
    ));

    errs
}

/// Names that must be usable as a single URL path segment.
pub fn validate_path_segment_name(name: &str, prefix: bool) -> Vec<String> {
    let mut reasons = vec![];

    if !prefix {
        match name {
            "." => reasons.push("may not be '.'".to_string()),
            ".." => reasons.push("may not be '..'".to_string()),
            _ => {}
        }
    }

    for illegal in ['/', '%'] {
        if name.contains(illegal) {
            reasons.push(format!("may not contain '{illegal}'"));
        }
    }

    reasons
}

/// Image stream names must also be usable as a repository path component.
pub fn validate_image_stream_name(name: &str, prefix: bool) -> Vec<String> {
    let reasons = validate_path_segment_name(name, prefix);
    if !reasons.is_empty() {
        return reasons;
    }

    if !is_repository_name_component(name) {
        return vec![format!("must match \"{NAME_COMPONENT_PATTERN}\"")];
    }

    vec![]
}

fn validate_dns1123_label(value: &str) -> Vec<String> {
    let mut reasons = vec![];
    if value.len() > DNS1123_LABEL_MAX_LENGTH {
        reasons.push(format!(
            "must be no more than {DNS1123_LABEL_MAX_LENGTH} characters"
        ));
    }
    if !DNS1123_LABEL.is_match(value) {
        reasons.push(
            "a lowercase RFC 1123 label must consist of lower case alphanumeric characters \
             or '-', and must start and end with an alphanumeric character"
                .into(),
        );
    }
    reasons
}

fn validate_qualified_name(value: &str) -> Vec<String> {
    let mut reasons = vec![];

    let name = match value.split_once('/') {
        None => value,
        Some((prefix, name)) => {
            if prefix.is_empty() {
                reasons.push("prefix part must be non-empty".into());
            } else if prefix.len() > DNS1123_SUBDOMAIN_MAX_LENGTH
                || !DNS1123_SUBDOMAIN.is_match(prefix)
            {
                reasons.push(format!(
                    "prefix part must be a lowercase RFC 1123 subdomain of at most \
                     {DNS1123_SUBDOMAIN_MAX_LENGTH} characters"
                ));
            }
            name
        }
    };

    if name.is_empty() {
        reasons.push("name part must be non-empty".into());
    } else if name.len() > QUALIFIED_NAME_MAX_LENGTH {
        reasons.push(format!(
            "name part must be no more than {QUALIFIED_NAME_MAX_LENGTH} characters"
        ));
    }
    if !name.is_empty() && !QUALIFIED_NAME.is_match(name) {
        reasons.push(
            "name part must consist of alphanumeric characters, '-', '_' or '.', \
             and must start and end with an alphanumeric character"
                .into(),
        );
    }

    reasons
}

fn validate_labels(labels: &IndexMap<String, String>, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();

    for (key, value) in labels {
        for msg in validate_qualified_name(key) {
            errs.push(FieldError::invalid(path, key.as_str(), msg));
        }
        if value.len() > LABEL_VALUE_MAX_LENGTH || !LABEL_VALUE.is_match(value) {
            errs.push(FieldError::invalid(
                path,
                value.as_str(),
                format!(
                    "a valid label must be an empty string or consist of at most \
                     {LABEL_VALUE_MAX_LENGTH} alphanumeric characters, '-', '_' or '.'"
                ),
            ));
        }
    }

    errs
}

fn validate_annotations(annotations: &IndexMap<String, String>, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut total_size = 0;

    for (key, value) in annotations {
        for msg in validate_qualified_name(&key.to_ascii_lowercase()) {
            errs.push(FieldError::invalid(path, key.as_str(), msg));
        }
        total_size += key.len() + value.len();
    }

    if total_size > TOTAL_ANNOTATION_SIZE_LIMIT {
        errs.push(FieldError::too_long(
            path,
            "",
            TOTAL_ANNOTATION_SIZE_LIMIT,
        ));
    }

    errs
}
