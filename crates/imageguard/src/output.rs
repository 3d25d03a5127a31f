//! Rendering validation reports.

pub(crate) mod json;
pub(crate) mod plain;
