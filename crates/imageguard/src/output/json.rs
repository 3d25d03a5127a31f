//! JSON output.

use std::io::Write;

use anyhow::Result;

use crate::check::Report;

/// Writes every report with errors as a JSON array.
pub(crate) fn output(sink: impl Write, reports: &[Report]) -> Result<()> {
    let invalid = reports
        .iter()
        .filter(|report| !report.is_valid())
        .collect::<Vec<_>>();

    serde_json::to_writer_pretty(sink, &invalid)?;
    Ok(())
}
