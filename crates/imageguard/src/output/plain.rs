//! "plain" (i.e. cargo-style) output.

use annotate_snippets::{Group, Level, Renderer};
use anstream::println;
use owo_colors::OwoColorize;

use crate::check::Report;

fn render_report(report: &Report) {
    let title = Level::ERROR.primary_title(format!(
        "{kind} \"{name}\" is invalid",
        kind = report.kind,
        name = report.name
    ));

    let mut group =
        Group::with_title(title).element(Level::NOTE.message(format!("in {}", report.path)));
    for err in report.errors.iter() {
        group = group.element(Level::ERROR.message(err.to_string()));
    }

    let renderer = Renderer::styled();
    println!("{}", renderer.render(&[group]));
}

pub(crate) fn render_reports(reports: &[Report]) {
    let invalid = reports
        .iter()
        .filter(|report| !report.is_valid())
        .collect::<Vec<_>>();

    for report in &invalid {
        render_report(report);
        println!();
    }

    if invalid.is_empty() {
        println!(
            "{ok} ({nobjects} object{s} checked)",
            ok = "No invalid objects. Good job!".green(),
            nobjects = reports.len().bold(),
            s = if reports.len() == 1 { "" } else { "s" },
        );
    } else {
        let nerrors = invalid.iter().map(|report| report.errors.len()).sum::<usize>();
        println!(
            "{ninvalid} of {nobjects} object{s} invalid, {nerrors} error{es}",
            ninvalid = invalid.len().red(),
            nobjects = reports.len(),
            s = if reports.len() == 1 { "" } else { "s" },
            nerrors = nerrors.red(),
            es = if nerrors == 1 { "" } else { "s" },
        );
    }
}
