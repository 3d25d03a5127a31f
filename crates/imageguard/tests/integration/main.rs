/// Command-line behavior: inputs, output formats and exit codes.
mod cli;
/// Helpers.
mod common;
/// Configuration loading and discovery tests.
mod config;
/// Validating updates against a previous object.
mod update;
