#![warn(clippy::all, clippy::dbg_macro)]

use std::{
    io::{Write, stdout},
    process::ExitCode,
    sync::Arc,
};

use annotate_snippets::{Group, Level, Renderer};
use anstream::{eprintln, stream::IsTerminal};
use anyhow::{Result, anyhow};
use camino::Utf8PathBuf;
use check::Checker;
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::Generator;
use clap_verbosity_flag::InfoLevel;
use config::Config;
use image_validation::SystemResolver;
use input::{Input, collect_inputs};
use owo_colors::OwoColorize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

mod check;
mod config;
mod input;
mod output;

/// Validates OpenShift image resources before they reach a cluster.
#[derive(Parser)]
#[command(about, version)]
struct App {
    /// Validate the input as an update of this previously stored object.
    ///
    /// Registry references already present in the previous object stay
    /// valid, even when the whitelist no longer admits them.
    #[arg(long, value_name = "FILE")]
    previous: Option<Utf8PathBuf>,

    /// With --previous, validate an image stream status update.
    #[arg(long, requires = "previous")]
    status: bool,

    /// Perform only offline operations.
    ///
    /// This skips resolving the hosts that imports would contact.
    #[arg(short, long, env = "IMAGEGUARD_OFFLINE")]
    offline: bool,

    /// Contact the registries of valid imports after validation.
    ///
    /// Every request goes through the same host checks as imports do.
    #[arg(long, conflicts_with = "offline")]
    ping: bool,

    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity<InfoLevel>,

    /// The output format to emit. By default, cargo-style diagnostics will be emitted.
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Control the use of color in output.
    #[arg(long, value_enum, value_name = "MODE")]
    color: Option<ColorMode>,

    /// The configuration file to load. By default, any config will be
    /// discovered relative to $CWD.
    #[arg(short, long, env = "IMAGEGUARD_CONFIG", group = "conf")]
    config: Option<Utf8PathBuf>,

    /// Disable all configuration loading.
    #[arg(long, group = "conf")]
    no_config: bool,

    /// Disable all error codes besides success and tool failure.
    #[arg(long)]
    no_exit_codes: bool,

    /// Generate tab completion scripts for the specified shell.
    #[arg(long, value_enum, value_name = "SHELL", exclusive = true)]
    completions: Option<Shell>,

    /// The inputs to validate.
    ///
    /// These can be individual YAML or JSON files holding one object each,
    /// or entire directories.
    #[arg(required = true)]
    inputs: Vec<Utf8PathBuf>,
}

/// Shell with auto-generated completion script available.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, ValueEnum)]
#[allow(clippy::enum_variant_names)]
enum Shell {
    /// Bourne Again `SHell` (bash)
    Bash,
    /// Elvish shell
    Elvish,
    /// Friendly Interactive `SHell` (fish)
    Fish,
    /// `PowerShell`
    Powershell,
    /// Z `SHell` (zsh)
    Zsh,
}

impl Generator for Shell {
    fn file_name(&self, name: &str) -> String {
        match self {
            Shell::Bash => clap_complete::shells::Bash.file_name(name),
            Shell::Elvish => clap_complete::shells::Elvish.file_name(name),
            Shell::Fish => clap_complete::shells::Fish.file_name(name),
            Shell::Powershell => clap_complete::shells::PowerShell.file_name(name),
            Shell::Zsh => clap_complete::shells::Zsh.file_name(name),
        }
    }

    fn generate(&self, cmd: &clap::Command, buf: &mut dyn std::io::Write) {
        match self {
            Shell::Bash => clap_complete::shells::Bash.generate(cmd, buf),
            Shell::Elvish => clap_complete::shells::Elvish.generate(cmd, buf),
            Shell::Fish => clap_complete::shells::Fish.generate(cmd, buf),
            Shell::Powershell => clap_complete::shells::PowerShell.generate(cmd, buf),
            Shell::Zsh => clap_complete::shells::Zsh.generate(cmd, buf),
        }
    }
}

#[derive(Debug, Default, Copy, Clone, ValueEnum)]
pub(crate) enum OutputFormat {
    /// cargo-style output.
    #[default]
    Plain,
    /// JSON-formatted output.
    Json,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub(crate) enum ColorMode {
    /// Use color output if the output supports it.
    Auto,
    /// Force color output, even if the output isn't a terminal.
    Always,
    /// Disable color output, even if the output is a compatible terminal.
    Never,
}

impl ColorMode {
    /// Returns a concrete (i.e. non-auto) `anstream::ColorChoice` for the given terminal.
    fn color_choice_for_terminal(&self, io: impl IsTerminal) -> anstream::ColorChoice {
        match self {
            ColorMode::Auto => {
                if io.is_terminal() {
                    anstream::ColorChoice::Always
                } else {
                    anstream::ColorChoice::Never
                }
            }
            ColorMode::Always => anstream::ColorChoice::Always,
            ColorMode::Never => anstream::ColorChoice::Never,
        }
    }
}

impl From<ColorMode> for anstream::ColorChoice {
    /// Maps `ColorMode` to `anstream::ColorChoice`.
    fn from(value: ColorMode) -> Self {
        match value {
            ColorMode::Auto => Self::Auto,
            ColorMode::Always => Self::Always,
            ColorMode::Never => Self::Never,
        }
    }
}

/// Exit code when at least one object is invalid.
const EXIT_INVALID: u8 = 3;

pub(crate) fn tips(err: impl AsRef<str>, tips: &[impl AsRef<str>]) -> String {
    let mut group = Group::with_title(Level::ERROR.primary_title(err.as_ref()));
    for tip in tips {
        group = group.element(Level::NOTE.message(tip.as_ref()));
    }

    let renderer = Renderer::styled();
    format!("{}", renderer.render(&[group]))
}

fn completions<G: clap_complete::Generator>(generator: G, cmd: &mut clap::Command) {
    clap_complete::generate(
        generator,
        cmd,
        cmd.get_name().to_string(),
        &mut std::io::stdout(),
    );
}

#[tokio::main]
async fn run() -> Result<ExitCode> {
    human_panic::setup_panic!();

    let app = App::parse();

    if let Some(shell) = app.completions {
        let mut cmd = App::command();
        completions(shell, &mut cmd);
        return Ok(ExitCode::SUCCESS);
    }

    let color_mode = match app.color {
        Some(color_mode) => color_mode,
        None => {
            // If `--color` wasn't specified, we first check a handful
            // of common environment variables, and then fall
            // back to `anstream`'s auto detection.
            if std::env::var("NO_COLOR").is_ok() {
                ColorMode::Never
            } else if std::env::var("FORCE_COLOR").is_ok()
                || std::env::var("CLICOLOR_FORCE").is_ok()
            {
                ColorMode::Always
            } else {
                ColorMode::Auto
            }
        }
    };

    anstream::ColorChoice::write_global(color_mode.into());

    let writer = std::sync::Mutex::new(anstream::AutoStream::new(
        Box::new(std::io::stderr()) as Box<dyn Write + Send>,
        color_mode.color_choice_for_terminal(std::io::stderr()),
    ));

    let filter = EnvFilter::builder()
        .with_default_directive(app.verbose.tracing_level_filter().into())
        .from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                // NOTE: We don't need `with_ansi` here since our writer is
                // an `anstream::AutoStream` that handles color output for us.
                .with_writer(writer),
        )
        .with(filter)
        .init();

    let config = Config::new(&app).map_err(|e| {
        anyhow!(tips(
            format!("failed to load config: {:#}", anyhow::Error::from(e)),
            &["check your configuration file for errors"]
        ))
    })?;

    let inputs = collect_inputs(&app.inputs)?;
    let checker = Checker::new(&config, Arc::new(SystemResolver), app.offline);

    let reports = match &app.previous {
        Some(previous) => {
            let [input] = inputs.as_slice() else {
                return Err(anyhow!(tips(
                    format!("--previous needs exactly one input, got {}", inputs.len()),
                    &["pass the single file holding the updated object"]
                )));
            };
            let previous = Input::load(previous)?;

            vec![checker.check_update(input, &previous, app.status)?]
        }
        None => {
            let mut reports = Vec::with_capacity(inputs.len());
            for input in &inputs {
                tracing::debug!("validating {input}");
                reports.push(checker.check(input).await?);
            }
            reports
        }
    };

    if app.ping {
        checker.ping(&inputs, &reports).await?;
    }

    match app.format {
        OutputFormat::Plain => output::plain::render_reports(&reports),
        OutputFormat::Json => output::json::output(stdout(), &reports)?,
    };

    if app.no_exit_codes || reports.iter().all(|report| report.is_valid()) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_INVALID))
    }
}

fn main() -> ExitCode {
    // This is a little silly, but returning an ExitCode like this ensures
    // we always exit cleanly, rather than performing a hard process exit.
    match run() {
        Ok(exit) => exit,
        Err(err) => {
            eprintln!(
                "{fatal}: no validation was performed",
                fatal = "fatal".red().bold()
            );
            eprintln!("{err:?}");
            ExitCode::FAILURE
        }
    }
}
