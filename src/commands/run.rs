use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use cloak::config;
use cloak::pipeline::{self, RunOptions, RunReport};

use super::{CmdResult, OverrideArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Site directory to read (never modified)
    #[arg(long, short)]
    input: PathBuf,

    /// Directory to write the obfuscated copy into
    #[arg(long, short)]
    output: PathBuf,

    /// Remove a non-empty output directory first
    #[arg(long)]
    clean: bool,

    /// Also write the identifier mapping as JSON to this file
    #[arg(long, value_name = "FILE")]
    emit_map: Option<PathBuf>,

    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    command: String,
    #[serde(flatten)]
    report: RunReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    map_path: Option<String>,
}

pub fn run(args: RunArgs) -> CmdResult<RunOutput> {
    let (config, _source) = config::load(
        Some(args.input.as_path()),
        args.overrides.config.as_deref(),
        &args.overrides.overrides(),
    )?;

    let report = pipeline::run(
        &RunOptions {
            input: args.input,
            output: args.output,
            clean: args.clean,
        },
        &config,
    )?;

    let map_path = match &args.emit_map {
        Some(path) => {
            pipeline::write_mapping(path, &report.mapping)?;
            Some(path.display().to_string())
        }
        None => None,
    };

    Ok((
        RunOutput {
            command: "run".to_string(),
            report,
            map_path,
        },
        0,
    ))
}
