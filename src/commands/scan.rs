use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use cloak::config;
use cloak::pipeline::{self, ScanReport};

use super::{CmdResult, OverrideArgs};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Site directory to analyze
    #[arg(long, short)]
    input: PathBuf,

    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(Debug, Serialize)]
pub struct ScanOutput {
    command: String,
    #[serde(flatten)]
    report: ScanReport,
}

pub fn run(args: ScanArgs) -> CmdResult<ScanOutput> {
    let (config, _source) = config::load(
        Some(args.input.as_path()),
        args.overrides.config.as_deref(),
        &args.overrides.overrides(),
    )?;

    let report = pipeline::scan(&args.input, &config)?;

    Ok((
        ScanOutput {
            command: "scan".to_string(),
            report,
        },
        0,
    ))
}
