use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use cloak::config::{self, CloakConfig, ConfigOverrides, ConfigSource, DEFAULT_WHITELIST};

use super::CmdResult;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Display the effective configuration
    Show {
        /// Site directory whose cloak.json should be read
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Explicit configuration file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Show only built-in defaults (ignore any cloak.json)
        #[arg(long)]
        builtin: bool,
    },
    /// Write a default cloak.json into a site directory
    Init {
        /// Site directory
        #[arg(long, short)]
        input: PathBuf,

        /// Overwrite an existing cloak.json
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<CloakConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<ConfigSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_whitelist: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

pub fn run(args: ConfigArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Show {
            input,
            config,
            builtin,
        } => show(input, config, builtin),
        ConfigCommand::Init { input, force } => init(input, force),
    }
}

fn show(input: Option<PathBuf>, explicit: Option<PathBuf>, builtin: bool) -> CmdResult<ConfigOutput> {
    let (config, source) = if builtin {
        (CloakConfig::default(), ConfigSource::Builtin)
    } else {
        config::load(
            input.as_deref(),
            explicit.as_deref(),
            &ConfigOverrides::default(),
        )?
    };

    let default_whitelist = config
        .use_default_whitelist
        .then(|| DEFAULT_WHITELIST.iter().map(|s| s.to_string()).collect());

    Ok((
        ConfigOutput {
            command: "config.show".to_string(),
            config: Some(config),
            source: Some(source),
            default_whitelist,
            path: None,
        },
        0,
    ))
}

fn init(input: PathBuf, force: bool) -> CmdResult<ConfigOutput> {
    let path = config::init(&input, force)?;

    Ok((
        ConfigOutput {
            command: "config.init".to_string(),
            config: None,
            source: None,
            default_whitelist: None,
            path: Some(path.display().to_string()),
        },
        0,
    ))
}
