use clap::Args;
use std::path::PathBuf;

use cloak::config::ConfigOverrides;

pub type CmdResult<T> = cloak::Result<(T, i32)>;

pub mod config;
pub mod run;
pub mod scan;

/// Configuration flags shared by `run` and `scan`.
#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    /// Configuration file (default: <input>/cloak.json when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Replacement prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Hex characters of the digest in each replacement (4-64)
    #[arg(long, value_name = "N")]
    pub hash_length: Option<usize>,

    /// Extra identifiers never renamed (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "NAMES")]
    pub whitelist: Vec<String>,
}

impl OverrideArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            prefix: self.prefix.clone(),
            hash_length: self.hash_length,
            whitelist: self.whitelist.clone(),
        }
    }
}

macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
}

pub(crate) fn run_json(command: crate::Commands) -> (cloak::Result<serde_json::Value>, i32) {
    crate::tty::status("cloak is working...");

    match command {
        crate::Commands::Run(args) => dispatch!(args, run),
        crate::Commands::Scan(args) => dispatch!(args, scan),
        crate::Commands::Config(args) => dispatch!(args, config),
    }
}
