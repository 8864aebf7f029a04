use clap::{Parser, Subcommand};

mod commands;
mod output;
mod tty;

use commands::{config, run, scan};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "cloak")]
#[command(version = VERSION)]
#[command(about = "Rename CSS classes and ids consistently across a static site")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obfuscate a site directory into an output directory
    Run(run::RunArgs),
    /// Report what a run would rename, without writing anything
    Scan(scan::ScanArgs),
    /// Show or initialize cloak.json
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command);

    if output::print_json_result(json_result).is_err() {
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
