//! authz-codegen CLI — main entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use authz_codegen_cli::config::AuthzCodegenConfig;
use authz_codegen_cli::error::CliError;

/// authz-codegen - compiles relationship-authorization schemas into
/// Postgres/PL-pgSQL stored procedures.
#[derive(Parser, Debug)]
#[command(name = "authz-codegen")]
#[command(author, version, about = "Relationship-authorization SQL codegen", long_about = None)]
struct Cli {
    /// Path to config file (default: authz-codegen.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate check/list stored procedures from an analysis bundle.
    Generate,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Generate => {
            let config = AuthzCodegenConfig::load(cli.config.as_deref())?;
            authz_codegen_cli::generate::run(&config)
        }
    }
}
