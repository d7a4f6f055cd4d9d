//! Fido Broker CLI - Build, inspect and key FIDO2 request options.
//!
//! Works on the same versioned wire form the broker accepts, so blobs
//! produced here can be posted to the server unchanged.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use fido_broker_core::{RequestKind, UserVerificationRequirement};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error
  65  Invalid options (undecodable or not dispatchable)
  66  Cannot read input file
  74  Cannot write output file";

#[derive(Parser)]
#[command(name = "fido-broker")]
#[command(author, version, about = "FIDO2 request options tooling", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print the essential result
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Ceremony kind as accepted on the command line
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KindArg {
    Register,
    Sign,
}

impl From<KindArg> for RequestKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Register => RequestKind::Register,
            KindArg::Sign => RequestKind::Sign,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum UvArg {
    Required,
    Preferred,
    Discouraged,
}

impl From<UvArg> for UserVerificationRequirement {
    fn from(uv: UvArg) -> Self {
        match uv {
            UvArg::Required => UserVerificationRequirement::Required,
            UvArg::Preferred => UserVerificationRequirement::Preferred,
            UvArg::Discouraged => UserVerificationRequirement::Discouraged,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encode request options to the broker wire form
    Encode(commands::encode::EncodeArgs),

    /// Decode and validate an options file
    Decode {
        /// Path to the encoded options
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the options as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the correlation token the broker derives for a request
    Token {
        /// Ceremony the options will be dispatched as
        #[arg(short, long, value_enum)]
        kind: KindArg,

        /// Path to the encoded options
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "fido_broker=debug,fido_broker_core=debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Encode(args) => commands::encode::execute(args, cli.quiet),
        Commands::Decode { file, json } => commands::decode::execute(file, json, cli.quiet),
        Commands::Token { kind, file } => commands::token::execute(kind.into(), file, cli.quiet),
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(e) => ExitCode::from_anyhow(&e),
    };

    if let Some(message) = &exit.message {
        eprintln!("Error: {message}");
    }
    std::process::exit(exit.code);
}
