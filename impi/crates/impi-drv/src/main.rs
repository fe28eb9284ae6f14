//! impi - the imp interpreter CLI.
//!
//! Runs a REPL by default; `run` executes a script file; `worker`
//! serves the JSON-line protocol on stdin/stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use impi_drv::{repl, worker, Session};
use impi_eval::show;

/// The imp interpreter
#[derive(Parser, Debug)]
#[command(name = "impi")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "An interpreter for the imp token-tree language", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true, env = "IMPI_VERBOSE")]
    verbose: bool,

    /// Skip REPL history persistence
    #[arg(long, global = true)]
    no_history: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read-eval-print loop (the default)
    Repl,

    /// Execute a script file
    Run {
        /// Script path
        file: PathBuf,
    },

    /// Serve the JSON-line worker protocol on stdin/stdout
    Worker,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut session = Session::new();
    let result = match cli.command {
        None | Some(Commands::Repl) => {
            let history = if cli.no_history {
                None
            } else {
                repl::default_history_path()
            };
            repl::run(&mut session, history).await
        }
        Some(Commands::Run { file }) => run_script(&mut session, &file).await,
        Some(Commands::Worker) => worker::run(&mut session).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {}", error);
            ExitCode::FAILURE
        }
    }
}

async fn run_script(session: &mut Session, file: &PathBuf) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(file)?;
    let value = session.eval_source(&source).await?;
    if !value.is_nil() {
        println!("{}", show(&value));
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
