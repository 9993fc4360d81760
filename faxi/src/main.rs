//! Interactive REPL for the fax language: reads lines from stdin, parses
//! each as a module, and runs it against a root object that persists for
//! the life of the session.

mod error;
mod repl;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use error::{FaxiError, Result};

/// An interactive read-eval-print loop for the fax language.
#[derive(Parser, Debug)]
#[command(name = "faxi")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interactive REPL for the fax language", long_about = None)]
struct Cli {
    /// Dump each line's lowered IR and print VM cycle counts
    #[arg(short, long, global = true, env = "FAXI_VERBOSE")]
    verbose: bool,

    /// Disable ANSI color in diagnostic output
    #[arg(long, global = true, env = "FAXI_NO_COLOR")]
    no_color: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.no_color)?;
    repl::run(cli.verbose)?;
    Ok(())
}

fn init_logging(verbose: bool, no_color: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    let subscriber = fmt::layer().with_ansi(!no_color).with_target(false).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()
        .map_err(|e| FaxiError::Logging(e.to_string()))?;

    Ok(())
}
