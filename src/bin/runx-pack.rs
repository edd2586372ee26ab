//! runx-pack - bundle a runtime payload into a runx launcher
//!
//! Appends `<payload>` (restored as `runtime/` on first run) to a copy of
//! the plain launcher binary.

use clap::{ArgAction, Parser};
use console::style;
use runx::bundle;
use runx::cache::digest::digest_file;
use runx::error::RunxResult;
use runx::ui;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Bundle a runtime payload into a runx launcher
#[derive(Parser, Debug)]
#[command(name = "runx-pack")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Plain runx launcher binary
    #[arg(short, long)]
    launcher: PathBuf,

    /// Payload directory, restored as `runtime/` inside the deployment
    #[arg(short, long)]
    payload: PathBuf,

    /// Packed launcher to write
    #[arg(short, long)]
    output: PathBuf,

    /// Print the digest of the packed launcher
    #[arg(long)]
    digest: bool,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => EnvFilter::new("runx=warn"),
        1 => EnvFilter::new("runx=info"),
        _ => EnvFilter::new("runx=debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::output::error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> RunxResult<()> {
    let size = bundle::pack(&args.launcher, &args.payload, &args.output)?;
    eprintln!(
        "{} Packed {} ({} byte payload)",
        style("✓").green(),
        args.output.display(),
        size
    );

    if args.digest {
        println!("{}", digest_file(&args.output)?);
    }
    Ok(())
}
