//! `tcp-opt` entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use tcp_opt::run_bufferize;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Bufferize(args) => {
            let request = args.into_request();
            let stdout = std::io::stdout();
            if let Err(e) = run_bufferize(&request, &mut stdout.lock()) {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
