//! safejson: lock-protected, crash-safe JSON state files.
//!
//! This is the main entry point for the `safejson` CLI. It parses arguments,
//! dispatches to the appropriate command handler, and handles errors with
//! proper exit codes.

mod cli;
mod commands;

use cli::Cli;
use env_logger::{Builder, Env};
use safejson::exit_codes;
use std::process::ExitCode;

fn init_logger() {
    // RUST_LOG overrides the default level, e.g. RUST_LOG=debug safejson ...
    Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    init_logger();
    let cli = Cli::parse_args();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match commands::dispatch(cli, &mut out) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
