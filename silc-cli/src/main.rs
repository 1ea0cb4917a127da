//! silc-cli: key management and a loopback echo bot for the SILC bridge.

#![allow(
    missing_docs,
    missing_debug_implementations,
    clippy::print_stderr,
    clippy::print_stdout
)]

mod cmd;

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cmd::{Cli, Command, KeysCommand};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("fatal: {e}");
        process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `-v` raises the level one step per flag.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> silc::Result<()> {
    let profile = cli.profile.as_deref().unwrap_or(cmd::DEFAULT_PROFILE);
    match cli.command {
        Command::Keys {
            command: KeysCommand::Create(args),
        } => cmd::keys::create(profile, &args),
        Command::Keys {
            command: KeysCommand::Show { passphrase },
        } => cmd::keys::show(profile, passphrase.as_deref()),
        Command::Echo(args) => cmd::echo::run(profile, &args),
    }
}
