//! CLI argument definitions and subcommand routing.

pub mod echo;
pub mod keys;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const DEFAULT_PROFILE: &str = "default";

/// Key management and a loopback echo bot for the SILC bridge.
#[derive(Parser)]
#[command(name = "silc", version, about)]
pub struct Cli {
    /// Profile whose key pair to use.
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage the profile's key pair.
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
    /// Run an echo bot on the in-process loopback network.
    Echo(EchoArgs),
}

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Generate a key pair for the profile.
    Create(CreateArgs),
    /// Print the profile's public key.
    Show {
        /// Passphrase the pair was created with.
        #[arg(long)]
        passphrase: Option<String>,
    },
}

/// Arguments for `keys create`.
#[derive(clap::Args)]
pub struct CreateArgs {
    /// Protect the private key with a passphrase.
    #[arg(long)]
    pub passphrase: Option<String>,

    /// Key length in bits.
    #[arg(long, default_value_t = silc::KeyPairParams::DEFAULT_KEY_LENGTH)]
    pub bits: u32,

    /// Public key identifier (defaults to `UN=<user>, HN=<host>`).
    #[arg(long)]
    pub identifier: Option<String>,

    /// Overwrite an existing pair.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `echo`.
#[derive(clap::Args)]
pub struct EchoArgs {
    /// Nickname of the bot.
    #[arg(short, long)]
    pub nick: Option<String>,

    /// Server host name reported by the loopback network.
    #[arg(long, default_value = "silc.example.org")]
    pub server: String,

    /// Server port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Channel to join.
    #[arg(short, long, default_value = "#lobby")]
    pub channel: String,

    /// Simulated users talking on the channel.
    #[arg(long, value_delimiter = ',', default_value = "bob,carol")]
    pub peers: Vec<String>,

    /// Number of simulated lines before the bot disconnects.
    #[arg(long, default_value_t = 6)]
    pub lines: usize,

    /// Pump interval in milliseconds.
    #[arg(long, default_value_t = 250)]
    pub interval_ms: u64,
}

/// Platform-specific data directory for a named profile.
pub fn profile_dir(profile: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("silc")
        .join(profile)
}

/// Public and private key file paths of a profile.
pub fn key_paths(profile: &str) -> (PathBuf, PathBuf) {
    let dir = profile_dir(profile);
    (dir.join("identity.pub"), dir.join("identity.prv"))
}
