use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tether", version, about = "Sideload signing and device services")]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "TETHER_LOG", default_value = "info")]
    pub log_level: String,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs to file (in addition to stderr)
    #[arg(long, env = "TETHER_LOG_FILE", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, env = "TETHER_DATA_DIR", value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show version information
    Version,
    /// Show status of all capabilities
    Status,
    /// Sign in to the developer account and verify the credentials
    Login {
        /// Developer account Apple ID. Password comes from
        /// TETHER_PASSWORD or a terminal prompt.
        #[arg(env = "TETHER_APPLE_ID")]
        apple_id: String,
    },
    /// Run the device gateway and refresh scheduler until interrupted
    Run {
        /// Bundle re-signed by scheduled refresh cycles
        #[arg(long, value_name = "PATH")]
        host_bundle: Option<PathBuf>,
        /// Sign in on startup so scheduled refreshes can run
        #[arg(long, env = "TETHER_APPLE_ID")]
        apple_id: Option<String>,
    },
    /// Sign an .ipa archive or .app directory
    Sign {
        /// Path to the bundle
        path: PathBuf,
        /// Install on the connected device after signing
        #[arg(long)]
        install: bool,
        /// Sign in first with this Apple ID
        #[arg(long, env = "TETHER_APPLE_ID")]
        apple_id: Option<String>,
    },
    /// Certificate refresh schedule
    Refresh(RefreshCommand),
    /// Pairing record management
    Pairing(PairingCommand),
    /// JIT enablement for an installed app or running process
    Jit(JitCommand),
    /// Loopback tunnel control
    Tunnel(TunnelCommand),
}

#[derive(Args, Debug)]
pub struct RefreshCommand {
    #[command(subcommand)]
    pub command: RefreshSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum RefreshSubcommand {
    /// Run a refresh cycle now
    Run,
    /// Show the persisted refresh schedule
    Show,
}

#[derive(Args, Debug)]
pub struct PairingCommand {
    #[command(subcommand)]
    pub command: PairingSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum PairingSubcommand {
    /// Check whether a usable pairing record exists
    Check {
        /// Directory to scan (default: the data directory's pairing/)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct JitCommand {
    #[command(subcommand)]
    pub command: JitSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum JitSubcommand {
    /// Enable JIT for an installed app
    Enable {
        /// Bundle identifier of the installed app
        identifier: String,
    },
    /// Enable JIT for a running process
    Attach {
        /// Process id on the device
        pid: u32,
    },
}

#[derive(Args, Debug)]
pub struct TunnelCommand {
    #[command(subcommand)]
    pub command: TunnelSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum TunnelSubcommand {
    /// Start the relay and verify connectivity
    Start,
    /// Stop the relay
    Stop,
    /// Probe connectivity through the relay
    Test,
}
