mod backends;
pub(crate) mod cli;
mod commands;
mod wiring;

use std::sync::Arc;

use clap::Parser;

use cli::{Cli, Command, PairingSubcommand, RefreshSubcommand};
use wiring::{Backends, ProcessContext};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The rest of the workspace resolves paths through this variable.
    if let Some(dir) = &cli.data_dir {
        std::env::set_var("TETHER_DATA_DIR", dir);
    }

    // Initialize logging
    let level = match cli.verbose {
        0 => cli.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Hold the non-blocking guards for the lifetime of main so logs flush on exit.
    let _log_guards = init_logging(env_filter, cli.log_file.as_deref())?;

    // ── Commands that need no context ───────────────────────────────
    match &cli.command {
        Command::Version => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "version": env!("CARGO_PKG_VERSION"),
                        "platform": std::env::consts::OS,
                    })
                );
            } else {
                println!("tether {}", env!("CARGO_PKG_VERSION"));
            }
            return Ok(());
        }
        Command::Pairing(pairing_cmd) => {
            let PairingSubcommand::Check { dir } = &pairing_cmd.command;
            return commands::device::check_pairing(dir.clone(), cli.json);
        }
        _ => {}
    }

    tether_config::dirs::ensure_data_dir();
    let config = tether_config::policy::Config::load()?;

    let host_bundle = match &cli.command {
        Command::Run { host_bundle, .. } => host_bundle.clone(),
        _ => None,
    };
    let context = Arc::new(ProcessContext::assemble(
        config,
        default_backends(),
        host_bundle,
    ));

    // ── Synchronous subcommands (no runtime needed) ─────────────────
    match &cli.command {
        Command::Status => return commands::status::show(&context, cli.json),
        Command::Refresh(refresh_cmd) => {
            if let RefreshSubcommand::Show = refresh_cmd.command {
                return commands::refresh::show(&context, cli.json);
            }
        }
        Command::Jit(jit_cmd) => return commands::device::jit(&context, &jit_cmd.command),
        Command::Tunnel(tunnel_cmd) => {
            return commands::tunnel::dispatch(&context, &tunnel_cmd.command)
        }
        _ => {}
    }

    // ── Everything below needs a Tokio runtime ──────────────────────
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match cli.command {
            Command::Login { apple_id } => {
                commands::account::login(&context, &apple_id, cli.json).await
            }
            Command::Run { apple_id, .. } => commands::run::run(context, apple_id).await,
            Command::Sign {
                path,
                install,
                apple_id,
            } => {
                commands::sign::sign(&context, &path, install, apple_id.as_deref(), cli.json).await
            }
            Command::Refresh(_) => commands::refresh::run(&context).await,
            _ => Ok(()),
        }
    })
}

/// Backends for a bare CLI build. Embedding hosts assemble
/// [`ProcessContext`] with their own integrations instead.
fn default_backends() -> Backends {
    Backends {
        portal: Arc::new(backends::UnconfiguredPortal),
        identity: Arc::new(backends::UnconfiguredPortal),
        signer: Arc::new(backends::UnconfiguredPortal),
        link: Arc::new(backends::UnconfiguredLink),
        tunnel: Arc::new(backends::UnconfiguredTunnel),
    }
}

pub(crate) fn init_logging(
    env_filter: tracing_subscriber::EnvFilter,
    log_file: Option<&std::path::Path>,
) -> anyhow::Result<Vec<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    // Always use non-blocking stderr to avoid deadlocks when stderr is a
    // redirected pipe that nobody reads.
    let (nb_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(nb_stderr);

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let (nb_file, file_guard) = tracing_appender::non_blocking(file);
        let file_layer = tracing_subscriber::fmt::layer().with_writer(nb_file);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();

        Ok(vec![stderr_guard, file_guard])
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();

        Ok(vec![stderr_guard])
    }
}
