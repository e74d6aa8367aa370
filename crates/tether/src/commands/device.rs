use std::path::PathBuf;

use tether_device::gateway::DeviceError;
use tether_device::pairing;

use crate::cli::JitSubcommand;
use crate::commands::exit_with;
use crate::wiring::ProcessContext;

pub fn check_pairing(dir: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(pairing::default_pairing_dir);
    match pairing::discover_pairing_record(&dir) {
        Some(record) => {
            if json {
                println!("{}", serde_json::json!({ "pairing_record": record }));
            } else {
                println!("pairing record: {}", record.display());
            }
            Ok(())
        }
        None => {
            if json {
                println!("{}", serde_json::json!({ "pairing_record": null }));
            }
            exit_with(DeviceError::PairingRecordMissing)
        }
    }
}

pub fn jit(context: &ProcessContext, command: &JitSubcommand) -> anyhow::Result<()> {
    if let Err(e) = context.gateway.start(&pairing::default_pairing_dir()) {
        exit_with(e);
    }

    let result = match command {
        JitSubcommand::Enable { identifier } => context.gateway.enable_jit(identifier),
        JitSubcommand::Attach { pid } => context.gateway.enable_jit_for_pid(*pid),
    };
    match result {
        Ok(()) => {
            println!("JIT enabled");
            Ok(())
        }
        Err(e) => exit_with(e),
    }
}
