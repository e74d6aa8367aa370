//! Long-running mode: device gateway up, refresh scheduler armed,
//! until Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use tether_device::pairing;

use crate::commands::account;
use crate::wiring::ProcessContext;

/// Maximum time to wait for orderly shutdown before forcing exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(20);

pub async fn run(context: Arc<ProcessContext>, apple_id: Option<String>) -> anyhow::Result<()> {
    tracing::info!("Tether v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("Platform: {}", std::env::consts::OS);
    match hostname::get() {
        Ok(h) => tracing::info!("Hostname: {}", h.to_string_lossy()),
        Err(e) => tracing::warn!(error = %e, "Could not determine hostname"),
    }

    // Without a session every scheduled refresh is a silent no-op, so
    // sign in up front when an account was given.
    if let Some(apple_id) = &apple_id {
        account::sign_in(&context, apple_id).await?;
    }

    // The gateway coming up degraded (no device, no pairing record) is
    // not fatal; signing and the scheduler still work.
    match context.gateway.start(&pairing::default_pairing_dir()) {
        Ok(status) => tracing::info!(?status, "Device gateway started"),
        Err(e) => tracing::warn!(error = %e, "Device gateway unavailable"),
    }

    let cancel = CancellationToken::new();
    let scheduler_task = context.scheduler.clone().spawn(cancel.clone());

    // Surface gateway events in the log.
    let mut events = context.gateway.subscribe();
    let events_task = tokio::spawn({
        let token = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => tracing::info!(?event, "Device event"),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "Device event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        }
    });

    tracing::info!("Ready.");
    shutdown_signal().await;
    tracing::info!("Shutting down...");

    let shutdown = async {
        cancel.cancel();
        let _ = scheduler_task.await;
        let _ = events_task.await;
        context.gateway.stop();
        context.tunnel.stop();
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, shutdown)
        .await
        .is_err()
    {
        tracing::warn!(
            "Shutdown timed out after {:?}, forcing exit",
            SHUTDOWN_TIMEOUT
        );
    }

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for Ctrl+C");
}
