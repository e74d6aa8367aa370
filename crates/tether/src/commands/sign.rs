use std::path::Path;

use tether_device::pairing;

use crate::commands::{account, exit_with};
use crate::wiring::ProcessContext;

pub async fn sign(
    context: &ProcessContext,
    path: &Path,
    install: bool,
    apple_id: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    if let Some(apple_id) = apple_id {
        account::sign_in(context, apple_id).await?;
    }

    // Stream pipeline stages to stderr so stdout stays parseable.
    let mut progress = context.orchestrator.progress();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow().clone();
            eprintln!("[{:>3.0}%] {}", snapshot.fraction * 100.0, snapshot.stage);
        }
    });

    let result = context.orchestrator.sign_bundle(path).await;
    printer.abort();

    let signed = match result {
        Ok(signed) => signed,
        Err(e) => exit_with(e),
    };

    if install {
        if let Err(e) = context.gateway.start(&pairing::default_pairing_dir()) {
            exit_with(e);
        }
        if let Err(e) = context.gateway.install_app(&signed.identifier, &signed.location) {
            exit_with(e);
        }
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "name": signed.name,
                "identifier": signed.identifier,
                "location": signed.location,
                "installed": install,
            })
        );
    } else {
        println!(
            "signed {} as {} at {}",
            signed.name,
            signed.identifier,
            signed.location.display()
        );
    }
    Ok(())
}
