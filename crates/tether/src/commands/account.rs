//! Developer account sign-in from the terminal.
//!
//! The portal session is held in memory by the running process, so
//! `login` on its own verifies credentials and exits; `run` and `sign`
//! take `--apple-id` to sign in before doing their work.

use std::io::{BufRead, Write};

use async_trait::async_trait;

use tether_signing::api::TwoFactorProvider;

use crate::commands::exit_with;
use crate::wiring::ProcessContext;

/// Reads the verification code from the terminal when the portal asks
/// for a second factor.
pub struct ConsoleTwoFactor;

#[async_trait]
impl TwoFactorProvider for ConsoleTwoFactor {
    async fn verification_code(&self) -> Option<String> {
        let line = tokio::task::spawn_blocking(|| {
            eprint!("verification code: ");
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).ok().map(|_| line)
        })
        .await
        .ok()??;
        let code = line.trim();
        if code.is_empty() {
            None
        } else {
            Some(code.to_string())
        }
    }
}

pub async fn login(context: &ProcessContext, apple_id: &str, json: bool) -> anyhow::Result<()> {
    let password = resolve_password()?;
    match context.login(apple_id, &password, &ConsoleTwoFactor).await {
        Ok(team) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "team": team.identifier,
                        "name": team.name,
                    })
                );
            } else {
                println!("signed in to {} ({})", team.name, team.identifier);
            }
            Ok(())
        }
        Err(e) => exit_with(e),
    }
}

/// Sign in and keep the session for the rest of this process. Exits
/// with the error's stable code on failure, like the other commands.
pub async fn sign_in(context: &ProcessContext, apple_id: &str) -> anyhow::Result<()> {
    let password = resolve_password()?;
    match context.login(apple_id, &password, &ConsoleTwoFactor).await {
        Ok(team) => {
            tracing::info!(team = %team.identifier, "Signed in");
            Ok(())
        }
        Err(e) => exit_with(e),
    }
}

/// Password from `TETHER_PASSWORD`, falling back to a terminal prompt.
fn resolve_password() -> anyhow::Result<String> {
    if let Ok(password) = std::env::var("TETHER_PASSWORD") {
        return Ok(password);
    }
    eprint!("password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
