//! Scheduled certificate renewal.
//!
//! A cycle runs every five days: if someone is signed in and the
//! certificate is inside its renewal margin, the host app is re-signed
//! so the certificate gets replaced before its seven days run out. The
//! next fire time persists across restarts; a fire time that passed
//! while the process was down runs immediately on startup. Every cycle
//! re-arms the schedule regardless of outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tether_config::policy::SigningPolicy;
use tether_config::state;

use crate::account::AccountManager;
use crate::certificate::CertificateManager;
use crate::error::SigningError;
use crate::orchestrator::SigningOrchestrator;

/// Wall-clock budget for one refresh cycle. A cycle that exceeds it is
/// cancelled; the schedule re-arms as usual.
const CYCLE_BUDGET: StdDuration = StdDuration::from_secs(10 * 60);

/// Outcome of a refresh cycle that ran to a decision without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The host app was re-signed and the certificate renewed.
    Completed,
    /// The certificate still has margin left; nothing to do.
    NotDue,
    /// Nobody is signed in. Silent no-op.
    NotAuthenticated,
}

pub struct RefreshScheduler {
    orchestrator: Arc<SigningOrchestrator>,
    accounts: Arc<AccountManager>,
    certificates: Arc<CertificateManager>,
    policy: SigningPolicy,
    state_path: PathBuf,
    cycle_budget: StdDuration,
}

impl RefreshScheduler {
    pub fn new(
        orchestrator: Arc<SigningOrchestrator>,
        accounts: Arc<AccountManager>,
        certificates: Arc<CertificateManager>,
        policy: SigningPolicy,
        state_path: PathBuf,
    ) -> Self {
        Self {
            orchestrator,
            accounts,
            certificates,
            policy,
            state_path,
            cycle_budget: CYCLE_BUDGET,
        }
    }

    #[cfg(test)]
    fn with_cycle_budget(mut self, budget: StdDuration) -> Self {
        self.cycle_budget = budget;
        self
    }

    /// Persisted next fire time, if the schedule was ever armed.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        state::load_signing_state(&self.state_path)
            .ok()
            .and_then(|s| s.next_refresh_after)
    }

    /// When the last successful cycle completed.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        state::load_signing_state(&self.state_path)
            .ok()
            .and_then(|s| s.last_refresh)
    }

    /// Run one cycle now. Also the entry point for a manually requested
    /// refresh; manual and scheduled cycles share the orchestrator's
    /// single-flight slot, so a cycle landing during an interactive
    /// sign fails with [`SigningError::SigningInProgress`].
    pub async fn run_cycle(&self) -> Result<RefreshOutcome, SigningError> {
        // Re-arm first so a cycle that fails, hangs or panics still
        // gets a successor.
        self.rearm()?;

        if !self.accounts.is_authenticated().await {
            tracing::debug!("Refresh skipped, nobody is signed in");
            return Ok(RefreshOutcome::NotAuthenticated);
        }
        if !self.certificates.needs_refresh() {
            tracing::debug!("Refresh skipped, certificate is outside its renewal margin");
            return Ok(RefreshOutcome::NotDue);
        }

        tracing::info!("Starting certificate refresh cycle");
        match tokio::time::timeout(self.cycle_budget, self.orchestrator.sign_self()).await {
            Ok(Ok(())) => {
                let now = Utc::now();
                let lifetime = Duration::days(self.policy.certificate_lifetime_days);
                state::update_signing_state(&self.state_path, |s| {
                    s.last_refresh = Some(now);
                    s.certificate_expires_at = Some(now + lifetime);
                })?;
                tracing::info!("Certificate refresh completed");
                Ok(RefreshOutcome::Completed)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Certificate refresh failed");
                Err(e)
            }
            Err(_elapsed) => {
                tracing::warn!(
                    budget_secs = self.cycle_budget.as_secs(),
                    "Certificate refresh exceeded its budget and was cancelled"
                );
                Err(SigningError::SigningFailed(
                    "refresh cycle exceeded its time budget".to_string(),
                ))
            }
        }
    }

    /// Run the scheduler loop until cancelled.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let due = match self.next_due() {
                    Some(due) => due,
                    None => {
                        // First launch: arm the initial interval.
                        let due = Utc::now() + Duration::days(self.policy.refresh_interval_days);
                        if let Err(e) = self.rearm() {
                            tracing::warn!(error = %e, "Could not persist refresh schedule");
                        }
                        due
                    }
                };
                let wait = (due - Utc::now()).to_std().unwrap_or(StdDuration::ZERO);
                tracing::debug!(due = %due, "Refresh scheduler armed");

                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Refresh scheduler stopped");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                match self.run_cycle().await {
                    Ok(outcome) => tracing::info!(?outcome, "Refresh cycle finished"),
                    Err(e) => tracing::warn!(error = %e, "Refresh cycle failed"),
                }
            }
        })
    }

    fn rearm(&self) -> Result<(), std::io::Error> {
        let next = Utc::now() + Duration::days(self.policy.refresh_interval_days);
        state::update_signing_state(&self.state_path, |s| {
            s.next_refresh_after = Some(next);
        })?;
        Ok(())
    }
}
