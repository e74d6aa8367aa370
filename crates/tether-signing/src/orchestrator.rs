//! The end-to-end signing pipeline.
//!
//! One pipeline run: session check, certificate, bundle load, device
//! registration, App ID, provisioning profile, re-sign. Exactly one run
//! may be in flight per process; progress streams to observers over a
//! watch channel.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use tether_device::link::DeviceLink;

use crate::account::AccountManager;
use crate::api::{AppId, BundleSigner, DeviceKind, Session, Team};
use crate::bundle::{self, AppBundle};
use crate::certificate::{Certificate, CertificateManager};
use crate::error::SigningError;
use crate::identity::{DeviceProfile, IdentityManager};

/// A progress observation: monotonically non-decreasing fraction plus a
/// human-readable stage label.
#[derive(Debug, Clone, Serialize)]
pub struct SigningProgress {
    pub fraction: f64,
    pub stage: String,
}

impl SigningProgress {
    fn idle() -> Self {
        Self {
            fraction: 0.0,
            stage: "Idle".to_string(),
        }
    }
}

/// Output of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct SignedApp {
    /// The signed `.app` directory, rewritten in place.
    pub location: PathBuf,
    /// Identifier the app is provisioned under after containerization.
    pub identifier: String,
    pub name: String,
}

/// Releases the single-flight slot when dropped, including when the
/// holding future is cancelled mid-run.
struct FlightGuard {
    flag: Arc<AtomicBool>,
}

impl FlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, SigningError> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SigningError::SigningInProgress);
        }
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct SigningOrchestrator {
    accounts: Arc<AccountManager>,
    certificates: Arc<CertificateManager>,
    identity: IdentityManager,
    signer: Arc<dyn BundleSigner>,
    link: Arc<dyn DeviceLink>,
    device_name: String,
    device_kind: DeviceKind,
    /// The host app's own bundle, the target of scheduled self-renewal.
    host_bundle: Option<PathBuf>,
    in_flight: Arc<AtomicBool>,
    progress_tx: watch::Sender<SigningProgress>,
}

impl SigningOrchestrator {
    /// The device identifier is read from `link` at each run rather
    /// than captured here, so a device that appears after startup is
    /// picked up by the next run.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<AccountManager>,
        certificates: Arc<CertificateManager>,
        identity: IdentityManager,
        signer: Arc<dyn BundleSigner>,
        link: Arc<dyn DeviceLink>,
        device_name: String,
        device_kind: DeviceKind,
        host_bundle: Option<PathBuf>,
    ) -> Self {
        let (progress_tx, _) = watch::channel(SigningProgress::idle());
        Self {
            accounts,
            certificates,
            identity,
            signer,
            link,
            device_name,
            device_kind,
            host_bundle,
            in_flight: Arc::new(AtomicBool::new(false)),
            progress_tx,
        }
    }

    /// Observe pipeline progress. Receivers always see the latest
    /// stage; intermediate stages may be skipped under load.
    pub fn progress(&self) -> watch::Receiver<SigningProgress> {
        self.progress_tx.subscribe()
    }

    pub fn is_signing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Sign one bundle end to end. Rejected with
    /// [`SigningError::SigningInProgress`] while another run holds the
    /// single-flight slot.
    pub async fn sign_bundle(&self, source: &Path) -> Result<SignedApp, SigningError> {
        let _guard = FlightGuard::acquire(&self.in_flight)?;

        let result = self.run_pipeline(source).await;
        match &result {
            Ok(signed) => {
                self.report(1.0, "Done");
                tracing::info!(
                    identifier = %signed.identifier,
                    path = %signed.location.display(),
                    "Signing complete"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, source = %source.display(), "Signing failed");
            }
        }
        result
    }

    /// Re-sign the host app itself. Used by the refresh scheduler.
    pub async fn sign_self(&self) -> Result<(), SigningError> {
        let Some(host) = self.host_bundle.clone() else {
            return Err(SigningError::SigningFailed(
                "no host bundle configured for self-renewal".to_string(),
            ));
        };
        self.sign_bundle(&host).await.map(|_| ())
    }

    /// Sign a bundle and hand it to the device link for installation.
    pub async fn sign_and_install(&self, source: &Path) -> Result<SignedApp, SigningError> {
        let signed = self.sign_bundle(source).await?;
        self.link
            .install_app(&signed.identifier, &signed.location)
            .map_err(|e| SigningError::SigningFailed(format!("install failed: {e}")))?;
        tracing::info!(identifier = %signed.identifier, "Installed signed app on device");
        Ok(signed)
    }

    async fn run_pipeline(&self, source: &Path) -> Result<SignedApp, SigningError> {
        self.report(0.0, "Preparing to sign");
        let (team, session) = self.accounts.require_session().await?;

        self.report(0.1, "Fetching certificate");
        let certificate = self.certificates.ensure_certificate(&team, &session).await?;

        self.report(0.2, "Loading app");
        let bundle = bundle::load_bundle(source)?;

        match self
            .provision_and_sign(&bundle, &certificate, &team, &session)
            .await
        {
            Ok(app_id) => Ok(SignedApp {
                location: bundle.location.clone(),
                identifier: app_id.identifier,
                name: bundle.name.clone(),
            }),
            Err(e) => {
                // Staging behind an unpacked archive has nothing to
                // hand back once the pipeline fails.
                bundle.discard();
                Err(e)
            }
        }
    }

    async fn provision_and_sign(
        &self,
        bundle: &AppBundle,
        certificate: &Certificate,
        team: &Team,
        session: &Session,
    ) -> Result<AppId, SigningError> {
        self.report(0.3, "Registering device");
        let device = DeviceProfile {
            name: self.device_name.clone(),
            udid: self.link.fetch_udid(),
            kind: self.device_kind,
        };
        self.identity
            .ensure_device_registered(&device, team, session)
            .await?;

        self.report(0.4, "Creating App ID");
        let app_id = self
            .identity
            .ensure_app_id(&bundle.name, &bundle.source_identifier, team, session)
            .await?;

        self.report(0.6, "Fetching provisioning profile");
        let profile = self
            .identity
            .fetch_profile(&app_id, self.device_kind, team, session)
            .await?;

        self.report(0.7, "Signing app");
        self.signer
            .sign(&bundle.location, certificate, &[profile])
            .await
            .map_err(|e| SigningError::SigningFailed(e.to_string()))?;

        Ok(app_id)
    }

    fn report(&self, fraction: f64, stage: &str) {
        tracing::info!(fraction, stage, "Signing progress");
        let _ = self.progress_tx.send(SigningProgress {
            fraction,
            stage: stage.to_string(),
        });
    }
}
