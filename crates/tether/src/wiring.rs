//! Process composition root.
//!
//! Everything that used to be reachable as ambient global state lives
//! here instead: one [`ProcessContext`] per process, assembled from
//! explicit backends, handed down to the commands that need it.

use std::path::PathBuf;
use std::sync::Arc;

use tether_common::capability::{Capability, CapabilityStatus};
use tether_common::secrets::FileSecretStore;
use tether_config::policy::Config;
use tether_config::state;
use tether_device::link::DeviceLink;
use tether_device::JitGateway;
use tether_signing::api::{
    BundleSigner, DeveloperServices, DeviceKind, IdentityService, Team, TwoFactorProvider,
};
use tether_signing::identity::IdentityManager;
use tether_signing::{
    AccountManager, CertificateManager, RefreshScheduler, SigningError, SigningOrchestrator,
};
use tether_tunnel::{TunnelController, TunnelProcess};

/// External integrations the process runs against.
pub struct Backends {
    pub portal: Arc<dyn DeveloperServices>,
    pub identity: Arc<dyn IdentityService>,
    pub signer: Arc<dyn BundleSigner>,
    pub link: Arc<dyn DeviceLink>,
    pub tunnel: Arc<dyn TunnelProcess>,
}

pub struct ProcessContext {
    pub config: Config,
    pub accounts: Arc<AccountManager>,
    pub certificates: Arc<CertificateManager>,
    pub orchestrator: Arc<SigningOrchestrator>,
    pub scheduler: Arc<RefreshScheduler>,
    pub gateway: Arc<JitGateway>,
    pub tunnel: Arc<TunnelController>,
}

impl ProcessContext {
    pub fn assemble(config: Config, backends: Backends, host_bundle: Option<PathBuf>) -> Self {
        let secrets = Arc::new(FileSecretStore::open_default());
        let state_path = state::signing_state_path();

        let device_name = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "device".to_string());

        let gateway = Arc::new(JitGateway::new(backends.link.clone()));
        let tunnel = Arc::new(TunnelController::new(
            backends.tunnel,
            config.tunnel.clone(),
        ));

        let accounts = Arc::new(AccountManager::new(backends.identity));
        let certificates = Arc::new(CertificateManager::new(
            backends.portal.clone(),
            secrets,
            config.signing.clone(),
            &device_name,
            state_path.clone(),
        ));
        // The link resolves the device identifier per signing run, so a
        // device plugged in after startup still gets registered.
        let orchestrator = Arc::new(SigningOrchestrator::new(
            accounts.clone(),
            certificates.clone(),
            IdentityManager::new(backends.portal),
            backends.signer,
            backends.link,
            device_name,
            DeviceKind::Phone,
            host_bundle,
        ));
        let scheduler = Arc::new(RefreshScheduler::new(
            orchestrator.clone(),
            accounts.clone(),
            certificates.clone(),
            config.signing.clone(),
            state_path,
        ));

        Self {
            config,
            accounts,
            certificates,
            orchestrator,
            scheduler,
            gateway,
            tunnel,
        }
    }

    /// Sign in, refusing while the tunnel is relaying. The session
    /// lives in this process only.
    pub async fn login(
        &self,
        apple_id: &str,
        password: &str,
        two_factor: &dyn TwoFactorProvider,
    ) -> Result<Team, SigningError> {
        self.accounts
            .login(apple_id, password, two_factor, self.tunnel.is_connected())
            .await
    }

    /// Snapshot of every capability for the status surface.
    pub fn capabilities(&self) -> Vec<CapabilityStatus> {
        vec![
            self.certificates.status(),
            Capability::status(self.gateway.as_ref()),
            self.tunnel.status(),
        ]
    }
}
