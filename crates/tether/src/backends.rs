//! Null backend implementations.
//!
//! The signing portal client, the device multiplexer and the tunnel
//! relay are integrations supplied by an embedding host. A bare CLI
//! build carries these placeholders instead, so every command still
//! runs and fails at the seam with a clear explanation rather than at
//! startup.

use std::path::Path;

use async_trait::async_trait;

use tether_device::link::{DeviceLink, LinkError};
use tether_signing::api::{
    ApiError, AppId, BundleSigner, DeveloperServices, DeviceKind, IdentityService,
    IssuedCertificate, ProvisioningProfile, RegisteredDevice, RemoteCertificate, Session,
    SignerFailure, Team, TwoFactorProvider,
};
use tether_signing::certificate::Certificate;
use tether_tunnel::TunnelProcess;

const NO_PORTAL: &str = "no developer services backend is linked into this build";
const NO_LINK: &str = "no device link backend is linked into this build";

pub struct UnconfiguredPortal;

#[async_trait]
impl DeveloperServices for UnconfiguredPortal {
    async fn fetch_certificates(
        &self,
        _team: &Team,
        _session: &Session,
    ) -> Result<Vec<RemoteCertificate>, ApiError> {
        Err(ApiError::Service(NO_PORTAL.to_string()))
    }

    async fn request_certificate(
        &self,
        _machine_name: &str,
        _team: &Team,
        _session: &Session,
    ) -> Result<IssuedCertificate, ApiError> {
        Err(ApiError::Service(NO_PORTAL.to_string()))
    }

    async fn revoke_certificate(
        &self,
        _serial_number: &str,
        _team: &Team,
        _session: &Session,
    ) -> Result<(), ApiError> {
        Err(ApiError::Service(NO_PORTAL.to_string()))
    }

    async fn fetch_devices(
        &self,
        _kind: DeviceKind,
        _team: &Team,
        _session: &Session,
    ) -> Result<Vec<RegisteredDevice>, ApiError> {
        Err(ApiError::Service(NO_PORTAL.to_string()))
    }

    async fn register_device(
        &self,
        _name: &str,
        _udid: &str,
        _kind: DeviceKind,
        _team: &Team,
        _session: &Session,
    ) -> Result<RegisteredDevice, ApiError> {
        Err(ApiError::Service(NO_PORTAL.to_string()))
    }

    async fn fetch_app_ids(
        &self,
        _team: &Team,
        _session: &Session,
    ) -> Result<Vec<AppId>, ApiError> {
        Err(ApiError::Service(NO_PORTAL.to_string()))
    }

    async fn register_app_id(
        &self,
        _name: &str,
        _identifier: &str,
        _team: &Team,
        _session: &Session,
    ) -> Result<AppId, ApiError> {
        Err(ApiError::Service(NO_PORTAL.to_string()))
    }

    async fn fetch_provisioning_profile(
        &self,
        _app_id: &AppId,
        _kind: DeviceKind,
        _team: &Team,
        _session: &Session,
    ) -> Result<ProvisioningProfile, ApiError> {
        Err(ApiError::Service(NO_PORTAL.to_string()))
    }
}

#[async_trait]
impl IdentityService for UnconfiguredPortal {
    async fn authenticate(
        &self,
        _apple_id: &str,
        _password: &str,
        _two_factor: &dyn TwoFactorProvider,
    ) -> Result<(Team, Session), ApiError> {
        Err(ApiError::Service(NO_PORTAL.to_string()))
    }
}

#[async_trait]
impl BundleSigner for UnconfiguredPortal {
    async fn sign(
        &self,
        _bundle: &Path,
        _certificate: &Certificate,
        _profiles: &[ProvisioningProfile],
    ) -> Result<(), SignerFailure> {
        Err(SignerFailure(
            "no code-sign engine is linked into this build".to_string(),
        ))
    }
}

pub struct UnconfiguredLink;

impl DeviceLink for UnconfiguredLink {
    fn start(&self, _record: &Path, _log: Option<&Path>) -> Result<(), LinkError> {
        Err(LinkError::Other(NO_LINK.to_string()))
    }

    fn stop(&self) {}

    fn fetch_udid(&self) -> Option<String> {
        None
    }

    fn test_connection(&self) -> bool {
        false
    }

    fn attach_debugger_by_identifier(&self, _identifier: &str) -> Result<(), LinkError> {
        Err(LinkError::Other(NO_LINK.to_string()))
    }

    fn attach_debugger_by_pid(&self, _pid: u32) -> Result<(), LinkError> {
        Err(LinkError::Other(NO_LINK.to_string()))
    }

    fn install_app(&self, _identifier: &str, _package: &Path) -> Result<(), LinkError> {
        Err(LinkError::Other(NO_LINK.to_string()))
    }

    fn remove_app(&self, _identifier: &str) -> Result<(), LinkError> {
        Err(LinkError::Other(NO_LINK.to_string()))
    }

    fn install_provisioning_profile(&self, _profile: &[u8]) -> Result<(), LinkError> {
        Err(LinkError::Other(NO_LINK.to_string()))
    }

    fn remove_provisioning_profile(&self, _identifier: &str) -> Result<(), LinkError> {
        Err(LinkError::Other(NO_LINK.to_string()))
    }
}

pub struct UnconfiguredTunnel;

impl TunnelProcess for UnconfiguredTunnel {
    fn start(&self, _bind_address: &str) -> i32 {
        // Conventional "command not found" status.
        127
    }

    fn stop(&self) {}

    fn test(&self, _timeout_ms: u64) -> i32 {
        1
    }
}
