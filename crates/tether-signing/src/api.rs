//! Traits and wire types for the developer services portal.
//!
//! This is the ONLY seam through which the signing domain talks to the
//! outside world. Production wiring supplies implementations backed by
//! the portal protocol and a code-sign engine; tests supply in-memory
//! fakes.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::certificate::Certificate;

/// Developer team the account belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Portal team identifier, e.g. `ABCDE12345`.
    pub identifier: String,
    pub name: String,
}

/// Opaque authenticated session for portal requests.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
}

/// Device class used for registration and profile requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Phone,
    Tablet,
}

/// Certificate record as the portal reports it. Private material is
/// never part of this; it only exists locally.
#[derive(Debug, Clone)]
pub struct RemoteCertificate {
    pub serial_number: String,
    pub machine_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Freshly issued certificate, including the private material the
/// portal hands out exactly once.
pub struct IssuedCertificate {
    pub serial_number: String,
    pub machine_identifier: String,
    pub p12_data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RegisteredDevice {
    pub udid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppId {
    pub identifier: String,
    pub name: String,
}

/// Provisioning profile blob as issued by the portal.
#[derive(Debug, Clone)]
pub struct ProvisioningProfile {
    pub data: Vec<u8>,
}

/// Portal-level failures. Mapped onto [`crate::SigningError`] at the
/// domain boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("the developer session is missing or expired")]
    Unauthorized,
    #[error("request timed out")]
    Timeout,
    #[error("no network connectivity")]
    NoConnectivity,
    #[error("connection lost")]
    ConnectionLost,
    #[error("developer services rejected the request: {0}")]
    Service(String),
}

/// Developer services portal operations used by the signing lifecycle.
#[async_trait]
pub trait DeveloperServices: Send + Sync {
    async fn fetch_certificates(
        &self,
        team: &Team,
        session: &Session,
    ) -> Result<Vec<RemoteCertificate>, ApiError>;

    async fn request_certificate(
        &self,
        machine_name: &str,
        team: &Team,
        session: &Session,
    ) -> Result<IssuedCertificate, ApiError>;

    async fn revoke_certificate(
        &self,
        serial_number: &str,
        team: &Team,
        session: &Session,
    ) -> Result<(), ApiError>;

    async fn fetch_devices(
        &self,
        kind: DeviceKind,
        team: &Team,
        session: &Session,
    ) -> Result<Vec<RegisteredDevice>, ApiError>;

    async fn register_device(
        &self,
        name: &str,
        udid: &str,
        kind: DeviceKind,
        team: &Team,
        session: &Session,
    ) -> Result<RegisteredDevice, ApiError>;

    async fn fetch_app_ids(&self, team: &Team, session: &Session) -> Result<Vec<AppId>, ApiError>;

    async fn register_app_id(
        &self,
        name: &str,
        identifier: &str,
        team: &Team,
        session: &Session,
    ) -> Result<AppId, ApiError>;

    async fn fetch_provisioning_profile(
        &self,
        app_id: &AppId,
        kind: DeviceKind,
        team: &Team,
        session: &Session,
    ) -> Result<ProvisioningProfile, ApiError>;
}

/// Interactive second factor source for authentication.
#[async_trait]
pub trait TwoFactorProvider: Send + Sync {
    /// Ask the operator for the verification code. `None` aborts the
    /// sign-in.
    async fn verification_code(&self) -> Option<String>;
}

/// Authentication against the developer account.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn authenticate(
        &self,
        apple_id: &str,
        password: &str,
        two_factor: &dyn TwoFactorProvider,
    ) -> Result<(Team, Session), ApiError>;
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SignerFailure(pub String);

/// The code-sign engine. Rewrites the bundle in place with the given
/// certificate and profiles.
#[async_trait]
pub trait BundleSigner: Send + Sync {
    async fn sign(
        &self,
        bundle: &Path,
        certificate: &Certificate,
        profiles: &[ProvisioningProfile],
    ) -> Result<(), SignerFailure>;
}
