//! Device registration, App ID management and profile retrieval.

use std::sync::Arc;

use crate::api::{AppId, DeveloperServices, DeviceKind, ProvisioningProfile, Session, Team};
use crate::error::SigningError;

/// The device on whose behalf apps are provisioned.
///
/// The identifier is optional because it comes from a live device
/// query; a detached or unreadable device simply has none, and the
/// operations that need it fail with a typed error instead of
/// registering a placeholder.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub name: String,
    pub udid: Option<String>,
    pub kind: DeviceKind,
}

/// Containerized bundle identifier for a sideloaded app: a `com.`
/// prefix, the first ten characters of the team identifier, and the
/// source identifier with its dots flattened to dashes. Deterministic,
/// so re-signing the same app reuses its App ID.
pub fn provisioned_bundle_identifier(team: &Team, source_identifier: &str) -> String {
    let prefix: String = team.identifier.chars().take(10).collect();
    let flattened = source_identifier.replace('.', "-");
    format!("com.{prefix}.{flattened}")
}

pub struct IdentityManager {
    api: Arc<dyn DeveloperServices>,
}

impl IdentityManager {
    pub fn new(api: Arc<dyn DeveloperServices>) -> Self {
        Self { api }
    }

    /// Register the device with the team unless it already is.
    /// Registration is permanent per account, so the check-first order
    /// keeps repeated signs from erroring on duplicates.
    pub async fn ensure_device_registered(
        &self,
        device: &DeviceProfile,
        team: &Team,
        session: &Session,
    ) -> Result<String, SigningError> {
        let udid = device
            .udid
            .clone()
            .ok_or(SigningError::MissingDeviceIdentity)?;

        let registered = self.api.fetch_devices(device.kind, team, session).await?;
        if registered.iter().any(|d| d.udid == udid) {
            tracing::debug!(udid = %udid, "Device already registered");
            return Ok(udid);
        }

        self.api
            .register_device(&device.name, &udid, device.kind, team, session)
            .await?;
        tracing::info!(udid = %udid, name = %device.name, "Registered device");
        Ok(udid)
    }

    /// Find or create the App ID for an app being sideloaded.
    pub async fn ensure_app_id(
        &self,
        app_name: &str,
        source_identifier: &str,
        team: &Team,
        session: &Session,
    ) -> Result<AppId, SigningError> {
        let identifier = provisioned_bundle_identifier(team, source_identifier);

        let existing = self.api.fetch_app_ids(team, session).await?;
        if let Some(app_id) = existing.into_iter().find(|a| a.identifier == identifier) {
            tracing::debug!(identifier = %app_id.identifier, "Reusing App ID");
            return Ok(app_id);
        }

        let app_id = self
            .api
            .register_app_id(app_name, &identifier, team, session)
            .await?;
        tracing::info!(identifier = %app_id.identifier, "Created App ID");
        Ok(app_id)
    }

    pub async fn fetch_profile(
        &self,
        app_id: &AppId,
        kind: DeviceKind,
        team: &Team,
        session: &Session,
    ) -> Result<ProvisioningProfile, SigningError> {
        let profile = self
            .api
            .fetch_provisioning_profile(app_id, kind, team, session)
            .await?;
        tracing::debug!(identifier = %app_id.identifier, "Fetched provisioning profile");
        Ok(profile)
    }
}
