//! Certificate lifecycle for a quota-limited developer account.
//!
//! A free account may hold at most two development certificates, each
//! usable for seven days, and the portal hands out private material
//! exactly once at issuance. The manager recovers the machine's own
//! certificate from the secret store when possible, revokes remote
//! records it can never use again, and evicts the oldest certificate
//! when the quota is full.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use zeroize::Zeroizing;

use tether_common::capability::{Capability, CapabilityStatus};
use tether_common::secrets::SecretStore;
use tether_config::policy::SigningPolicy;
use tether_config::state;

use crate::api::{DeveloperServices, RemoteCertificate, Session, Team};
use crate::error::SigningError;

/// Secret store namespace for certificate material.
pub const SECRET_NAMESPACE: &str = "signing";

const P12_KEY: &str = "p12Data";
const SERIAL_KEY: &str = "serialNumber";
const MACHINE_ID_KEY: &str = "machineIdentifier";

/// Prefix that marks certificates issued to this tool, so different
/// installs on different devices stay distinguishable on the portal.
pub const MACHINE_NAME_PREFIX: &str = "TETHER";

/// A certificate usable for signing, private material included.
#[derive(Clone)]
pub struct Certificate {
    pub serial_number: String,
    pub machine_name: String,
    pub machine_identifier: String,
    pub expires_at: DateTime<Utc>,
    p12_data: Zeroizing<Vec<u8>>,
}

impl Certificate {
    pub fn pkcs12(&self) -> &[u8] {
        &self.p12_data
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("serial_number", &self.serial_number)
            .field("machine_name", &self.machine_name)
            .field("expires_at", &self.expires_at)
            .field("p12_data", &"<redacted>")
            .finish()
    }
}

pub struct CertificateManager {
    api: Arc<dyn DeveloperServices>,
    secrets: Arc<dyn SecretStore>,
    policy: SigningPolicy,
    machine_name: String,
    state_path: PathBuf,
    active: tokio::sync::Mutex<Option<Certificate>>,
}

impl CertificateManager {
    pub fn new(
        api: Arc<dyn DeveloperServices>,
        secrets: Arc<dyn SecretStore>,
        policy: SigningPolicy,
        device_name: &str,
        state_path: PathBuf,
    ) -> Self {
        Self {
            api,
            secrets,
            policy,
            machine_name: format!("{MACHINE_NAME_PREFIX}-{device_name}"),
            state_path,
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Machine name under which this install's certificates are filed
    /// on the portal.
    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    /// Recorded expiration of the active certificate, if one was ever
    /// issued.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        state::load_signing_state(&self.state_path)
            .ok()
            .and_then(|s| s.certificate_expires_at)
    }

    /// Whether the certificate is inside its renewal margin. No
    /// recorded certificate always counts as due. Exactly on the margin
    /// boundary is not yet due.
    pub fn needs_refresh(&self) -> bool {
        match self.expires_at() {
            None => true,
            Some(expires_at) => {
                Utc::now() > expires_at - Duration::days(self.policy.refresh_margin_days)
            }
        }
    }

    /// Produce a usable certificate, issuing a new one if necessary.
    pub async fn ensure_certificate(
        &self,
        team: &Team,
        session: &Session,
    ) -> Result<Certificate, SigningError> {
        let mut active = self.active.lock().await;

        // 1. Reuse the in-memory certificate while it is still valid.
        if let Some(cert) = active.as_ref() {
            if !cert.is_expired(Utc::now()) {
                tracing::debug!(serial = %cert.serial_number, "Reusing active certificate");
                return Ok(cert.clone());
            }
        }

        // 2. See what the account currently holds.
        let remote = self.api.fetch_certificates(team, session).await?;
        let mut usable: Vec<&RemoteCertificate> = remote.iter().collect();

        // 3. A record under our machine name is either recoverable from
        //    the secret store or permanently unusable (the private
        //    material only ever existed locally). Unusable records get
        //    revoked so they stop occupying quota.
        if let Some(ours) = remote
            .iter()
            .find(|c| c.machine_name.as_deref() == Some(self.machine_name.as_str()))
        {
            if let Some(cert) = self.recover_stored(ours)? {
                tracing::info!(serial = %cert.serial_number, "Recovered stored certificate");
                *active = Some(cert.clone());
                return Ok(cert);
            }
            tracing::info!(
                serial = %ours.serial_number,
                "Revoking certificate with no local private material"
            );
            self.api
                .revoke_certificate(&ours.serial_number, team, session)
                .await?;
            usable.retain(|c| c.serial_number != ours.serial_number);
        }

        // 4. Make room under the quota by evicting the oldest record.
        if usable.len() >= self.policy.certificate_quota {
            if let Some(oldest) = usable.iter().min_by_key(|c| c.created_at) {
                tracing::info!(
                    serial = %oldest.serial_number,
                    created_at = %oldest.created_at,
                    "Certificate quota reached, revoking oldest"
                );
                self.api
                    .revoke_certificate(&oldest.serial_number, team, session)
                    .await?;
            }
        }

        // 5. Request a fresh certificate and persist its material.
        let issued = self
            .api
            .request_certificate(&self.machine_name, team, session)
            .await?;
        self.secrets.put(SECRET_NAMESPACE, P12_KEY, &issued.p12_data)?;
        self.secrets
            .put(SECRET_NAMESPACE, SERIAL_KEY, issued.serial_number.as_bytes())?;
        self.secrets.put(
            SECRET_NAMESPACE,
            MACHINE_ID_KEY,
            issued.machine_identifier.as_bytes(),
        )?;

        let expires_at = Utc::now() + Duration::days(self.policy.certificate_lifetime_days);
        state::update_signing_state(&self.state_path, |s| {
            s.certificate_expires_at = Some(expires_at);
        })?;

        let cert = Certificate {
            serial_number: issued.serial_number,
            machine_name: self.machine_name.clone(),
            machine_identifier: issued.machine_identifier,
            expires_at,
            p12_data: Zeroizing::new(issued.p12_data),
        };
        tracing::info!(serial = %cert.serial_number, %expires_at, "Issued new certificate");
        *active = Some(cert.clone());
        Ok(cert)
    }

    /// Revoke this machine's certificate and drop all local material.
    pub async fn revoke_active(&self, team: &Team, session: &Session) -> Result<(), SigningError> {
        let mut active = self.active.lock().await;

        if let Some(serial) = self.stored_string(SERIAL_KEY)? {
            self.api.revoke_certificate(&serial, team, session).await?;
            tracing::info!(serial = %serial, "Revoked certificate");
        }

        self.secrets.delete(SECRET_NAMESPACE, P12_KEY)?;
        self.secrets.delete(SECRET_NAMESPACE, SERIAL_KEY)?;
        self.secrets.delete(SECRET_NAMESPACE, MACHINE_ID_KEY)?;
        state::update_signing_state(&self.state_path, |s| {
            s.certificate_expires_at = None;
        })?;
        *active = None;
        Ok(())
    }

    /// Rebuild a certificate from the secret store if the stored serial
    /// matches the remote record.
    fn recover_stored(
        &self,
        remote: &RemoteCertificate,
    ) -> Result<Option<Certificate>, SigningError> {
        let Some(serial) = self.stored_string(SERIAL_KEY)? else {
            return Ok(None);
        };
        if serial != remote.serial_number {
            return Ok(None);
        }
        let Some(p12_data) = self.secrets.get(SECRET_NAMESPACE, P12_KEY)? else {
            return Ok(None);
        };
        let Some(machine_identifier) = self.stored_string(MACHINE_ID_KEY)? else {
            return Ok(None);
        };

        let expires_at = self
            .expires_at()
            .unwrap_or(remote.created_at + Duration::days(self.policy.certificate_lifetime_days));

        Ok(Some(Certificate {
            serial_number: serial,
            machine_name: self.machine_name.clone(),
            machine_identifier,
            expires_at,
            p12_data: Zeroizing::new(p12_data.to_vec()),
        }))
    }

    fn stored_string(&self, key: &str) -> Result<Option<String>, SigningError> {
        Ok(self
            .secrets
            .get(SECRET_NAMESPACE, key)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}

impl Capability for CertificateManager {
    fn name(&self) -> &str {
        "signing"
    }

    fn status(&self) -> CapabilityStatus {
        let (summary, healthy) = match self.expires_at() {
            None => ("no certificate issued".to_string(), false),
            Some(expires_at) => {
                let remaining = expires_at - Utc::now();
                if remaining < Duration::zero() {
                    ("certificate expired".to_string(), false)
                } else {
                    (
                        format!(
                            "certificate expires in {}h",
                            remaining.num_hours().max(0)
                        ),
                        !self.needs_refresh(),
                    )
                }
            }
        };
        CapabilityStatus {
            name: self.name().to_string(),
            summary,
            healthy,
        }
    }
}
