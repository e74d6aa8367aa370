//! Developer account session management.
//!
//! The session lives in memory only. Certificates and their private
//! material persist across restarts, so a fresh sign-in after a restart
//! still reuses the machine's existing certificate.

use std::sync::Arc;

use crate::api::{IdentityService, Session, Team, TwoFactorProvider};
use crate::error::SigningError;

#[derive(Clone)]
pub struct ActiveAccount {
    pub apple_id: String,
    pub team: Team,
    pub session: Session,
}

pub struct AccountManager {
    identity: Arc<dyn IdentityService>,
    active: tokio::sync::Mutex<Option<ActiveAccount>>,
}

impl AccountManager {
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self {
            identity,
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Authenticate and store the resulting session.
    ///
    /// The loopback tunnel intercepts the portal's traffic while it is
    /// up, so sign-in is refused outright instead of failing with a
    /// confusing network error.
    pub async fn login(
        &self,
        apple_id: &str,
        password: &str,
        two_factor: &dyn TwoFactorProvider,
        tunnel_active: bool,
    ) -> Result<Team, SigningError> {
        if tunnel_active {
            return Err(SigningError::TunnelInterferes);
        }

        let (team, session) = self.identity.authenticate(apple_id, password, two_factor).await?;
        tracing::info!(team = %team.identifier, "Signed in to developer account");

        *self.active.lock().await = Some(ActiveAccount {
            apple_id: apple_id.to_string(),
            team: team.clone(),
            session,
        });
        Ok(team)
    }

    pub async fn logout(&self) {
        let mut active = self.active.lock().await;
        if active.take().is_some() {
            tracing::info!("Signed out of developer account");
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub async fn team(&self) -> Option<Team> {
        self.active.lock().await.as_ref().map(|a| a.team.clone())
    }

    /// Current team and session, or [`SigningError::AuthenticationFailure`]
    /// when nobody is signed in.
    pub async fn require_session(&self) -> Result<(Team, Session), SigningError> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| (a.team.clone(), a.session.clone()))
            .ok_or(SigningError::AuthenticationFailure)
    }
}
