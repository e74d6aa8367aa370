use tether_common::error::ErrorCode;

use crate::api::ApiError;

/// Network failure classes that survive to the caller. The remediation
/// differs per class, so they stay distinguishable instead of collapsing
/// into one opaque error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailure {
    /// The portal did not answer within the request deadline.
    Timeout,
    /// No route to the portal at all.
    NoConnectivity,
    /// The connection dropped mid-exchange.
    ConnectionLost,
}

impl std::fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "the developer services request timed out"),
            Self::NoConnectivity => write!(f, "no network connectivity to developer services"),
            Self::ConnectionLost => write!(f, "the connection to developer services was lost"),
        }
    }
}

/// Errors surfaced by the signing domain.
///
/// Certificate quota and recovery problems are handled inside
/// [`crate::certificate::CertificateManager`] and never appear here;
/// what escapes is what a caller can act on.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("not signed in to a developer account")]
    AuthenticationFailure,

    #[error("the loopback tunnel is active; stop it before signing in")]
    TunnelInterferes,

    #[error("a signing operation is already in progress")]
    SigningInProgress,

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("app bundle is invalid: {0}")]
    InvalidBundle(String),

    #[error("device identifier unavailable; connect the device and retry")]
    MissingDeviceIdentity,

    #[error("{0}")]
    Network(NetworkFailure),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ApiError> for SigningError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => Self::AuthenticationFailure,
            ApiError::Timeout => Self::Network(NetworkFailure::Timeout),
            ApiError::NoConnectivity => Self::Network(NetworkFailure::NoConnectivity),
            ApiError::ConnectionLost => Self::Network(NetworkFailure::ConnectionLost),
            ApiError::Service(message) => Self::SigningFailed(message),
        }
    }
}

impl From<&SigningError> for ErrorCode {
    fn from(err: &SigningError) -> Self {
        match err {
            SigningError::AuthenticationFailure => ErrorCode::AuthenticationFailure,
            SigningError::TunnelInterferes => ErrorCode::TunnelInterferes,
            SigningError::SigningInProgress => ErrorCode::SigningInProgress,
            SigningError::SigningFailed(_) | SigningError::InvalidBundle(_) => {
                ErrorCode::SigningFailed
            }
            SigningError::MissingDeviceIdentity => ErrorCode::MissingDeviceIdentity,
            SigningError::Network(NetworkFailure::Timeout) => ErrorCode::NetworkTimeout,
            SigningError::Network(NetworkFailure::NoConnectivity) => ErrorCode::NoConnectivity,
            SigningError::Network(NetworkFailure::ConnectionLost) => ErrorCode::ConnectionLost,
            SigningError::Io(_) => ErrorCode::IoError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_typed_signing_errors() {
        assert!(matches!(
            SigningError::from(ApiError::Unauthorized),
            SigningError::AuthenticationFailure
        ));
        assert!(matches!(
            SigningError::from(ApiError::Timeout),
            SigningError::Network(NetworkFailure::Timeout)
        ));
        assert!(matches!(
            SigningError::from(ApiError::ConnectionLost),
            SigningError::Network(NetworkFailure::ConnectionLost)
        ));
        assert!(matches!(
            SigningError::from(ApiError::Service("quota".into())),
            SigningError::SigningFailed(_)
        ));
    }

    #[test]
    fn network_failures_keep_distinct_error_codes() {
        let timeout = SigningError::Network(NetworkFailure::Timeout);
        let offline = SigningError::Network(NetworkFailure::NoConnectivity);
        let dropped = SigningError::Network(NetworkFailure::ConnectionLost);

        assert_eq!(ErrorCode::from(&timeout), ErrorCode::NetworkTimeout);
        assert_eq!(ErrorCode::from(&offline), ErrorCode::NoConnectivity);
        assert_eq!(ErrorCode::from(&dropped), ErrorCode::ConnectionLost);
    }

    #[test]
    fn busy_and_auth_errors_map_to_their_codes() {
        assert_eq!(
            ErrorCode::from(&SigningError::SigningInProgress),
            ErrorCode::SigningInProgress
        );
        assert_eq!(
            ErrorCode::from(&SigningError::AuthenticationFailure),
            ErrorCode::AuthenticationFailure
        );
        assert_eq!(
            ErrorCode::from(&SigningError::TunnelInterferes),
            ErrorCode::TunnelInterferes
        );
    }
}
