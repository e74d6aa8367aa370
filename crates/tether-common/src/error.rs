use serde::{Deserialize, Serialize};

/// Machine-readable error codes surfaced to callers of the CLI and
/// embedding hosts. Shared by all domains.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Account
    AuthenticationFailure,
    TunnelInterferes,
    // Signing
    SigningInProgress,
    SigningFailed,
    MissingDeviceIdentity,
    // Network
    NetworkTimeout,
    NoConnectivity,
    ConnectionLost,
    // Device link
    DeviceNotStarted,
    DeviceNotReady,
    PairingRecordMissing,
    AttachFailed,
    InstallFailed,
    // Tunnel
    TunnelStartFailed,
    TunnelTestFailed,
    // Generic
    IoError,
    Internal,
}

impl ErrorCode {
    /// Process exit code for this error when surfaced by the CLI.
    /// Stable across releases; scripts key off these values.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthenticationFailure => 10,
            Self::TunnelInterferes => 11,
            Self::SigningInProgress => 20,
            Self::SigningFailed => 21,
            Self::MissingDeviceIdentity => 22,
            Self::NetworkTimeout | Self::NoConnectivity | Self::ConnectionLost => 30,
            Self::DeviceNotStarted => 40,
            Self::DeviceNotReady => 41,
            Self::PairingRecordMissing => 42,
            Self::AttachFailed => 43,
            Self::InstallFailed => 44,
            Self::TunnelStartFailed => 50,
            Self::TunnelTestFailed => 51,
            Self::IoError | Self::Internal => 1,
        }
    }

    /// Whether retrying the same operation without operator action can
    /// plausibly succeed. Transient network conditions are retryable;
    /// everything else needs intervention first.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkTimeout | Self::NoConnectivity | Self::ConnectionLost
        )
    }
}
