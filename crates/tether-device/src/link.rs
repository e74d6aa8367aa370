//! The device link seam.
//!
//! The only boundary through which the device domain touches a
//! physical device. The production implementation wraps a multiplexer
//! over USB or Wi-Fi; tests use in-memory fakes. Calls are synchronous,
//! mirroring the blocking FFI surface they front.

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("no device connected")]
    NoDevice,
    #[error("the pairing record was rejected by the device")]
    PairingRejected,
    #[error("{0}")]
    Other(String),
}

pub trait DeviceLink: Send + Sync {
    /// Bring up the link using the given pairing record. Optionally
    /// writes link diagnostics to `log_path`.
    fn start(&self, pairing_record: &Path, log_path: Option<&Path>) -> Result<(), LinkError>;

    /// Tear the link down. Must be safe to call at any time, including
    /// before a successful `start`.
    fn stop(&self);

    /// Unique identifier of the connected device, if one is reachable.
    fn fetch_udid(&self) -> Option<String>;

    /// Cheap liveness probe against the connected device.
    fn test_connection(&self) -> bool;

    fn attach_debugger_by_identifier(&self, identifier: &str) -> Result<(), LinkError>;

    fn attach_debugger_by_pid(&self, pid: u32) -> Result<(), LinkError>;

    /// Transfer and install a signed app package.
    fn install_app(&self, identifier: &str, package: &Path) -> Result<(), LinkError>;

    fn remove_app(&self, identifier: &str) -> Result<(), LinkError>;

    fn install_provisioning_profile(&self, profile: &[u8]) -> Result<(), LinkError>;

    fn remove_provisioning_profile(&self, identifier: &str) -> Result<(), LinkError>;
}
