//! The JIT gateway in front of the device link.
//!
//! Owns the link's lifecycle state machine, gates every pass-through
//! on that state, and broadcasts JIT attachment events to observers.

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;

use tether_common::capability::{Capability, CapabilityStatus};
use tether_common::error::ErrorCode;

use crate::link::{DeviceLink, LinkError};
use crate::pairing;

/// Capacity for the device event broadcast channel.
const BROADCAST_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle state of the device link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// `start` has not been called yet.
    NotStarted,
    /// Startup is underway.
    Starting,
    /// Link is up and a device answers probes.
    Ready,
    /// Link is up but no device is currently reachable.
    NoDevice,
    /// Startup was refused for lack of a pairing record.
    NoPairingRecord,
    /// The link failed to come up.
    Error,
}

/// What a JIT enablement request points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JitTarget {
    Identifier(String),
    Pid(u32),
}

impl std::fmt::Display for JitTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identifier(id) => write!(f, "{id}"),
            Self::Pid(pid) => write!(f, "pid {pid}"),
        }
    }
}

/// Events emitted by the device gateway.
#[derive(Debug, Clone)]
pub enum JitEvent {
    /// The debugger attached and JIT is enabled for the target.
    Enabled { target: JitTarget },
    /// Attachment failed.
    AttachFailed { target: JitTarget, reason: String },
    /// The link moved to a new lifecycle state.
    StatusChanged { status: LinkStatus },
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device services have not been started")]
    NotStarted,
    #[error("the device link is not ready")]
    NotReady,
    #[error("no pairing record found")]
    PairingRecordMissing,
    #[error("could not attach the debugger: {0}")]
    AttachFailed(String),
    #[error("install failed: {0}")]
    InstallFailed(String),
    #[error("device link error: {0}")]
    Link(#[from] LinkError),
}

impl From<&DeviceError> for ErrorCode {
    fn from(err: &DeviceError) -> Self {
        match err {
            DeviceError::NotStarted => ErrorCode::DeviceNotStarted,
            DeviceError::NotReady => ErrorCode::DeviceNotReady,
            DeviceError::PairingRecordMissing => ErrorCode::PairingRecordMissing,
            DeviceError::AttachFailed(_) => ErrorCode::AttachFailed,
            DeviceError::InstallFailed(_) => ErrorCode::InstallFailed,
            DeviceError::Link(_) => ErrorCode::Internal,
        }
    }
}

pub struct JitGateway {
    link: Arc<dyn DeviceLink>,
    status: Mutex<LinkStatus>,
    event_tx: broadcast::Sender<JitEvent>,
}

impl JitGateway {
    pub fn new(link: Arc<dyn DeviceLink>) -> Self {
        let (event_tx, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        Self {
            link,
            status: Mutex::new(LinkStatus::NotStarted),
            event_tx,
        }
    }

    /// Observe gateway events. Slow receivers lag rather than block.
    pub fn subscribe(&self) -> broadcast::Receiver<JitEvent> {
        self.event_tx.subscribe()
    }

    pub fn status(&self) -> LinkStatus {
        *self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Bring up the link, discovering a pairing record in `pairing_dir`.
    ///
    /// Without a pairing record the link is never started. A link that
    /// comes up without a reachable device lands in
    /// [`LinkStatus::NoDevice`]; that is a degraded success, not an
    /// error, because the device may appear later.
    pub fn start(&self, pairing_dir: &Path) -> Result<LinkStatus, DeviceError> {
        let Some(record) = pairing::discover_pairing_record(pairing_dir) else {
            self.set_status(LinkStatus::NoPairingRecord);
            return Err(DeviceError::PairingRecordMissing);
        };
        self.start_with_pairing_record(&record)
    }

    /// Bring up the link with an explicit pairing record path.
    pub fn start_with_pairing_record(&self, record: &Path) -> Result<LinkStatus, DeviceError> {
        self.set_status(LinkStatus::Starting);

        let log_path = tether_common::paths::tether_log_dir().join("device-link.log");
        if let Err(e) = self.link.start(record, Some(&log_path)) {
            tracing::error!(error = %e, "Device link failed to start");
            return Err(match e {
                LinkError::PairingRejected => {
                    self.set_status(LinkStatus::NoPairingRecord);
                    DeviceError::PairingRecordMissing
                }
                other => {
                    self.set_status(LinkStatus::Error);
                    DeviceError::Link(other)
                }
            });
        }

        let status = if self.link.test_connection() {
            LinkStatus::Ready
        } else {
            tracing::warn!("Device link is up but no device answered the probe");
            LinkStatus::NoDevice
        };
        self.set_status(status);
        Ok(status)
    }

    /// Tear the link down. Safe in every state.
    pub fn stop(&self) {
        self.link.stop();
        self.set_status(LinkStatus::NotStarted);
    }

    /// Re-probe the device and update the ready/no-device split.
    pub fn refresh_connection(&self) -> LinkStatus {
        let current = self.status();
        if matches!(current, LinkStatus::Ready | LinkStatus::NoDevice) {
            let status = if self.link.test_connection() {
                LinkStatus::Ready
            } else {
                LinkStatus::NoDevice
            };
            self.set_status(status);
            return status;
        }
        current
    }

    /// Identifier of the connected device, if reachable.
    pub fn udid(&self) -> Option<String> {
        self.link.fetch_udid()
    }

    /// Enable JIT for an installed app.
    pub fn enable_jit(&self, identifier: &str) -> Result<(), DeviceError> {
        let target = JitTarget::Identifier(identifier.to_string());
        self.require_ready()?;
        match self.link.attach_debugger_by_identifier(identifier) {
            Ok(()) => self.emit_enabled(target),
            Err(e) => self.emit_attach_failed(target, e),
        }
    }

    /// Enable JIT for a running process.
    pub fn enable_jit_for_pid(&self, pid: u32) -> Result<(), DeviceError> {
        let target = JitTarget::Pid(pid);
        self.require_ready()?;
        match self.link.attach_debugger_by_pid(pid) {
            Ok(()) => self.emit_enabled(target),
            Err(e) => self.emit_attach_failed(target, e),
        }
    }

    /// Install a signed app package on the device.
    pub fn install_app(&self, identifier: &str, package: &Path) -> Result<(), DeviceError> {
        self.require_ready()?;
        self.link
            .install_app(identifier, package)
            .map_err(|e| DeviceError::InstallFailed(e.to_string()))?;
        tracing::info!(identifier, "Installed app");
        Ok(())
    }

    pub fn remove_app(&self, identifier: &str) -> Result<(), DeviceError> {
        self.require_ready()?;
        self.link
            .remove_app(identifier)
            .map_err(|e| DeviceError::InstallFailed(e.to_string()))?;
        tracing::info!(identifier, "Removed app");
        Ok(())
    }

    pub fn install_provisioning_profile(&self, profile: &[u8]) -> Result<(), DeviceError> {
        self.require_ready()?;
        self.link
            .install_provisioning_profile(profile)
            .map_err(|e| DeviceError::InstallFailed(e.to_string()))?;
        Ok(())
    }

    pub fn remove_provisioning_profile(&self, identifier: &str) -> Result<(), DeviceError> {
        self.require_ready()?;
        self.link
            .remove_provisioning_profile(identifier)
            .map_err(|e| DeviceError::InstallFailed(e.to_string()))?;
        Ok(())
    }

    fn require_ready(&self) -> Result<(), DeviceError> {
        match self.status() {
            LinkStatus::Ready => Ok(()),
            LinkStatus::NotStarted => Err(DeviceError::NotStarted),
            _ => Err(DeviceError::NotReady),
        }
    }

    fn set_status(&self, status: LinkStatus) {
        let mut guard = self.status.lock().unwrap_or_else(|p| p.into_inner());
        if *guard != status {
            tracing::info!(from = ?*guard, to = ?status, "Device link status changed");
            *guard = status;
            let _ = self.event_tx.send(JitEvent::StatusChanged { status });
        }
    }

    fn emit_enabled(&self, target: JitTarget) -> Result<(), DeviceError> {
        tracing::info!(target = %target, "JIT enabled");
        let _ = self.event_tx.send(JitEvent::Enabled { target });
        Ok(())
    }

    fn emit_attach_failed(&self, target: JitTarget, cause: LinkError) -> Result<(), DeviceError> {
        let reason = cause.to_string();
        tracing::warn!(target = %target, reason = %reason, "JIT attach failed");
        let _ = self.event_tx.send(JitEvent::AttachFailed {
            target: target.clone(),
            reason: reason.clone(),
        });
        Err(DeviceError::AttachFailed(reason))
    }
}

impl Capability for JitGateway {
    fn name(&self) -> &str {
        "device"
    }

    fn status(&self) -> CapabilityStatus {
        let status = JitGateway::status(self);
        let (summary, healthy) = match status {
            LinkStatus::NotStarted => ("device link not started", false),
            LinkStatus::Starting => ("device link starting", false),
            LinkStatus::Ready => ("device connected", true),
            LinkStatus::NoDevice => ("link up, no device reachable", false),
            LinkStatus::NoPairingRecord => ("no pairing record", false),
            LinkStatus::Error => ("device link failed", false),
        };
        CapabilityStatus {
            name: Capability::name(self).to_string(),
            summary: summary.to_string(),
            healthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tether_common::test::unique_temp_dir;

    /// Scriptable link fake.
    #[derive(Default)]
    struct FakeLink {
        start_error: Option<&'static str>,
        device_present: AtomicBool,
        attach_fails: bool,
        started: AtomicBool,
        installed: Mutex<Vec<String>>,
    }

    impl FakeLink {
        fn with_device() -> Self {
            Self {
                device_present: AtomicBool::new(true),
                ..Self::default()
            }
        }
    }

    impl DeviceLink for FakeLink {
        fn start(&self, _record: &Path, _log: Option<&Path>) -> Result<(), LinkError> {
            match self.start_error {
                Some("pairing") => Err(LinkError::PairingRejected),
                Some(other) => Err(LinkError::Other(other.to_string())),
                None => {
                    self.started.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }
        }

        fn stop(&self) {
            self.started.store(false, Ordering::SeqCst);
        }

        fn fetch_udid(&self) -> Option<String> {
            self.device_present
                .load(Ordering::SeqCst)
                .then(|| "0000-UDID".to_string())
        }

        fn test_connection(&self) -> bool {
            self.device_present.load(Ordering::SeqCst)
        }

        fn attach_debugger_by_identifier(&self, _identifier: &str) -> Result<(), LinkError> {
            if self.attach_fails {
                return Err(LinkError::Other("debugserver refused".to_string()));
            }
            Ok(())
        }

        fn attach_debugger_by_pid(&self, _pid: u32) -> Result<(), LinkError> {
            if self.attach_fails {
                return Err(LinkError::Other("debugserver refused".to_string()));
            }
            Ok(())
        }

        fn install_app(&self, identifier: &str, _package: &Path) -> Result<(), LinkError> {
            self.installed.lock().unwrap().push(identifier.to_string());
            Ok(())
        }

        fn remove_app(&self, _identifier: &str) -> Result<(), LinkError> {
            Ok(())
        }

        fn install_provisioning_profile(&self, _profile: &[u8]) -> Result<(), LinkError> {
            Ok(())
        }

        fn remove_provisioning_profile(&self, _identifier: &str) -> Result<(), LinkError> {
            Ok(())
        }
    }

    fn pairing_dir() -> PathBuf {
        let dir = unique_temp_dir("gateway-pairing");
        std::fs::write(dir.join("pairing.plist"), b"record").unwrap();
        dir
    }

    #[test]
    fn start_without_pairing_record_never_touches_the_link() {
        let link = Arc::new(FakeLink::with_device());
        let gateway = JitGateway::new(link.clone());
        let empty = unique_temp_dir("gateway-nopair");

        let err = gateway.start(&empty).unwrap_err();
        assert!(matches!(err, DeviceError::PairingRecordMissing));
        assert_eq!(gateway.status(), LinkStatus::NoPairingRecord);
        assert!(!link.started.load(Ordering::SeqCst));
    }

    #[test]
    fn start_with_device_reaches_ready() {
        let gateway = JitGateway::new(Arc::new(FakeLink::with_device()));

        let status = gateway.start(&pairing_dir()).unwrap();
        assert_eq!(status, LinkStatus::Ready);
        assert_eq!(gateway.udid(), Some("0000-UDID".to_string()));
    }

    #[test]
    fn start_without_device_is_a_degraded_success() {
        let gateway = JitGateway::new(Arc::new(FakeLink::default()));

        let status = gateway.start(&pairing_dir()).unwrap();
        assert_eq!(status, LinkStatus::NoDevice);
    }

    #[test]
    fn device_appearing_later_flips_no_device_to_ready() {
        let link = Arc::new(FakeLink::default());
        let gateway = JitGateway::new(link.clone());

        assert_eq!(gateway.start(&pairing_dir()).unwrap(), LinkStatus::NoDevice);
        link.device_present.store(true, Ordering::SeqCst);
        assert_eq!(gateway.refresh_connection(), LinkStatus::Ready);
    }

    #[test]
    fn rejected_pairing_record_maps_to_pairing_error() {
        let gateway = JitGateway::new(Arc::new(FakeLink {
            start_error: Some("pairing"),
            ..FakeLink::default()
        }));

        let err = gateway.start(&pairing_dir()).unwrap_err();
        assert!(matches!(err, DeviceError::PairingRecordMissing));
        assert_eq!(gateway.status(), LinkStatus::NoPairingRecord);
    }

    #[test]
    fn stop_is_safe_before_start_and_resets_state() {
        let gateway = JitGateway::new(Arc::new(FakeLink::with_device()));
        gateway.stop();
        assert_eq!(gateway.status(), LinkStatus::NotStarted);

        gateway.start(&pairing_dir()).unwrap();
        gateway.stop();
        assert_eq!(gateway.status(), LinkStatus::NotStarted);
    }

    #[test]
    fn jit_before_start_is_not_started() {
        let gateway = JitGateway::new(Arc::new(FakeLink::with_device()));
        assert!(matches!(
            gateway.enable_jit("org.example.demo"),
            Err(DeviceError::NotStarted)
        ));
    }

    #[test]
    fn jit_without_device_is_not_ready() {
        let gateway = JitGateway::new(Arc::new(FakeLink::default()));
        gateway.start(&pairing_dir()).unwrap();

        assert!(matches!(
            gateway.enable_jit("org.example.demo"),
            Err(DeviceError::NotReady)
        ));
    }

    #[test]
    fn successful_attach_broadcasts_enabled() {
        let gateway = JitGateway::new(Arc::new(FakeLink::with_device()));
        gateway.start(&pairing_dir()).unwrap();
        let mut events = gateway.subscribe();

        gateway.enable_jit("org.example.demo").unwrap();

        // Skip nothing: subscription happened after the start events.
        let event = events.try_recv().unwrap();
        assert!(matches!(
            event,
            JitEvent::Enabled { target: JitTarget::Identifier(ref id) } if id == "org.example.demo"
        ));
    }

    #[test]
    fn failed_attach_broadcasts_and_errors() {
        let gateway = JitGateway::new(Arc::new(FakeLink {
            device_present: AtomicBool::new(true),
            attach_fails: true,
            ..FakeLink::default()
        }));
        gateway.start(&pairing_dir()).unwrap();
        let mut events = gateway.subscribe();

        let err = gateway.enable_jit_for_pid(4242).unwrap_err();
        assert!(matches!(err, DeviceError::AttachFailed(_)));

        let event = events.try_recv().unwrap();
        assert!(matches!(
            event,
            JitEvent::AttachFailed { target: JitTarget::Pid(4242), .. }
        ));
        // A failed attach does not degrade the link.
        assert_eq!(gateway.status(), LinkStatus::Ready);
    }

    #[test]
    fn install_pass_through_requires_ready() {
        let link = Arc::new(FakeLink::with_device());
        let gateway = JitGateway::new(link.clone());
        let package = unique_temp_dir("gateway-pkg");

        assert!(matches!(
            gateway.install_app("org.example.demo", &package),
            Err(DeviceError::NotStarted)
        ));

        gateway.start(&pairing_dir()).unwrap();
        gateway.install_app("org.example.demo", &package).unwrap();
        assert_eq!(
            link.installed.lock().unwrap().as_slice(),
            &["org.example.demo".to_string()]
        );
    }

    #[test]
    fn capability_status_tracks_the_state_machine() {
        let gateway = JitGateway::new(Arc::new(FakeLink::with_device()));

        let status = Capability::status(&gateway);
        assert_eq!(status.name, "device");
        assert!(!status.healthy);

        gateway.start(&pairing_dir()).unwrap();
        assert!(Capability::status(&gateway).healthy);
    }

    #[test]
    fn error_codes_stay_typed() {
        assert_eq!(
            ErrorCode::from(&DeviceError::NotStarted),
            ErrorCode::DeviceNotStarted
        );
        assert_eq!(
            ErrorCode::from(&DeviceError::NotReady),
            ErrorCode::DeviceNotReady
        );
        assert_eq!(
            ErrorCode::from(&DeviceError::PairingRecordMissing),
            ErrorCode::PairingRecordMissing
        );
        assert_eq!(
            ErrorCode::from(&DeviceError::AttachFailed("x".into())),
            ErrorCode::AttachFailed
        );
    }
}
