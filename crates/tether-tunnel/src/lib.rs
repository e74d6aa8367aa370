//! Controller for the loopback relay process.
//!
//! The relay itself is an opaque external process behind the
//! [`TunnelProcess`] trait; this crate owns start/stop ordering, the
//! post-start connectivity probe, and the connected flag the rest of
//! the system reads. Account sign-in elsewhere in the workspace is
//! refused while the tunnel is up because the relay intercepts the
//! portal's traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tether_common::capability::{Capability, CapabilityStatus};
use tether_common::error::ErrorCode;
use tether_config::policy::TunnelPolicy;

/// The opaque relay process. Status codes follow process conventions:
/// zero is success.
pub trait TunnelProcess: Send + Sync {
    /// Launch the relay bound to `bind_address`.
    fn start(&self, bind_address: &str) -> i32;

    /// Terminate the relay. Must tolerate being called when the relay
    /// never started.
    fn stop(&self);

    /// Probe end-to-end connectivity through the relay, giving up
    /// after `timeout_ms`.
    fn test(&self, timeout_ms: u64) -> i32;
}

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("tunnel process failed to start (status {0})")]
    StartFailed(i32),
    #[error("tunnel connectivity test failed within {0} ms")]
    TestFailed(u64),
}

impl From<&TunnelError> for ErrorCode {
    fn from(err: &TunnelError) -> Self {
        match err {
            TunnelError::StartFailed(_) => ErrorCode::TunnelStartFailed,
            TunnelError::TestFailed(_) => ErrorCode::TunnelTestFailed,
        }
    }
}

pub struct TunnelController {
    process: Arc<dyn TunnelProcess>,
    policy: TunnelPolicy,
    started: AtomicBool,
    connected: AtomicBool,
}

impl TunnelController {
    pub fn new(process: Arc<dyn TunnelProcess>, policy: TunnelPolicy) -> Self {
        Self {
            process,
            policy,
            started: AtomicBool::new(false),
            connected: AtomicBool::new(false),
        }
    }

    pub fn bind_address(&self) -> &str {
        &self.policy.bind_address
    }

    /// Whether traffic is currently flowing through the relay.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Start the relay and verify connectivity through it. A relay
    /// that starts but fails its probe is stopped again; it must not
    /// linger half-working on the loopback port.
    pub fn start(&self) -> Result<(), TunnelError> {
        let status = self.process.start(&self.policy.bind_address);
        if status != 0 {
            tracing::error!(status, bind = %self.policy.bind_address, "Tunnel failed to start");
            return Err(TunnelError::StartFailed(status));
        }
        self.started.store(true, Ordering::Release);
        tracing::info!(bind = %self.policy.bind_address, "Tunnel started");

        if !self.test() {
            tracing::warn!("Tunnel connectivity test failed, stopping relay");
            self.stop();
            return Err(TunnelError::TestFailed(self.policy.test_timeout_ms));
        }
        Ok(())
    }

    /// Stop the relay. Idempotent and safe before any start.
    pub fn stop(&self) {
        if self.started.swap(false, Ordering::AcqRel) {
            self.process.stop();
            tracing::info!("Tunnel stopped");
        }
        self.connected.store(false, Ordering::Release);
    }

    /// Probe connectivity and update the connected flag.
    pub fn test(&self) -> bool {
        let ok = self.process.test(self.policy.test_timeout_ms) == 0;
        self.connected.store(ok, Ordering::Release);
        ok
    }

    /// Mirror an externally observed tunnel state, for hosts whose
    /// platform reports the relay's lifecycle itself.
    pub fn set_observed_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

impl Capability for TunnelController {
    fn name(&self) -> &str {
        "tunnel"
    }

    fn status(&self) -> CapabilityStatus {
        let (summary, healthy) = if self.is_connected() {
            (format!("relaying on {}", self.policy.bind_address), true)
        } else if self.is_started() {
            ("started, not connected".to_string(), false)
        } else {
            ("stopped".to_string(), true)
        };
        CapabilityStatus {
            name: self.name().to_string(),
            summary,
            healthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeProcess {
        start_status: i32,
        test_status: i32,
        starts: Mutex<Vec<String>>,
        stops: AtomicUsize,
    }

    impl TunnelProcess for FakeProcess {
        fn start(&self, bind_address: &str) -> i32 {
            self.starts.lock().unwrap().push(bind_address.to_string());
            self.start_status
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn test(&self, _timeout_ms: u64) -> i32 {
            self.test_status
        }
    }

    fn controller(process: Arc<FakeProcess>) -> TunnelController {
        TunnelController::new(process, TunnelPolicy::default())
    }

    #[test]
    fn start_binds_the_default_loopback_address() {
        let process = Arc::new(FakeProcess::default());
        let tunnel = controller(process.clone());

        tunnel.start().unwrap();

        assert_eq!(
            process.starts.lock().unwrap().as_slice(),
            &["127.0.0.1:65399".to_string()]
        );
        assert!(tunnel.is_connected());
        assert!(tunnel.is_started());
    }

    #[test]
    fn failed_launch_is_start_failed() {
        let tunnel = controller(Arc::new(FakeProcess {
            start_status: 3,
            ..FakeProcess::default()
        }));

        let err = tunnel.start().unwrap_err();
        assert!(matches!(err, TunnelError::StartFailed(3)));
        assert!(!tunnel.is_started());
        assert!(!tunnel.is_connected());
    }

    #[test]
    fn failed_probe_stops_the_relay_again() {
        let process = Arc::new(FakeProcess {
            test_status: 1,
            ..FakeProcess::default()
        });
        let tunnel = controller(process.clone());

        let err = tunnel.start().unwrap_err();
        assert!(matches!(err, TunnelError::TestFailed(5000)));
        assert_eq!(process.stops.load(Ordering::SeqCst), 1);
        assert!(!tunnel.is_started());
        assert!(!tunnel.is_connected());
    }

    #[test]
    fn stop_is_idempotent_and_safe_before_start() {
        let process = Arc::new(FakeProcess::default());
        let tunnel = controller(process.clone());

        tunnel.stop();
        assert_eq!(process.stops.load(Ordering::SeqCst), 0);

        tunnel.start().unwrap();
        tunnel.stop();
        tunnel.stop();
        assert_eq!(process.stops.load(Ordering::SeqCst), 1);
        assert!(!tunnel.is_connected());
    }

    #[test]
    fn observed_state_mirrors_into_the_flag() {
        let tunnel = controller(Arc::new(FakeProcess::default()));

        tunnel.set_observed_connected(true);
        assert!(tunnel.is_connected());
        tunnel.set_observed_connected(false);
        assert!(!tunnel.is_connected());
    }

    #[test]
    fn capability_summary_follows_the_connection() {
        let tunnel = controller(Arc::new(FakeProcess::default()));

        let status = tunnel.status();
        assert_eq!(status.name, "tunnel");
        assert_eq!(status.summary, "stopped");
        assert!(status.healthy);

        tunnel.start().unwrap();
        let status = tunnel.status();
        assert!(status.summary.contains("127.0.0.1:65399"));
        assert!(status.healthy);
    }

    #[test]
    fn error_codes_stay_typed() {
        assert_eq!(
            ErrorCode::from(&TunnelError::StartFailed(1)),
            ErrorCode::TunnelStartFailed
        );
        assert_eq!(
            ErrorCode::from(&TunnelError::TestFailed(5000)),
            ErrorCode::TunnelTestFailed
        );
    }
}
