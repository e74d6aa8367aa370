//! Developer account sessions, the seven day
//! certificate lifecycle, App ID and provisioning profile management,
//! and the orchestrated re-sign pipeline with its five day refresh
//! scheduler.
//!
//! Network access to the developer services portal and the actual
//! cryptographic re-sign step are behind traits ([`api::DeveloperServices`],
//! [`api::IdentityService`], [`api::BundleSigner`]); this crate owns the
//! lifecycle decisions around them.

pub mod account;
pub mod api;
pub mod bundle;
pub mod certificate;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod refresh;

pub use account::AccountManager;
pub use certificate::{Certificate, CertificateManager};
pub use error::{NetworkFailure, SigningError};
pub use orchestrator::{SignedApp, SigningOrchestrator, SigningProgress};
pub use refresh::{RefreshOutcome, RefreshScheduler};
