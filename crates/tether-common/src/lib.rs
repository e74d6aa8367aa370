//! Shared plumbing for the Tether workspace: data directory layout,
//! atomic JSON persistence, machine-readable error codes, the
//! capability status trait, and the secret store abstraction.

pub mod capability;
pub mod error;
pub mod paths;
pub mod persist;
pub mod secrets;
pub mod test;
