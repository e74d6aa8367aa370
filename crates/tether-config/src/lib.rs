//! Configuration and persisted runtime state for Tether.

pub mod dirs;
pub mod policy;
pub mod state;
