//! Persisted runtime state for the signing lifecycle.
//!
//! The state file records when the active certificate expires and when
//! the scheduler should run next, so both survive process restarts.
//! All functions take an explicit path; callers that want the default
//! location use [`signing_state_path`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tether_common::{paths, persist};

/// Signing lifecycle state persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SigningState {
    /// When the active certificate stops being usable. `None` means no
    /// certificate has been issued yet.
    #[serde(default)]
    pub certificate_expires_at: Option<DateTime<Utc>>,
    /// When the last successful refresh cycle completed.
    #[serde(default)]
    pub last_refresh: Option<DateTime<Utc>>,
    /// Earliest instant the scheduler should attempt the next cycle.
    #[serde(default)]
    pub next_refresh_after: Option<DateTime<Utc>>,
}

/// Default path of the signing state file.
pub fn signing_state_path() -> PathBuf {
    paths::tether_state_dir().join("signing.json")
}

/// Load signing state from disk. Returns default state if missing.
pub fn load_signing_state(path: &Path) -> Result<SigningState, std::io::Error> {
    persist::load_json_or_default(path)
}

/// Save signing state to disk, creating the state directory if needed.
pub fn save_signing_state(path: &Path, state: &SigningState) -> Result<(), std::io::Error> {
    persist::store_json(path, state)
}

/// Apply a mutation to the persisted state in one load/store pass.
pub fn update_signing_state(
    path: &Path,
    mutate: impl FnOnce(&mut SigningState),
) -> Result<SigningState, std::io::Error> {
    let mut state = load_signing_state(path)?;
    mutate(&mut state);
    save_signing_state(path, &state)?;
    Ok(state)
}
