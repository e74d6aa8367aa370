//! Pairing record discovery.
//!
//! The link cannot start without a pairing record. Several tools write
//! them under different names, so discovery probes the well-known
//! candidates in a fixed preference order.

use std::path::{Path, PathBuf};

/// Candidate file names, most specific first.
pub const PAIRING_FILE_NAMES: [&str; 3] = [
    "ALTPairingFile.mobiledevicepairing",
    "pairing_file.plist",
    "pairing.plist",
];

/// Default directory scanned for pairing records.
pub fn default_pairing_dir() -> PathBuf {
    tether_common::paths::tether_pairing_dir()
}

/// First existing candidate in `dir`, or `None` if there is no usable
/// pairing record.
pub fn discover_pairing_record(dir: &Path) -> Option<PathBuf> {
    for name in PAIRING_FILE_NAMES {
        let candidate = dir.join(name);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "Found pairing record");
            return Some(candidate);
        }
    }
    None
}
