//! Helpers shared by tests across the workspace.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-wide data directory under the system temp dir, exported via
/// `TETHER_DATA_DIR` so every crate's persistence lands in the same
/// throwaway location during tests.
pub fn ensure_data_dir(prefix: &str) -> PathBuf {
    static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

    DATA_DIR
        .get_or_init(|| {
            let base = if let Ok(existing) = std::env::var("TETHER_DATA_DIR") {
                PathBuf::from(existing)
            } else {
                let base =
                    std::env::temp_dir().join(format!("{}-{}", prefix, std::process::id()));
                std::env::set_var("TETHER_DATA_DIR", &base);
                base
            };

            let _ = std::fs::create_dir_all(&base);
            base
        })
        .clone()
}

/// Fresh directory unique to the calling test, for state that must not
/// be shared between concurrently running tests.
pub fn unique_temp_dir(name: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("tether-{name}-{nanos}-{seq}"));
    let _ = std::fs::create_dir_all(&dir);
    dir
}
