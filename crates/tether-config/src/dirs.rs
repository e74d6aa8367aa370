//! Tether data directory initialization.
//!
//! Ensures the `~/.tether/` directory structure exists and contains a
//! default `config.toml` if not already present. Called once during
//! startup.

use tether_common::paths;

/// Default content for a freshly created config.toml.
const DEFAULT_CONFIG_TOML: &str = "\
# Tether configuration

# [signing]
# certificate_quota = 2
# certificate_lifetime_days = 7
# refresh_margin_days = 2
# refresh_interval_days = 5

# [tunnel]
# bind_address = \"127.0.0.1:65399\"
# test_timeout_ms = 5000
";

/// Ensure the Tether data directory structure exists.
///
/// Creates:
/// - `~/.tether/` (or platform equivalent)
/// - `~/.tether/config.toml` (if not already present)
/// - `~/.tether/state/`
/// - `~/.tether/secrets/`
/// - `~/.tether/pairing/`
/// - `~/.tether/logs/`
///
/// Errors are logged but not fatal; most commands can still run
/// without a data directory.
pub fn ensure_data_dir() {
    let data_dir = paths::tether_data_dir();

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::warn!(
            path = %data_dir.display(),
            error = %e,
            "Could not create data directory"
        );
        return;
    }

    // Subdirectories
    for subdir in &["state", "secrets", "pairing", "logs"] {
        let path = data_dir.join(subdir);
        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not create subdirectory"
            );
        }
    }

    // Default config.toml (only if absent)
    let config_path = data_dir.join("config.toml");
    if !config_path.exists() {
        match std::fs::write(&config_path, DEFAULT_CONFIG_TOML) {
            Ok(()) => tracing::debug!(path = %config_path.display(), "Created default config"),
            Err(e) => tracing::warn!(
                path = %config_path.display(),
                error = %e,
                "Could not write default config"
            ),
        }
    }
}

/// Path to the user-editable configuration file.
pub fn config_path() -> std::path::PathBuf {
    paths::tether_data_dir().join("config.toml")
}
