use std::path::PathBuf;

/// Root data directory for Tether.
///
/// All Tether data is machine-local (account state, signing state,
/// secrets, logs). None of it should roam across machines.
///
/// - Linux: `~/.tether/`
/// - macOS: `~/Library/Application Support/tether/`
/// - Windows: `%LOCALAPPDATA%\tether\`
///
/// `TETHER_DATA_DIR` overrides the platform default when set. Tests
/// rely on this to redirect all persistence into a throwaway directory.
pub fn tether_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("TETHER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("tether");
        }
    }

    #[cfg(windows)]
    {
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            return PathBuf::from(local).join("tether");
        }
    }

    #[cfg(not(any(target_os = "macos", windows)))]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".tether");
        }
    }

    // Fallback
    PathBuf::from(".tether")
}

/// Runtime state directory (signing state, refresh schedule).
pub fn tether_state_dir() -> PathBuf {
    tether_data_dir().join("state")
}

/// Log directory.
pub fn tether_log_dir() -> PathBuf {
    tether_data_dir().join("logs")
}

/// Secret storage directory (certificate private material, tokens).
pub fn tether_secrets_dir() -> PathBuf {
    tether_data_dir().join("secrets")
}

/// Directory scanned for device pairing records.
pub fn tether_pairing_dir() -> PathBuf {
    tether_data_dir().join("pairing")
}
