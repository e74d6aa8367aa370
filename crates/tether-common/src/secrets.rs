//! Secret storage for credential material.
//!
//! The signing domain keeps its certificate private key, serial number
//! and machine identifier here rather than alongside the plain state
//! files. The trait exists so embedding hosts can route these values
//! into a platform keystore; the file-backed implementation is what
//! the CLI uses.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use zeroize::Zeroizing;

/// Key/value store for secrets, namespaced per domain.
///
/// Values are returned as [`Zeroizing`] buffers so credential bytes are
/// wiped when the caller drops them.
pub trait SecretStore: Send + Sync {
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> io::Result<()>;
    fn get(&self, namespace: &str, key: &str) -> io::Result<Option<Zeroizing<Vec<u8>>>>;
    fn delete(&self, namespace: &str, key: &str) -> io::Result<()>;
}

/// File-backed secret store rooted at the Tether secrets directory.
///
/// One file per key, `0600` on Unix. This is deliberately simple; hosts
/// that have a real keystore should supply their own implementation.
pub struct FileSecretStore {
    root: PathBuf,
}

impl FileSecretStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn open_default() -> Self {
        Self::new(crate::paths::tether_secrets_dir())
    }

    fn entry_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.root.join(namespace).join(key)
    }
}

impl SecretStore for FileSecretStore {
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> io::Result<()> {
        let path = self.entry_path(namespace, key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &path)
    }

    fn get(&self, namespace: &str, key: &str) -> io::Result<Option<Zeroizing<Vec<u8>>>> {
        let path = self.entry_path(namespace, key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(Zeroizing::new(bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn delete(&self, namespace: &str, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.entry_path(namespace, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> io::Result<()> {
        self.entries
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "secret store poisoned"))?
            .insert((namespace.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> io::Result<Option<Zeroizing<Vec<u8>>>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "secret store poisoned"))?
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
            .map(Zeroizing::new))
    }

    fn delete(&self, namespace: &str, key: &str) -> io::Result<()> {
        self.entries
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "secret store poisoned"))?
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::unique_temp_dir;

    #[test]
    fn file_store_roundtrips_and_deletes() {
        let store = FileSecretStore::new(unique_temp_dir("secrets"));

        store.put("signing", "p12Data", b"pkcs12 bytes").unwrap();
        let value = store.get("signing", "p12Data").unwrap().unwrap();
        assert_eq!(value.as_slice(), b"pkcs12 bytes");

        store.delete("signing", "p12Data").unwrap();
        assert!(store.get("signing", "p12Data").unwrap().is_none());
    }

    #[test]
    fn file_store_missing_key_reads_as_none() {
        let store = FileSecretStore::new(unique_temp_dir("secrets-missing"));
        assert!(store.get("signing", "serialNumber").unwrap().is_none());
    }

    #[test]
    fn delete_of_absent_key_is_not_an_error() {
        let store = FileSecretStore::new(unique_temp_dir("secrets-delete"));
        store.delete("signing", "never-written").unwrap();
    }

    #[test]
    fn namespaces_do_not_collide() {
        let store = MemorySecretStore::new();
        store.put("a", "key", b"one").unwrap();
        store.put("b", "key", b"two").unwrap();

        assert_eq!(store.get("a", "key").unwrap().unwrap().as_slice(), b"one");
        assert_eq!(store.get("b", "key").unwrap().unwrap().as_slice(), b"two");
    }

    #[cfg(unix)]
    #[test]
    fn file_store_entries_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let root = unique_temp_dir("secrets-mode");
        let store = FileSecretStore::new(root.clone());
        store.put("signing", "p12Data", b"secret").unwrap();

        let mode = std::fs::metadata(root.join("signing").join("p12Data"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
