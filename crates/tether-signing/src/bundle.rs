//! App bundle loading.
//!
//! Accepts either an unpacked `.app` directory or an `.ipa` archive.
//! Archives are unpacked into a per-run staging directory; the caller
//! receives the `.app` path inside it and the identity read from the
//! bundle's `Info.plist`.

use std::fs::File;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::SigningError;

/// A loaded, unpacked app bundle ready for signing.
#[derive(Debug, Clone)]
pub struct AppBundle {
    /// Display name from the bundle metadata.
    pub name: String,
    /// The identifier the app shipped with, before containerization.
    pub source_identifier: String,
    /// Path of the unpacked `.app` directory.
    pub location: PathBuf,
    /// Staging root holding the unpacked archive, `None` for bundles
    /// loaded from an `.app` directory in place.
    pub staging: Option<PathBuf>,
}

impl AppBundle {
    /// Remove the staging directory behind an unpacked archive. A
    /// bundle loaded from an `.app` directory in place is untouched.
    pub fn discard(&self) {
        if let Some(staging) = &self.staging {
            if let Err(e) = std::fs::remove_dir_all(staging) {
                tracing::warn!(
                    path = %staging.display(),
                    error = %e,
                    "Could not remove staging directory"
                );
            }
        }
    }
}

/// Load a bundle from an `.ipa` archive or an `.app` directory.
pub fn load_bundle(source: &Path) -> Result<AppBundle, SigningError> {
    match source.extension().and_then(|e| e.to_str()) {
        Some("ipa") => {
            let staging = unpack_archive(source)?;
            let app_dir = find_payload_app(&staging)?;
            let mut bundle = read_app_dir(&app_dir)?;
            bundle.staging = Some(staging);
            Ok(bundle)
        }
        Some("app") if source.is_dir() => read_app_dir(source),
        _ => Err(SigningError::InvalidBundle(format!(
            "{} is neither an .ipa archive nor an .app directory",
            source.display()
        ))),
    }
}

/// Staging directory for unpacked archives. One directory per run so
/// concurrent loads never collide.
fn staging_dir() -> PathBuf {
    std::env::temp_dir()
        .join("tether-staging")
        .join(Uuid::new_v4().to_string())
}

fn unpack_archive(source: &Path) -> Result<PathBuf, SigningError> {
    let dest = staging_dir();
    std::fs::create_dir_all(&dest)?;

    let file = File::open(source)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| SigningError::InvalidBundle(format!("could not open archive: {e}")))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| SigningError::InvalidBundle(format!("corrupt archive entry: {e}")))?;
        // Entries with traversal components are skipped outright.
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = %entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let out_path = dest.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }
    Ok(dest)
}

/// Locate the single `.app` directory under `Payload/`.
fn find_payload_app(staging: &Path) -> Result<PathBuf, SigningError> {
    let payload = staging.join("Payload");
    if !payload.is_dir() {
        return Err(SigningError::InvalidBundle(
            "archive has no Payload directory".to_string(),
        ));
    }
    for entry in std::fs::read_dir(&payload)? {
        let path = entry?.path();
        if path.is_dir() && path.extension().and_then(|e| e.to_str()) == Some("app") {
            return Ok(path);
        }
    }
    Err(SigningError::InvalidBundle(
        "archive's Payload directory contains no .app bundle".to_string(),
    ))
}

fn read_app_dir(app_dir: &Path) -> Result<AppBundle, SigningError> {
    let info_path = app_dir.join("Info.plist");
    let info = plist::Value::from_file(&info_path).map_err(|e| {
        SigningError::InvalidBundle(format!("could not read {}: {e}", info_path.display()))
    })?;
    let dict = info.as_dictionary().ok_or_else(|| {
        SigningError::InvalidBundle("Info.plist root is not a dictionary".to_string())
    })?;

    let source_identifier = dict
        .get("CFBundleIdentifier")
        .and_then(|v| v.as_string())
        .ok_or_else(|| {
            SigningError::InvalidBundle("Info.plist has no CFBundleIdentifier".to_string())
        })?
        .to_string();

    let name = dict
        .get("CFBundleDisplayName")
        .or_else(|| dict.get("CFBundleName"))
        .and_then(|v| v.as_string())
        .map(str::to_string)
        .unwrap_or_else(|| {
            app_dir
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "App".to_string())
        });

    Ok(AppBundle {
        name,
        staging: None,
        source_identifier,
        location: app_dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tether_common::test::unique_temp_dir;
    use zip::write::SimpleFileOptions;

    const INFO_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>org.example.demo</string>
    <key>CFBundleName</key>
    <string>Demo</string>
</dict>
</plist>
"#;

    fn write_app_dir(root: &Path) -> PathBuf {
        let app = root.join("Demo.app");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("Info.plist"), INFO_PLIST).unwrap();
        app
    }

    fn write_ipa(root: &Path) -> PathBuf {
        let path = root.join("Demo.ipa");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        writer
            .start_file("Payload/Demo.app/Info.plist", options)
            .unwrap();
        writer.write_all(INFO_PLIST.as_bytes()).unwrap();
        writer.start_file("Payload/Demo.app/Demo", options).unwrap();
        writer.write_all(b"binary").unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn loads_an_app_directory() {
        let root = unique_temp_dir("bundle-app");
        let app = write_app_dir(&root);

        let bundle = load_bundle(&app).unwrap();
        assert_eq!(bundle.name, "Demo");
        assert_eq!(bundle.source_identifier, "org.example.demo");
        assert_eq!(bundle.location, app);
        assert!(bundle.staging.is_none());
    }

    #[test]
    fn unpacks_an_ipa_archive() {
        let root = unique_temp_dir("bundle-ipa");
        let ipa = write_ipa(&root);

        let bundle = load_bundle(&ipa).unwrap();
        assert_eq!(bundle.source_identifier, "org.example.demo");
        assert!(bundle.location.ends_with("Demo.app"));
        assert!(bundle.location.join("Info.plist").exists());
        assert!(bundle.location.join("Demo").exists());
        assert!(bundle.staging.is_some());
    }

    #[test]
    fn discard_removes_unpacked_archive_but_not_source_dirs() {
        let root = unique_temp_dir("bundle-discard");
        let ipa = write_ipa(&root);

        let bundle = load_bundle(&ipa).unwrap();
        assert!(bundle.location.exists());
        bundle.discard();
        assert!(!bundle.location.exists());

        let app = write_app_dir(&root);
        let bundle = load_bundle(&app).unwrap();
        bundle.discard();
        assert!(app.join("Info.plist").exists());
    }

    #[test]
    fn rejects_unknown_sources() {
        let root = unique_temp_dir("bundle-bad");
        let stray = root.join("readme.txt");
        std::fs::write(&stray, "not an app").unwrap();

        assert!(matches!(
            load_bundle(&stray),
            Err(SigningError::InvalidBundle(_))
        ));
    }

    #[test]
    fn rejects_archive_without_payload() {
        let root = unique_temp_dir("bundle-nopayload");
        let path = root.join("Empty.ipa");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("README.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"nothing here").unwrap();
        writer.finish().unwrap();

        assert!(matches!(
            load_bundle(&path),
            Err(SigningError::InvalidBundle(_))
        ));
    }

    #[test]
    fn rejects_bundle_without_identifier() {
        let root = unique_temp_dir("bundle-noid");
        let app = root.join("Broken.app");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(
            app.join("Info.plist"),
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0"><dict><key>CFBundleName</key><string>Broken</string></dict></plist>
"#,
        )
        .unwrap();

        assert!(matches!(
            load_bundle(&app),
            Err(SigningError::InvalidBundle(_))
        ));
    }
}
