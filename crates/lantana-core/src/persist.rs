//! Bundle files.
//!
//! Bundles are written as pretty-printed JSON through a temp file in the
//! destination directory, synced and then renamed over the target, so a
//! reader never observes a half-written bundle.

use std::io::Write;
use std::path::Path;

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::bundle::Bundle;
use crate::error::Result;

/// Default bundle file name.
pub const DEFAULT_BUNDLE_PATH: &str = "triple_signature_bundle.json";

/// Write `bundle` to `path`, replacing any existing file.
pub fn write_bundle(path: impl AsRef<Path>, bundle: &Bundle) -> Result<()> {
    let path = path.as_ref();
    let json = bundle.to_json_pretty()?;
    atomic_write(path, json.as_bytes())?;
    tracing::info!(path = %path.display(), cid = %bundle.content_id, "✓ bundle written");
    Ok(())
}

/// Read a bundle file as an untyped document, for verification.
pub fn read_document(path: impl AsRef<Path>) -> Result<Value> {
    let text = std::fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&text)?)
}

/// Read and parse a bundle file.
pub fn load_bundle(path: impl AsRef<Path>) -> Result<Bundle> {
    let text = std::fs::read_to_string(path.as_ref())?;
    Bundle::from_json(&text)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleBuilder;
    use crate::clock::{Clock, FixedClock};
    use crate::config::BuildConfig;
    use crate::error::Error;
    use crate::node::default_nodes;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn bundle() -> Bundle {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        ));
        BundleBuilder::new(BuildConfig::default(), clock)
            .unwrap()
            .build(&[], &default_nodes())
            .unwrap()
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let bundle = bundle();

        write_bundle(&path, &bundle).unwrap();
        assert_eq!(load_bundle(&path).unwrap(), bundle);

        let doc = read_document(&path).unwrap();
        assert_eq!(doc["content_id"], bundle.content_id.as_str());
    }

    #[test]
    fn overwrite_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        std::fs::write(&path, "old contents").unwrap();

        write_bundle(&path, &bundle()).unwrap();
        assert!(load_bundle(&path).is_ok());

        // Only the bundle remains; the temp file was renamed away.
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_document(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn garbage_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(read_document(&path), Err(Error::Serialization(_))));
    }
}
