use crate::core::{CollectionError, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write a payload atomically: temp file in the same directory, fsync, rename.
pub fn save_payload<P: AsRef<Path>>(path: P, payload: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .map_err(|e| CollectionError::Io(format!("Failed to create payload directory: {}", e)))?;

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| CollectionError::Io(format!("Failed to create temp file: {}", e)))?;
    temp.write_all(payload)
        .map_err(|e| CollectionError::Io(format!("Failed to write payload: {}", e)))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| CollectionError::Io(format!("Failed to sync payload: {}", e)))?;
    temp.persist(path)
        .map_err(|e| CollectionError::Io(format!("Failed to rename payload: {}", e.error)))?;
    Ok(())
}

pub fn load_payload<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| {
        CollectionError::Io(format!("Failed to read payload {}: {}", path.display(), e))
    })
}
