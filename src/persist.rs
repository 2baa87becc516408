//! JSON file persistence with temp-file-then-rename writes

use crate::error::{ControlError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Read and parse a JSON file. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| ControlError::read_file(path, e))?;
    let value = serde_json::from_str(&content).map_err(|e| ControlError::parse(path, e))?;
    Ok(Some(value))
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// Parent directories are created. The data goes to a uniquely named sibling
/// first and is renamed over the target, so readers see either the old or the
/// new file, never a truncated one.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes())
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| ControlError::create_dir(dir, e))?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    let tmp = path.with_file_name(format!(
        ".{}.{}.tmp",
        file_name,
        uuid::Uuid::new_v4().simple()
    ));

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(ControlError::write_file(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.json");
        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();

        let back: Option<Vec<i32>> = read_json(&path).unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_overwrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        for i in 0..5 {
            let mut doc = BTreeMap::new();
            doc.insert("n", i);
            write_json_atomic(&path, &doc).unwrap();
        }

        let back: BTreeMap<String, i32> = read_json(&path).unwrap().unwrap();
        assert_eq!(back["n"], 4);
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_missing_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let back: Option<Vec<i32>> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(back.is_none());
    }

    #[test]
    fn test_corrupt_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "[1, 2").unwrap();
        let result: Result<Option<Vec<i32>>> = read_json(&path);
        assert!(matches!(result, Err(ControlError::Parse { .. })));
    }
}
