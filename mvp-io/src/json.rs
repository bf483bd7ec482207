use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{IoError, Result};

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize to pretty JSON, creating parent directories as needed
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| IoError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, json).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}
