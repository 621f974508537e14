use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

pub fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("resources")
        .join("test-fixtures")
}

pub fn golden_root() -> PathBuf {
    fixtures_root().join("golden")
}

pub fn load_golden(relative_path: &str) -> io::Result<Vec<u8>> {
    fs::read(golden_root().join(relative_path))
}

pub fn load_golden_text(relative_path: &str) -> io::Result<String> {
    fs::read_to_string(golden_root().join(relative_path))
}

pub fn load_golden_json<T: DeserializeOwned>(relative_path: &str) -> io::Result<T> {
    let bytes = load_golden(relative_path)?;
    serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
