use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Load a JSON configuration; missing fields (or a missing file argument)
/// fall back to the defaults.
pub fn load<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let raw = fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing config {}", path.display()))
}
