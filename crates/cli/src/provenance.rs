use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::ffi::OsString;
use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Command;

/// What produced an artifact: the parameters and the files it was derived from.
pub struct Payload {
    pub params: Value,
    pub inputs: Vec<String>,
}

impl Payload {
    pub fn new(params: Value) -> Self {
        Self {
            params,
            inputs: Vec::new(),
        }
    }

    pub fn with_input<P: AsRef<Path>>(mut self, input: P) -> Self {
        self.inputs
            .push(input.as_ref().to_string_lossy().into_owned());
        self
    }
}

/// Provenance block without call site; shared by sidecars and `report`.
pub fn block(payload: &Payload, outputs: &[&Path]) -> Value {
    let outputs: Vec<String> = outputs
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    json!({
        "code_rev": current_git_rev(),
        "version": phosphene::VERSION,
        "inputs": payload.inputs,
        "params": payload.params,
        "outputs": outputs
    })
}

/// Write `<artifact>.provenance.json` next to `artifact`.
#[track_caller]
pub fn write_sidecar<P: AsRef<Path>>(artifact: P, payload: Payload) -> Result<PathBuf> {
    let callsite = Location::caller();
    let artifact = artifact.as_ref();
    let provenance_path = provenance_path(artifact);
    ensure_parent(&provenance_path)?;

    let mut doc = block(&payload, &[artifact]);
    doc["callsite"] = json!({
        "file": callsite.file(),
        "line": callsite.line()
    });
    fs::write(&provenance_path, serde_json::to_vec_pretty(&doc)?)
        .with_context(|| format!("writing {}", provenance_path.display()))?;
    tracing::debug!(path = %provenance_path.display(), "provenance written");
    Ok(provenance_path)
}

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    Ok(())
}

fn provenance_path(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("artifact"));
    name.push(".provenance.json");
    artifact.with_file_name(name)
}

pub fn current_git_rev() -> String {
    if let Some(from_env) = option_env!("GIT_COMMIT") {
        if !from_env.is_empty() {
            return from_env.to_string();
        }
    }
    if let Ok(env_override) = std::env::var("GIT_COMMIT") {
        if !env_override.is_empty() {
            return env_override;
        }
    }
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
