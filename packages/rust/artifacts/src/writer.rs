//! Atomic artifact writing and the run manifest.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use submerge_shared::{Result, RunId, SubmergeError};

/// One file to write into the output directory.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub filename: String,
    pub content: String,
}

impl Artifact {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// Metadata recorded for every written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest<'a, S: Serialize> {
    pub run_id: RunId,
    pub tool_version: &'a str,
    pub generated_at: DateTime<Utc>,
    pub stats: &'a S,
    pub artifacts: &'a [ArtifactMeta],
}

/// Write every artifact into `out_dir`, creating it if needed.
///
/// Each file is written to a hidden temp file first, then renamed over the
/// target, so readers never see a half-written subscription.
#[instrument(skip_all, fields(out_dir = %out_dir.display(), artifact_count = artifacts.len()))]
pub fn write_artifacts(out_dir: &Path, artifacts: &[Artifact]) -> Result<Vec<ArtifactMeta>> {
    std::fs::create_dir_all(out_dir).map_err(|e| SubmergeError::io(out_dir, e))?;

    let mut metas = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        validate_filename(&artifact.filename)?;
        write_atomic(out_dir, &artifact.filename, &artifact.content)?;

        let mut hasher = Sha256::new();
        hasher.update(artifact.content.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        debug!(file = %artifact.filename, size = artifact.content.len(), "wrote artifact");

        metas.push(ArtifactMeta {
            filename: artifact.filename.clone(),
            sha256: hash,
            size_bytes: artifact.content.len(),
        });
    }

    info!(count = metas.len(), "artifacts written");
    Ok(metas)
}

/// Write `manifest.json` (pretty-printed) into `out_dir`.
pub fn write_manifest<S: Serialize>(out_dir: &Path, manifest: &RunManifest<'_, S>) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest).map_err(|e| {
        SubmergeError::validation(format!("JSON serialization failed: {e}"))
    })?;
    write_atomic(out_dir, "manifest.json", &json)?;
    debug!(run_id = %manifest.run_id, "manifest written");
    Ok(())
}

fn write_atomic(dir: &Path, filename: &str, content: &str) -> Result<()> {
    let target = dir.join(filename);
    let temp = dir.join(format!(".{filename}.tmp"));

    std::fs::write(&temp, content).map_err(|e| SubmergeError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| SubmergeError::io(&target, e))?;
    Ok(())
}

/// Artifact names are plain file names; nothing may escape `out_dir`.
fn validate_filename(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\']);
    if ok {
        Ok(())
    } else {
        Err(SubmergeError::validation(format!(
            "invalid artifact file name {name:?}"
        )))
    }
}
