//! Capture output: the file a sweep writes and the result it reports.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::controller::{Readiness, StopOutcome};
use crate::error::{Error, Result};
use crate::radio::RadioInterfaceState;

/// A retune that failed without ending the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetuneFailure {
    /// The channel that could not be set.
    pub channel: Channel,
    /// Why.
    pub message: String,
}

/// Size and content digest of a capture file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFingerprint {
    /// File size in bytes.
    pub bytes: u64,
    /// BLAKE3 digest of the contents, hex encoded.
    pub digest: String,
}

impl CaptureFingerprint {
    /// Fingerprint the file at `path`.
    ///
    /// Returns `None` if the file does not exist, which happens when the
    /// capture tool exited before writing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn of_file(path: &Path) -> Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut hasher = blake3::Hasher::new();
        let bytes = io::copy(&mut BufReader::new(file), &mut hasher)?;
        Ok(Some(Self {
            bytes,
            digest: hasher.finalize().to_hex().to_string(),
        }))
    }
}

/// Make sure a capture can be written to `path` from scratch.
///
/// Creates the parent directory and removes a file left over from an
/// earlier run, so every run produces a fresh capture.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the old file
/// cannot be removed.
pub fn prepare_output(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed previous capture");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// What a completed (or interrupted) sweep produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureResult {
    /// Where the capture was written.
    pub output_path: PathBuf,
    /// Number of channels visited.
    pub channels_swept: usize,
    /// Channels visited, in order, including ones whose retune failed.
    pub visited: Vec<Channel>,
    /// Retunes that failed but did not end the sweep.
    pub retune_failures: Vec<RetuneFailure>,
    /// Every interface state the driver set, starting with monitor mode.
    pub radio_states: Vec<RadioInterfaceState>,
    /// How readiness of the capture was established.
    pub readiness: Readiness,
    /// How the capture process ended.
    pub stop: StopOutcome,
    /// The sweep was interrupted before visiting every channel.
    pub cancelled: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the capture was stopped.
    pub finished_at: DateTime<Utc>,
    /// Capture file size and digest, when the file exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<CaptureFingerprint>,
}

impl CaptureResult {
    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Check whether every channel was visited and retuned successfully.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.retune_failures.is_empty()
    }
}
