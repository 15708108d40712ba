use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::TrainedPipeline;
use crate::config::{default_artifact_dir, ARTIFACT_FILE_NAME, MAX_ARTIFACT_BYTES};

const ARTIFACT_FORMAT: &str = "uair-text-classifier";
const ARTIFACT_VERSION: u32 = 1;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact missing: {0}")]
    Missing(PathBuf),
    #[error("Artifact corrupt at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ArtifactError {
    fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// On-disk wrapper: the pipeline JSON plus what is needed to reject foreign or damaged files.
#[derive(Serialize, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    sha256: String,
    payload: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Writes `pipeline` to `path`.
///
/// The bytes go to a temporary file in the same directory which is synced and
/// then renamed over `path`, so readers see either the old artifact or the new
/// one in full.
pub fn save<P: AsRef<Path>>(pipeline: &TrainedPipeline, path: P) -> Result<(), ArtifactError> {
    let path = path.as_ref();
    let payload = serde_json::to_string(pipeline).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let envelope = Envelope {
        format: ARTIFACT_FORMAT.to_string(),
        version: ARTIFACT_VERSION,
        sha256: sha256_hex(payload.as_bytes()),
        payload,
    };
    let bytes = serde_json::to_vec(&envelope).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    // Ensure parent directory exists
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ARTIFACT_FILE_NAME.to_string());
    let temp_path = parent.join(format!(
        ".{}.{}.{}.tmp",
        file_name,
        process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    log::info!("Writing {} bytes to {:?}", bytes.len(), temp_path);
    let written = (|| -> io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()
    })();
    if let Err(e) = written.and_then(|_| fs::rename(&temp_path, path)) {
        // Cleanup on failure
        let _ = fs::remove_file(&temp_path);
        log::error!("Failed to publish artifact at {:?}: {}", path, e);
        return Err(e.into());
    }

    log::info!("Artifact published at {:?}", path);
    Ok(())
}

/// Reads and verifies the pipeline stored at `path`.
pub fn load<P: AsRef<Path>>(path: P) -> Result<TrainedPipeline, ArtifactError> {
    let path = path.as_ref();
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ArtifactError::Missing(path.to_path_buf())),
        Err(e) => return Err(e.into()),
    };
    if metadata.len() > MAX_ARTIFACT_BYTES {
        return Err(ArtifactError::corrupt(
            path,
            format!("file is {} bytes, max is {}", metadata.len(), MAX_ARTIFACT_BYTES),
        ));
    }

    let bytes = fs::read(path)?;
    log::debug!("Read {} bytes from {:?}", bytes.len(), path);

    let envelope: Envelope =
        serde_json::from_slice(&bytes).map_err(|e| ArtifactError::corrupt(path, format!("unreadable envelope: {}", e)))?;
    if envelope.format != ARTIFACT_FORMAT {
        return Err(ArtifactError::corrupt(path, format!("unknown format '{}'", envelope.format)));
    }
    if envelope.version != ARTIFACT_VERSION {
        return Err(ArtifactError::corrupt(
            path,
            format!("unsupported version {} (expected {})", envelope.version, ARTIFACT_VERSION),
        ));
    }

    let actual = sha256_hex(envelope.payload.as_bytes());
    if actual != envelope.sha256 {
        log::error!("Artifact hash mismatch: expected {}, got {}", envelope.sha256, actual);
        return Err(ArtifactError::corrupt(path, "checksum mismatch"));
    }

    let pipeline: TrainedPipeline = serde_json::from_str(&envelope.payload)
        .map_err(|e| ArtifactError::corrupt(path, format!("unreadable pipeline: {}", e)))?;
    pipeline
        .validate()
        .map_err(|e| ArtifactError::corrupt(path, e.to_string()))?;

    log::info!("Loaded artifact from {:?}", path);
    Ok(pipeline)
}

/// A directory holding the published pipeline under a fixed file name.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    artifacts_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl ArtifactStore {
    /// Creates a new ArtifactStore in the default artifacts directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(default_artifact_dir())
    }

    pub fn new<P: AsRef<Path>>(artifacts_dir: P) -> io::Result<Self> {
        let artifacts_dir = artifacts_dir.as_ref().to_path_buf();
        fs::create_dir_all(&artifacts_dir)?;
        Ok(Self {
            artifacts_dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.artifacts_dir.join(ARTIFACT_FILE_NAME)
    }

    pub fn exists(&self) -> bool {
        let path = self.artifact_path();
        log::debug!("Artifact path: {:?} (exists: {})", path, path.exists());
        path.exists()
    }

    /// Publishes `pipeline`, replacing any previous artifact.
    pub fn save(&self, pipeline: &TrainedPipeline) -> Result<PathBuf, ArtifactError> {
        let _lock = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let path = self.artifact_path();
        save(pipeline, &path)?;
        Ok(path)
    }

    pub fn load(&self) -> Result<TrainedPipeline, ArtifactError> {
        load(self.artifact_path())
    }

    /// Returns `Ok(false)` when the artifact is absent or fails verification.
    pub fn verify(&self) -> Result<bool, ArtifactError> {
        match self.load() {
            Ok(_) => Ok(true),
            Err(ArtifactError::Missing(_)) | Err(ArtifactError::Corrupt { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn remove(&self) -> Result<(), ArtifactError> {
        let _lock = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let path = self.artifact_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
