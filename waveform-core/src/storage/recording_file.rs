use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;

/// Path for a new recording in `directory`: `recording_<uuid>.wav`.
pub fn recording_path(directory: &Path) -> PathBuf {
    directory.join(format!("recording_{}.wav", uuid::Uuid::new_v4()))
}

/// Create `directory` if needed and open a fresh recording file inside it.
pub fn create_recording_file(directory: &Path) -> Result<(PathBuf, File), CaptureError> {
    fs::create_dir_all(directory)
        .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;

    let path = recording_path(directory);
    let file = File::create(&path)
        .map_err(|e| CaptureError::StorageError(format!("failed to create file: {}", e)))?;
    Ok((path, file))
}
