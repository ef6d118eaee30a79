use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::audio_file_info::AudioFileInfo;
use crate::models::error::WaveformError;

/// Cached waveform for a recording, stored as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformMetadata {
    pub id: String,
    pub created_at: String,
    #[serde(flatten)]
    pub info: AudioFileInfo,
}

impl WaveformMetadata {
    pub fn new(info: AudioFileInfo) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            info,
        }
    }
}

/// `{recording}.waveform.json` next to the recording.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("waveform.json")
}

/// Write the waveform of `recording_path` as a JSON sidecar file.
pub fn write_metadata(info: &AudioFileInfo, recording_path: &Path) -> Result<WaveformMetadata, WaveformError> {
    let metadata = WaveformMetadata::new(info.clone());
    let json = serde_json::to_string_pretty(&metadata)
        .map_err(|e| WaveformError::Io(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json)
        .map_err(|e| WaveformError::Io(format!("failed to write metadata: {}", e)))?;
    Ok(metadata)
}

/// Read the waveform sidecar of `recording_path`.
pub fn read_metadata(recording_path: &Path) -> Result<WaveformMetadata, WaveformError> {
    let json = fs::read_to_string(metadata_path(recording_path))
        .map_err(|e| WaveformError::Io(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json).map_err(|e| WaveformError::Io(format!("failed to parse metadata: {}", e)))
}
