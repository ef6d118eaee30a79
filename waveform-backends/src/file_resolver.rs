//! Resolves filesystem paths into waveform assets.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use waveform_core::extract::AUDIO_WAV;
use waveform_core::models::error::WaveformError;
use waveform_core::traits::asset_resolver::AssetResolver;
use waveform_core::traits::media::MediaExtractor;

use crate::media::SymphoniaExtractor;

const OCTET_STREAM: &str = "application/octet-stream";

/// Content type guessed from a file extension.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "wav" | "wave" => AUDIO_WAV,
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "m4a" | "mp4" => "audio/mp4",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        _ => OCTET_STREAM,
    }
}

/// [`AssetResolver`] over local files, decoding compressed media with symphonia.
#[derive(Debug, Default, Clone)]
pub struct FileAssetResolver {
    mime_override: Option<String>,
}

impl FileAssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `mime` for every path instead of guessing from the extension.
    pub fn with_mime(mime: impl Into<String>) -> Self {
        Self {
            mime_override: Some(mime.into()),
        }
    }

    fn open(path: &Path) -> Result<File, WaveformError> {
        File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                WaveformError::AssetUnavailable(format!("{}: {}", path.display(), e))
            }
            _ => WaveformError::from(e),
        })
    }
}

impl AssetResolver for FileAssetResolver {
    type Handle = Path;

    fn content_type(&self, path: &Path) -> Result<String, WaveformError> {
        if !path.is_file() {
            return Err(WaveformError::AssetUnavailable(format!("{} is not a file", path.display())));
        }
        if let Some(mime) = &self.mime_override {
            return Ok(mime.clone());
        }
        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(mime_for_extension)
            .unwrap_or(OCTET_STREAM);
        Ok(mime.to_string())
    }

    fn open_stream(&self, path: &Path) -> Result<Box<dyn Read>, WaveformError> {
        Ok(Box::new(BufReader::new(Self::open(path)?)))
    }

    fn open_extractor(&self, path: &Path) -> Result<Box<dyn MediaExtractor>, WaveformError> {
        let file = Self::open(path)?;
        let extension = path.extension().and_then(|ext| ext.to_str());
        Ok(Box::new(SymphoniaExtractor::open(Box::new(file), extension)?))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::media::SymphoniaCodecs;
    use waveform_core::extract::WaveformGenerator;
    use waveform_core::processing::wav_format;
    use waveform_core::BAR_COUNT;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("waveform_resolver_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn extension_mapping() {
        assert_eq!(mime_for_extension("WAV"), AUDIO_WAV);
        assert_eq!(mime_for_extension("mp3"), "audio/mpeg");
        assert_eq!(mime_for_extension("m4a"), "audio/mp4");
        assert_eq!(mime_for_extension("txt"), OCTET_STREAM);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let resolver = FileAssetResolver::new();
        let path = std::env::temp_dir().join("waveform_resolver_does_not_exist.wav");
        assert!(matches!(
            resolver.content_type(&path),
            Err(WaveformError::AssetUnavailable(_))
        ));
        assert!(matches!(
            resolver.open_stream(&path),
            Err(WaveformError::AssetUnavailable(_))
        ));
    }

    #[test]
    fn override_wins_over_extension() {
        let path = temp_file("override.bin", b"data");
        let resolver = FileAssetResolver::with_mime("audio/x-wav");
        assert_eq!(resolver.content_type(&path).unwrap(), "audio/x-wav");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn streaming_wav_file_produces_bars() {
        let mut bytes = wav_format::generate_streaming_header(44100, 1, 16).to_vec();
        let mut samples = vec![0i16; 44100];
        for s in samples.iter_mut().skip(22050) {
            *s = 8000;
        }
        bytes.extend(wav_format::pcm_to_bytes(&samples));
        let path = temp_file("half_loud.wav", &bytes);

        let generator = WaveformGenerator::new(FileAssetResolver::new(), SymphoniaCodecs::new());
        let info = generator.generate(&path).unwrap();

        assert_eq!(info.duration_micros, 1_000_000);
        assert!(info.bars[..BAR_COUNT / 2].iter().all(|&b| b == 0));
        assert!(info.bars[BAR_COUNT / 2 + 1..].iter().all(|&b| b == 255));
        fs::remove_file(&path).ok();
    }
}
