pub mod compressed;
pub mod raw_pcm;

use crate::models::audio_file_info::AudioFileInfo;
use crate::models::config::ExtractionConfig;
use crate::models::error::WaveformError;
use crate::traits::asset_resolver::AssetResolver;
use crate::traits::media::CodecFactory;

pub use compressed::extract_compressed;
pub use raw_pcm::{extract_raw_pcm, summarize_pcm};

/// MIME type of the streaming WAV container written by the recorder.
pub const AUDIO_WAV: &str = "audio/wav";

/// Default MIME type of compressed voice notes.
pub const AUDIO_AAC: &str = "audio/aac";

const WAV_ALIASES: [&str; 4] = [AUDIO_WAV, "audio/x-wav", "audio/wave", "audio/vnd.wave"];

/// Whether `mime` names the raw-PCM WAV container. Parameters and case are
/// ignored.
pub fn is_raw_pcm_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    WAV_ALIASES.iter().any(|alias| alias.eq_ignore_ascii_case(essence))
}

/// Produces [`AudioFileInfo`] for assets behind an [`AssetResolver`].
///
/// WAV assets are parsed directly; everything else goes through the codec
/// factory's decoders. Extraction blocks, so call it from a worker thread.
pub struct WaveformGenerator<R, C> {
    resolver: R,
    codecs: C,
    config: ExtractionConfig,
}

impl<R: AssetResolver, C: CodecFactory> WaveformGenerator<R, C> {
    pub fn new(resolver: R, codecs: C) -> Self {
        Self::with_config(resolver, codecs, ExtractionConfig::default())
    }

    pub fn with_config(resolver: R, codecs: C, config: ExtractionConfig) -> Self {
        Self { resolver, codecs, config }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn generate(&self, handle: &R::Handle) -> Result<AudioFileInfo, WaveformError> {
        let mime = self.resolver.content_type(handle)?;

        if is_raw_pcm_mime(&mime) {
            let mut stream = self.resolver.open_stream(handle)?;
            return extract_raw_pcm(&mut stream);
        }

        let extractor = self.resolver.open_extractor(handle)?;
        extract_compressed(extractor, &self.codecs, &self.config)
    }
}
