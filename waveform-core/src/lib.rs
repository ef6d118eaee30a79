//! # waveform-core
//!
//! Platform-agnostic voice waveform core library.
//!
//! Summarizes audio assets into a fixed row of 46 amplitude bars plus a
//! duration, and records microphone PCM into streaming WAV files that the
//! summarizer can read back. Platform decoders, microphones and asset storage
//! plug in through the traits in [`traits`].
//!
//! ## Architecture
//!
//! ```text
//! waveform-core (this crate)
//! ├── traits/       ← AssetResolver, MediaExtractor, AudioDecoder, CodecFactory, CaptureDevice
//! ├── models/       ← AudioFileInfo, WaveformError, CaptureError, configuration, constants
//! ├── processing/   ← streaming WAV header codec, bar accumulation + normalization
//! ├── extract/      ← WaveformGenerator, raw-PCM and compressed-media extractors
//! ├── session/      ← WavRecorder (capture thread orchestration)
//! └── storage/      ← recording files, waveform sidecars, voice-note drafts
//! ```

pub mod extract;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use extract::{extract_compressed, extract_raw_pcm, is_raw_pcm_mime, WaveformGenerator, AUDIO_AAC, AUDIO_WAV};
pub use models::audio_file_info::AudioFileInfo;
pub use models::config::{CaptureConfiguration, ExtractionConfig, BAR_COUNT, BIT_DEPTH, CHANNELS, SAMPLE_RATE};
pub use models::error::{CaptureError, DraftError, ErrorKind, WaveformError};
pub use models::state::{CaptureState, CaptureSummary};
pub use processing::bars::BarAccumulator;
pub use processing::wav_format::{WavHeader, WAV_HEADER_SIZE};
pub use session::recorder::WavRecorder;
pub use storage::draft::{Draft, VoiceNoteDraft};
pub use storage::metadata::WaveformMetadata;
pub use traits::asset_resolver::AssetResolver;
pub use traits::capture_device::CaptureDevice;
pub use traits::media::{AudioDecoder, CodecFactory, DecodedBlock, MediaExtractor, OutputEvent, PcmEncoding, TrackFormat};
