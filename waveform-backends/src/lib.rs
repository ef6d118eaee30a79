//! # waveform-backends
//!
//! Concrete collaborators for waveform-core.
//!
//! Provides:
//! - `SymphoniaExtractor` / `SymphoniaCodecs`: demuxing and decoding of compressed audio via symphonia
//! - `FileAssetResolver`: local files as waveform assets
//! - `CpalCaptureDevice`: microphone capture via cpal (feature `cpal`)
//!
//! ## Usage
//! ```ignore
//! use std::path::Path;
//! use waveform_backends::{FileAssetResolver, SymphoniaCodecs};
//! use waveform_core::WaveformGenerator;
//!
//! let generator = WaveformGenerator::new(FileAssetResolver::new(), SymphoniaCodecs::new());
//! let info = generator.generate(Path::new("note.m4a"))?;
//! ```

#[cfg(feature = "cpal")]
pub mod cpal_device;
pub mod file_resolver;
pub mod media;

#[cfg(feature = "cpal")]
pub use cpal_device::CpalCaptureDevice;
pub use file_resolver::FileAssetResolver;
pub use media::{SymphoniaCodecs, SymphoniaDecoder, SymphoniaExtractor};
