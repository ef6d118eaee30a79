//! Waveform extraction straight from a streaming WAV file.
//!
//! The header is skipped without inspection: samples are assumed to be mono
//! 16-bit PCM at [`SAMPLE_RATE`].

use std::io::Read;

use crate::models::audio_file_info::AudioFileInfo;
use crate::models::config::{BAR_COUNT, SAMPLE_RATE};
use crate::models::error::WaveformError;
use crate::processing::bars::{mean_magnitude, normalize_averages};
use crate::processing::wav_format;

/// Skip the 44-byte header of `source` and summarize the samples after it.
///
/// A stream holding only a header is a valid, empty recording.
pub fn extract_raw_pcm<R: Read + ?Sized>(source: &mut R) -> Result<AudioFileInfo, WaveformError> {
    wav_format::skip_header(source)?;
    let samples = wav_format::read_pcm(source)?;
    Ok(summarize_pcm(&samples))
}

/// Duration and bars of mono PCM at [`SAMPLE_RATE`].
///
/// Samples are split into `BAR_COUNT` contiguous ranges of
/// `samples.len() / BAR_COUNT` samples each (fractional); each bar is the mean
/// absolute sample value of its range.
pub fn summarize_pcm(samples: &[i16]) -> AudioFileInfo {
    if samples.is_empty() {
        return AudioFileInfo::empty();
    }

    let total = samples.len();
    let duration_micros = total as u64 * 1_000_000 / SAMPLE_RATE as u64;
    let samples_per_bar = total as f64 / BAR_COUNT as f64;

    let mut averages = [0.0; BAR_COUNT];
    for (i, average) in averages.iter_mut().enumerate() {
        let start = ((i as f64 * samples_per_bar) as usize).min(total);
        let end = (((i + 1) as f64 * samples_per_bar) as usize).min(total);
        *average = mean_magnitude(&samples[start..end.max(start)]);
    }

    AudioFileInfo::new(duration_micros, normalize_averages(&averages))
}
