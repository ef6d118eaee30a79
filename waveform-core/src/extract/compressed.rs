//! Waveform extraction through an external demuxer and decoder.
//!
//! Decoded blocks are binned by presentation timestamp, not by sample index,
//! so the result does not depend on the decoder's output block size.

use std::ops::{Deref, DerefMut};

use crate::models::audio_file_info::AudioFileInfo;
use crate::models::config::{ExtractionConfig, BAR_COUNT};
use crate::models::error::WaveformError;
use crate::processing::bars::{bar_index, BarAccumulator};
use crate::traits::media::{AudioDecoder, CodecFactory, DecodedBlock, MediaExtractor, OutputEvent};

/// Releases the demuxer when dropped.
struct ExtractorGuard(Box<dyn MediaExtractor>);

impl Deref for ExtractorGuard {
    type Target = dyn MediaExtractor;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl DerefMut for ExtractorGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.0
    }
}

impl Drop for ExtractorGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Stops (if started) and releases the decoder when dropped.
struct DecoderGuard {
    decoder: Box<dyn AudioDecoder>,
    started: bool,
}

impl DecoderGuard {
    fn start(&mut self) -> Result<(), WaveformError> {
        self.decoder.start()?;
        self.started = true;
        Ok(())
    }
}

impl Deref for DecoderGuard {
    type Target = dyn AudioDecoder;

    fn deref(&self) -> &Self::Target {
        &*self.decoder
    }
}

impl DerefMut for DecoderGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.decoder
    }
}

impl Drop for DecoderGuard {
    fn drop(&mut self) {
        if self.started {
            self.decoder.stop();
        }
        self.decoder.release();
    }
}

/// Extract duration and bars from the first track of `extractor`.
///
/// The extractor is released, and any decoder created for it stopped and
/// released, on every return path.
///
/// Fails before creating a decoder when the asset has no tracks, no or zero
/// duration, or a non-audio first track. Fails with
/// [`WaveformError::DecodeStall`] when `config.stall_limit` consecutive loop
/// iterations pass without decoded output or end of stream.
pub fn extract_compressed(
    extractor: Box<dyn MediaExtractor>,
    codecs: &dyn CodecFactory,
    config: &ExtractionConfig,
) -> Result<AudioFileInfo, WaveformError> {
    let mut extractor = ExtractorGuard(extractor);

    if extractor.track_count() == 0 {
        return Err(WaveformError::NoAudioTrack);
    }

    let format = extractor.track_format(0)?;
    let total_duration = format.duration_micros.ok_or(WaveformError::UnknownDuration)?;
    if !format.is_audio() {
        return Err(WaveformError::NotAudio(format.mime));
    }
    if total_duration == 0 {
        return Err(WaveformError::ZeroDuration);
    }

    // Declared after `extractor` so it is torn down first.
    let mut decoder = DecoderGuard {
        decoder: codecs.create_decoder(&format)?,
        started: false,
    };
    decoder.start()?;
    extractor.select_track(0)?;

    log::debug!(
        "decoding {} ({} us) into {} bars",
        format.mime,
        total_duration,
        BAR_COUNT
    );

    let mut bars = BarAccumulator::new();
    let mut input = Vec::new();
    let mut saw_input_eos = false;
    let mut saw_output_eos = false;
    let mut no_output_counter = 0u32;

    while !saw_output_eos && no_output_counter < config.stall_limit {
        no_output_counter += 1;

        if !saw_input_eos && decoder.input_ready(config.poll_interval)? {
            let (size, presentation_time) = match extractor.read_sample_data(&mut input)? {
                Some(size) => (size.min(input.len()), extractor.sample_time().unwrap_or(0)),
                None => {
                    saw_input_eos = true;
                    (0, 0)
                }
            };
            decoder.queue_input(&input[..size], presentation_time, saw_input_eos)?;

            // Once pacing runs off the end, the next read returns `None` and
            // queues the end-of-stream unit.
            if !saw_input_eos {
                pace_input(&mut *extractor, total_duration, config.pacing_subdivisions);
            }
        }

        loop {
            match decoder.dequeue_output(config.poll_interval)? {
                OutputEvent::Block(block) => {
                    if !block.data.is_empty() {
                        no_output_counter = 0;
                    }
                    accumulate_block(&mut bars, &block, total_duration, config.scan_stride);
                    if block.end_of_stream {
                        saw_output_eos = true;
                        break;
                    }
                }
                OutputEvent::FormatChanged(description) => {
                    log::debug!("output format has changed to {}", description);
                    break;
                }
                OutputEvent::TryAgainLater => break,
            }
        }
    }

    if !saw_output_eos {
        log::warn!("decoder made no progress for {} iterations, giving up", no_output_counter);
        return Err(WaveformError::DecodeStall(no_output_counter));
    }

    Ok(AudioFileInfo::new(total_duration, bars.normalize()))
}

/// Advance past every access unit that falls in the same pacing step as the
/// current one, stopping early at end of stream.
fn pace_input(extractor: &mut dyn MediaExtractor, total_duration: u64, subdivisions: u64) {
    let step_of = |time: i64| bar_index(time, total_duration, subdivisions);
    let current = extractor.sample_time().map(step_of);

    while extractor.advance() {
        if extractor.sample_time().map(step_of) != current {
            break;
        }
    }
}

/// Add one decoded block to the bar at its presentation timestamp.
///
/// Only one 16-bit sample per `stride` bytes is read, but the bar's sample
/// count grows by every sample in the block.
fn accumulate_block(bars: &mut BarAccumulator, block: &DecodedBlock, total_duration: u64, stride: usize) {
    let index = bar_index(block.presentation_time_micros, total_duration, 1);
    let energy = coarse_energy(&block.data, stride);
    bars.add(index, energy, block.data.len() as u64 / 2);
}

fn coarse_energy(data: &[u8], stride: usize) -> u64 {
    (0..data.len())
        .step_by(stride.max(2))
        .filter_map(|at| data.get(at..at + 2))
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]).unsigned_abs() as u64)
        .sum()
}
