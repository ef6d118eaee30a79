use std::time::Duration;

use crate::models::error::WaveformError;

/// Format of one track as reported by the demuxer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    /// e.g. `audio/mpeg`, `audio/aac`.
    pub mime: String,
    /// Track duration in microseconds, if the container declares one.
    pub duration_micros: Option<u64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    /// Codec-specific setup bytes, e.g. an AAC `AudioSpecificConfig`.
    pub codec_private: Option<Vec<u8>>,
    /// Sample layout of an uncompressed `audio/raw` track.
    pub pcm_encoding: Option<PcmEncoding>,
    /// Size in bytes of the largest access unit, if known.
    pub max_input_size: Option<usize>,
}

impl TrackFormat {
    pub fn is_audio(&self) -> bool {
        self.mime.starts_with("audio/")
    }
}

/// Interleaved sample layouts an `audio/raw` track can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmEncoding {
    U8,
    S16Le,
    S24Le,
    S32Le,
    F32Le,
}

impl PcmEncoding {
    pub fn bits_per_sample(self) -> u32 {
        match self {
            PcmEncoding::U8 => 8,
            PcmEncoding::S16Le => 16,
            PcmEncoding::S24Le => 24,
            PcmEncoding::S32Le | PcmEncoding::F32Le => 32,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits_per_sample() as usize / 8
    }
}

/// One decoded PCM block pulled from the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedBlock {
    /// Interleaved little-endian 16-bit PCM.
    pub data: Vec<u8>,
    /// Playback position of the first sample, in microseconds.
    pub presentation_time_micros: i64,
    /// Set on the last block the decoder will produce.
    pub end_of_stream: bool,
}

/// Result of polling the decoder's output queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Block(DecodedBlock),
    /// The output format changed; carries a human-readable description.
    FormatChanged(String),
    /// Nothing available within the poll timeout.
    TryAgainLater,
}

/// Demuxer over a single asset, iterating compressed access units in
/// timestamp order.
pub trait MediaExtractor {
    fn track_count(&self) -> usize;

    fn track_format(&self, index: usize) -> Result<TrackFormat, WaveformError>;

    fn select_track(&mut self, index: usize) -> Result<(), WaveformError>;

    /// Copy the current access unit into `buf` (replacing its contents).
    ///
    /// Returns `None` at end of stream.
    fn read_sample_data(&mut self, buf: &mut Vec<u8>) -> Result<Option<usize>, WaveformError>;

    /// Timestamp of the current access unit in microseconds, `None` at end
    /// of stream.
    fn sample_time(&self) -> Option<i64>;

    /// Move to the next access unit. Returns `false` at end of stream.
    fn advance(&mut self) -> bool;

    /// Release native resources. Called exactly once.
    fn release(&mut self);
}

/// Two-queue decoder: compressed units in, PCM blocks out.
pub trait AudioDecoder {
    fn start(&mut self) -> Result<(), WaveformError>;

    /// Whether an input slot became free within `timeout`.
    fn input_ready(&mut self, timeout: Duration) -> Result<bool, WaveformError>;

    /// Queue one compressed unit. `end_of_stream` marks the final (possibly
    /// empty) unit.
    fn queue_input(
        &mut self,
        data: &[u8],
        presentation_time_micros: i64,
        end_of_stream: bool,
    ) -> Result<(), WaveformError>;

    fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputEvent, WaveformError>;

    fn stop(&mut self);

    fn release(&mut self);
}

/// Creates decoders for a track format.
pub trait CodecFactory {
    fn create_decoder(&self, format: &TrackFormat) -> Result<Box<dyn AudioDecoder>, WaveformError>;
}
