use std::time::Duration;

/// Number of bars in a waveform preview.
pub const BAR_COUNT: usize = 46;

/// Sample rate of recorded voice notes, in Hz.
pub const SAMPLE_RATE: u32 = 44100;

/// Channel count of recorded voice notes.
pub const CHANNELS: u16 = 1;

/// Bits per sample of recorded voice notes.
pub const BIT_DEPTH: u16 = 16;

/// Configuration for a [`WavRecorder`](crate::session::recorder::WavRecorder).
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfiguration {
    /// Capture sample rate in Hz (default: 44100). Only 44100 Hz is supported,
    /// since WAV recordings are read back without inspecting the header.
    pub sample_rate: u32,

    /// Number of channels (default: 1). Only mono is supported.
    pub channels: u16,

    /// Bit depth (default: 16). Only 16-bit PCM is supported.
    pub bit_depth: u16,

    /// The device's internal buffer is this many times its minimum buffer size.
    pub device_buffer_multiplier: usize,

    /// How long `stop` waits for the capture loop to exit.
    pub stop_timeout: Duration,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate != SAMPLE_RATE {
            return Err(format!("unsupported sample rate: {}", self.sample_rate));
        }
        if self.channels != CHANNELS {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.bit_depth != BIT_DEPTH {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        if self.device_buffer_multiplier == 0 {
            return Err("device buffer multiplier must be positive".into());
        }
        Ok(())
    }

    /// Bytes per second of captured audio.
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bit_depth as u32 / 8
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            bit_depth: BIT_DEPTH,
            device_buffer_multiplier: 10,
            stop_timeout: Duration::from_millis(500),
        }
    }
}

/// Tuning for the compressed-media decode loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    /// Consecutive loop iterations without decoded output before giving up.
    pub stall_limit: u32,

    /// Timeout passed to each decoder queue operation.
    pub poll_interval: Duration,

    /// Input pacing resolution: compressed units are fed at most this many
    /// times per bar.
    pub pacing_subdivisions: u64,

    /// Stride, in bytes, used to scan decoded PCM blocks.
    pub scan_stride: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            stall_limit: 50,
            poll_interval: Duration::from_millis(5),
            pacing_subdivisions: 4,
            scan_stride: 2 * 4,
        }
    }
}
