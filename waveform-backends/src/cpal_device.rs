//! cpal microphone capture device.
//!
//! The cpal input callback converts whatever sample format the device
//! delivers into little-endian 16-bit PCM and hands it to the capture thread
//! over a bounded channel. `read` drains that channel, returning `Ok(0)` when
//! nothing arrived within the poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig, SupportedStreamConfigRange};

use waveform_core::models::config::CaptureConfiguration;
use waveform_core::models::error::CaptureError;
use waveform_core::traits::capture_device::CaptureDevice;

/// How long a single `read` waits for the callback before reporting no data.
const READ_POLL: Duration = Duration::from_millis(20);

/// Length of one callback block the device is expected to deliver.
const PERIOD: Duration = Duration::from_millis(10);

/// Sample formats the callback can convert, in order of preference.
const SAMPLE_FORMATS: [SampleFormat; 3] = [SampleFormat::I16, SampleFormat::F32, SampleFormat::U16];

/// Pick a sample format for a `channels` × `sample_rate` stream from the
/// ranges a device advertises.
fn pick_sample_format(ranges: &[SupportedStreamConfigRange], channels: u16, sample_rate: u32) -> Option<SampleFormat> {
    let fits = |range: &&SupportedStreamConfigRange| {
        range.channels() == channels
            && range.min_sample_rate().0 <= sample_rate
            && sample_rate <= range.max_sample_rate().0
    };
    SAMPLE_FORMATS
        .into_iter()
        .find(|format| ranges.iter().filter(&fits).any(|range| range.sample_format() == *format))
}

/// Microphone capture through the default cpal host.
pub struct CpalCaptureDevice {
    device: Option<Device>,
    config: Option<CaptureConfiguration>,
    sample_format: Option<SampleFormat>,
    stream: Option<Stream>,
    receiver: Option<Receiver<Vec<u8>>>,
    pending: Vec<u8>,
    failed: Arc<AtomicBool>,
    recording: bool,
}

// SAFETY: The cpal stream is created in `start_recording` and dropped in
// `stop`/`release`, both called on the recorder's capture thread. Only
// `initialize` runs on another thread, before any stream exists.
unsafe impl Send for CpalCaptureDevice {}

impl CpalCaptureDevice {
    /// Capture from the host's default input device.
    pub fn default_device() -> Self {
        Self {
            device: None,
            config: None,
            sample_format: None,
            stream: None,
            receiver: None,
            pending: Vec::new(),
            failed: Arc::new(AtomicBool::new(false)),
            recording: false,
        }
    }

    /// Names of every input device on the default host.
    pub fn list_devices() -> Result<Vec<String>, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::DeviceInitFailed(format!("failed to enumerate devices: {}", e)))?;
        Ok(devices
            .map(|d| d.name().unwrap_or_else(|_| "Unknown Device".to_string()))
            .collect())
    }

    fn build_stream<T>(
        &self,
        device: &Device,
        config: &StreamConfig,
        sender: SyncSender<Vec<u8>>,
    ) -> Result<Stream, CaptureError>
    where
        T: SizedSample + Send + 'static,
        i16: cpal::FromSample<T>,
    {
        let failed = Arc::clone(&self.failed);
        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    let mut bytes = Vec::with_capacity(data.len() * 2);
                    for &sample in data {
                        let value: i16 = cpal::Sample::from_sample(sample);
                        bytes.extend_from_slice(&value.to_le_bytes());
                    }
                    match sender.try_send(bytes) {
                        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                        Err(TrySendError::Full(_)) => log::warn!("Capture buffer full, dropping audio block"),
                    }
                },
                move |err| {
                    log::error!("Input stream error: {}", err);
                    failed.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| CaptureError::DeviceInitFailed(format!("failed to build input stream: {}", e)))
    }
}

impl Default for CpalCaptureDevice {
    fn default() -> Self {
        Self::default_device()
    }
}

impl CaptureDevice for CpalCaptureDevice {
    fn initialize(&mut self, config: &CaptureConfiguration) -> Result<(), CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::DeviceNotAvailable)?;
        let name = device.name().unwrap_or_else(|_| "unknown".into());

        let ranges: Vec<SupportedStreamConfigRange> = device
            .supported_input_configs()
            .map_err(|e| CaptureError::DeviceInitFailed(format!("failed to query '{}': {}", name, e)))?
            .collect();
        let sample_format = pick_sample_format(&ranges, config.channels, config.sample_rate).ok_or_else(|| {
            CaptureError::DeviceInitFailed(format!(
                "'{}' cannot capture {} channel(s) at {} Hz",
                name, config.channels, config.sample_rate
            ))
        })?;

        log::info!("Using input device '{}' ({:?})", name, sample_format);
        self.device = Some(device);
        self.config = Some(config.clone());
        self.sample_format = Some(sample_format);
        Ok(())
    }

    fn min_buffer_size(&self) -> usize {
        self.config
            .as_ref()
            .map(|c| (c.byte_rate() as u128 * PERIOD.as_millis() / 1000) as usize)
            .unwrap_or(0)
    }

    fn start_recording(&mut self) -> Result<(), CaptureError> {
        let (Some(device), Some(config), Some(sample_format)) = (&self.device, &self.config, self.sample_format)
        else {
            return Err(CaptureError::InvalidState("device not initialized".into()));
        };

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sender, receiver) = mpsc::sync_channel(config.device_buffer_multiplier.max(1));
        let stream = match sample_format {
            SampleFormat::I16 => self.build_stream::<i16>(device, &stream_config, sender)?,
            SampleFormat::U16 => self.build_stream::<u16>(device, &stream_config, sender)?,
            SampleFormat::F32 => self.build_stream::<f32>(device, &stream_config, sender)?,
            other => {
                return Err(CaptureError::ConfigurationFailed(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| CaptureError::DeviceInitFailed(format!("failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        self.receiver = Some(receiver);
        self.recording = true;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording && !self.failed.load(Ordering::SeqCst)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(CaptureError::ReadFailed("input stream reported an error".into()));
        }

        if self.pending.is_empty() {
            let receiver = self.receiver.as_ref().ok_or(CaptureError::NotRecording)?;
            match receiver.recv_timeout(READ_POLL) {
                Ok(block) => self.pending = block,
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::ReadFailed("input stream closed".into()))
                }
            }
        }

        // Whole samples only.
        let n = buf.len().min(self.pending.len()) & !1;
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause input stream: {}", e);
            }
        }
        self.receiver = None;
        self.recording = false;
    }

    fn release(&mut self) {
        self.stream = None;
        self.receiver = None;
        self.pending.clear();
        self.device = None;
        self.sample_format = None;
        self.recording = false;
        log::debug!("Capture device released");
    }
}
