use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;

/// Interface for a platform microphone.
///
/// The recorder calls [`initialize`](CaptureDevice::initialize) on the
/// controlling thread, then moves the device onto its capture thread where
/// every other method is called.
pub trait CaptureDevice: Send {
    /// Acquire the device for the given format.
    ///
    /// Failure here is reported synchronously from `WavRecorder::start`.
    fn initialize(&mut self, config: &CaptureConfiguration) -> Result<(), CaptureError>;

    /// Minimum read size in bytes for the configured format.
    fn min_buffer_size(&self) -> usize;

    /// Begin delivering audio.
    fn start_recording(&mut self) -> Result<(), CaptureError>;

    /// Whether the device actually entered its recording state.
    fn is_recording(&self) -> bool;

    /// Blocking read of raw PCM into `buf`.
    ///
    /// `Ok(0)` means no data was available yet and the caller should retry.
    /// An error ends the capture loop.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError>;

    /// Stop delivering audio. Only called after a successful `start_recording`.
    fn stop(&mut self);

    /// Release the device. Called exactly once, on every exit path.
    fn release(&mut self);
}
