use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::state::{CaptureState, CaptureSummary};
use crate::processing::wav_format::{self, WAV_HEADER_SIZE};
use crate::traits::capture_device::CaptureDevice;

/// Handle to a running capture thread.
struct CaptureThread {
    handle: thread::JoinHandle<CaptureSummary>,
    finished: mpsc::Receiver<()>,
}

/// Streams microphone PCM into a growing WAV sink.
///
/// The sink receives a streaming header (unknown sizes) followed by raw
/// device reads, verbatim. A recorder runs once: `start` moves the device
/// onto a dedicated thread and `stop` asks that thread to finish.
///
/// ```text
/// [CaptureDevice] → read(min_buffer_size) → [sink: header | pcm | pcm | ...]
/// ```
pub struct WavRecorder<D: CaptureDevice + 'static> {
    config: CaptureConfiguration,
    device: Mutex<Option<D>>,
    state: Mutex<CaptureState>,
    running: Arc<AtomicBool>,
    capture: Mutex<Option<CaptureThread>>,
}

impl<D: CaptureDevice + 'static> WavRecorder<D> {
    pub fn new(device: D) -> Self {
        Self::with_config(device, CaptureConfiguration::default())
    }

    pub fn with_config(device: D, config: CaptureConfiguration) -> Self {
        Self {
            config,
            device: Mutex::new(Some(device)),
            state: Mutex::new(CaptureState::NotStarted),
            running: Arc::new(AtomicBool::new(false)),
            capture: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock()
    }

    /// Whether the capture loop has not yet observed a stop request.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Initialize the device and start the capture thread.
    ///
    /// Device initialization errors are returned here. Everything after that
    /// (header write, entering the recording state, reads, sink writes) runs on
    /// the capture thread and is only logged.
    pub fn start<W: Write + Send + 'static>(&self, sink: W) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if *state != CaptureState::NotStarted {
            return Err(CaptureError::InvalidState(format!(
                "recorder can only be started once (currently {:?})",
                *state
            )));
        }

        self.config.validate().map_err(CaptureError::ConfigurationFailed)?;

        let device = self
            .device
            .lock()
            .take()
            .ok_or_else(|| CaptureError::InvalidState("capture device already consumed".into()))?;
        let mut device = DeviceGuard::new(device);

        if let Err(e) = device.device.initialize(&self.config) {
            *state = CaptureState::Stopped;
            return Err(e);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let config = self.config.clone();
        let (finished_tx, finished_rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("wav-capture".into())
            .spawn(move || {
                let summary = capture_loop(&running, device, sink, &config);
                running.store(false, Ordering::SeqCst);
                let _ = finished_tx.send(());
                summary
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                *state = CaptureState::Stopped;
                return Err(CaptureError::Unknown(format!("failed to spawn capture thread: {}", e)));
            }
        };

        *self.capture.lock() = Some(CaptureThread {
            handle,
            finished: finished_rx,
        });
        *state = CaptureState::Running;
        log::info!("capture started at {} Hz", self.config.sample_rate);
        Ok(())
    }

    /// Ask the capture loop to finish and wait up to the configured stop
    /// timeout for it.
    ///
    /// Returns the loop's summary if it exited in time. A loop that is still
    /// blocked in a device read is left to finish on its own.
    pub fn stop(&self) -> Option<CaptureSummary> {
        self.running.store(false, Ordering::SeqCst);
        *self.state.lock() = CaptureState::Stopped;

        let capture = self.capture.lock().take()?;
        match capture.finished.recv_timeout(self.config.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match capture.handle.join() {
                Ok(summary) => {
                    log::info!(
                        "capture stopped after {} bytes ({} reads)",
                        summary.bytes_written,
                        summary.reads
                    );
                    Some(summary)
                }
                Err(_) => {
                    log::error!("capture thread panicked");
                    None
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "capture loop still running after {:?}; leaving it to finish",
                    self.config.stop_timeout
                );
                None
            }
        }
    }
}

impl<D: CaptureDevice + 'static> Drop for WavRecorder<D> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Stops (if recording was requested) and releases the device when dropped.
struct DeviceGuard<D: CaptureDevice> {
    device: D,
    recording_requested: bool,
}

impl<D: CaptureDevice> DeviceGuard<D> {
    fn new(device: D) -> Self {
        Self {
            device,
            recording_requested: false,
        }
    }

    fn start_recording(&mut self) -> Result<(), CaptureError> {
        self.recording_requested = true;
        self.device.start_recording()?;
        if !self.device.is_recording() {
            return Err(CaptureError::NotRecording);
        }
        Ok(())
    }
}

impl<D: CaptureDevice> Drop for DeviceGuard<D> {
    fn drop(&mut self) {
        if self.recording_requested {
            self.device.stop();
        }
        self.device.release();
    }
}

/// Body of the capture thread. Never fails: errors end the loop and are
/// logged, and the device is released when `device` drops.
fn capture_loop<D: CaptureDevice, W: Write>(
    running: &AtomicBool,
    mut device: DeviceGuard<D>,
    mut sink: W,
    config: &CaptureConfiguration,
) -> CaptureSummary {
    let mut summary = CaptureSummary::default();

    if let Err(e) = record(running, &mut device, &mut sink, config, &mut summary) {
        log::warn!("Recording stopped due to error: {}", e);
        summary.failed = true;
    }
    if let Err(e) = sink.flush() {
        log::warn!("Failed to flush recording: {}", e);
        summary.failed = true;
    }

    summary
}

fn record<D: CaptureDevice, W: Write>(
    running: &AtomicBool,
    device: &mut DeviceGuard<D>,
    sink: &mut W,
    config: &CaptureConfiguration,
    summary: &mut CaptureSummary,
) -> Result<(), CaptureError> {
    wav_format::write_header(sink, config.sample_rate, config.channels, config.bit_depth)
        .map_err(|e| CaptureError::StorageError(format!("failed to write header: {}", e)))?;
    summary.bytes_written += WAV_HEADER_SIZE as u64;

    device.start_recording()?;

    let block_size = device.device.min_buffer_size().max(2);
    let mut buffer = vec![0u8; block_size];

    while running.load(Ordering::SeqCst) {
        let read = device.device.read(&mut buffer)?.min(block_size);
        if read == 0 {
            summary.empty_reads += 1;
            continue;
        }
        sink.write_all(&buffer[..read])
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
        summary.reads += 1;
        summary.bytes_written += read as u64;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::raw_pcm::extract_raw_pcm;
    use crate::processing::wav_format::{pcm_from_bytes, skip_header, WavHeader};
    use std::collections::VecDeque;
    use std::io;
    use std::time::{Duration, Instant};

    #[derive(Debug, Default)]
    struct DeviceLog {
        initialized: usize,
        started: usize,
        stopped: usize,
        released: usize,
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Failure {
        None,
        Init,
        NeverRecords,
    }

    struct FakeDevice {
        script: VecDeque<Result<Vec<u8>, CaptureError>>,
        idle_read: Duration,
        failure: Failure,
        recording: bool,
        log: Arc<Mutex<DeviceLog>>,
    }

    impl FakeDevice {
        fn new(script: Vec<Result<Vec<u8>, CaptureError>>) -> (Self, Arc<Mutex<DeviceLog>>) {
            let log = Arc::new(Mutex::new(DeviceLog::default()));
            let device = Self {
                script: script.into(),
                idle_read: Duration::from_millis(1),
                failure: Failure::None,
                recording: false,
                log: Arc::clone(&log),
            };
            (device, log)
        }
    }

    impl CaptureDevice for FakeDevice {
        fn initialize(&mut self, _config: &CaptureConfiguration) -> Result<(), CaptureError> {
            if self.failure == Failure::Init {
                return Err(CaptureError::DeviceInitFailed("no microphone".into()));
            }
            self.log.lock().initialized += 1;
            Ok(())
        }

        fn min_buffer_size(&self) -> usize {
            64
        }

        fn start_recording(&mut self) -> Result<(), CaptureError> {
            self.log.lock().started += 1;
            self.recording = self.failure != Failure::NeverRecords;
            Ok(())
        }

        fn is_recording(&self) -> bool {
            self.recording
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
            match self.script.pop_front() {
                Some(Ok(data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                Some(Err(e)) => Err(e),
                None => {
                    thread::sleep(self.idle_read);
                    Ok(0)
                }
            }
        }

        fn stop(&mut self) {
            self.recording = false;
            self.log.lock().stopped += 1;
        }

        fn release(&mut self) {
            self.log.lock().released += 1;
        }
    }

    /// `Write` into a buffer the test can inspect while the loop runs.
    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl SharedSink {
        fn bytes(&self) -> Vec<u8> {
            self.0.lock().clone()
        }
    }

    impl io::Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for capture loop");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn streams_header_then_samples() {
        let (device, log) = FakeDevice::new(vec![Ok(vec![1, 0, 2, 0]), Ok(vec![]), Ok(vec![0xFF, 0xFF])]);
        let recorder = WavRecorder::new(device);
        let sink = SharedSink::default();

        recorder.start(sink.clone()).unwrap();
        assert_eq!(recorder.state(), CaptureState::Running);
        wait_for(|| sink.bytes().len() >= WAV_HEADER_SIZE + 6);

        let summary = recorder.stop().expect("loop should stop in time");
        assert_eq!(recorder.state(), CaptureState::Stopped);
        assert_eq!(summary.bytes_written, (WAV_HEADER_SIZE + 6) as u64);
        assert_eq!(summary.reads, 2);
        assert!(summary.empty_reads >= 1);
        assert!(!summary.failed);

        let bytes = sink.bytes();
        let header = WavHeader::parse(&bytes).unwrap();
        assert!(header.is_streaming());
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.channels, 1);
        assert_eq!(header.bit_depth, 16);
        assert_eq!(&bytes[WAV_HEADER_SIZE..], &[1, 0, 2, 0, 0xFF, 0xFF]);

        let log = log.lock();
        assert_eq!(log.initialized, 1);
        assert_eq!(log.stopped, 1);
        assert_eq!(log.released, 1);
    }

    #[test]
    fn captured_samples_round_trip_through_reader() {
        let samples: Vec<i16> = vec![0, 1, -1, i16::MAX, i16::MIN, 12345, -12345];
        let pcm = wav_format::pcm_to_bytes(&samples);
        let (device, _) = FakeDevice::new(vec![Ok(pcm[..6].to_vec()), Ok(pcm[6..].to_vec())]);
        let recorder = WavRecorder::new(device);
        let sink = SharedSink::default();

        recorder.start(sink.clone()).unwrap();
        wait_for(|| sink.bytes().len() >= WAV_HEADER_SIZE + pcm.len());
        recorder.stop();

        let bytes = sink.bytes();
        let mut reader = bytes.as_slice();
        skip_header(&mut reader).unwrap();
        assert_eq!(pcm_from_bytes(reader), samples);

        let info = extract_raw_pcm(&mut bytes.as_slice()).unwrap();
        assert_eq!(info.duration_micros, 7 * 1_000_000 / 44_100);
    }

    #[test]
    fn stop_before_any_data_still_writes_header() {
        let (device, log) = FakeDevice::new(vec![]);
        let recorder = WavRecorder::new(device);
        let sink = SharedSink::default();

        recorder.start(sink.clone()).unwrap();
        let summary = recorder.stop().expect("loop should stop in time");

        assert_eq!(summary.reads, 0);
        assert_eq!(sink.bytes().len(), WAV_HEADER_SIZE);
        assert_eq!(log.lock().released, 1);
    }

    #[test]
    fn init_failure_is_reported_synchronously() {
        let (mut device, log) = FakeDevice::new(vec![]);
        device.failure = Failure::Init;
        let recorder = WavRecorder::new(device);
        let sink = SharedSink::default();

        let result = recorder.start(sink.clone());
        assert_eq!(result, Err(CaptureError::DeviceInitFailed("no microphone".into())));
        assert_eq!(recorder.state(), CaptureState::Stopped);
        assert!(sink.bytes().is_empty());

        let log = log.lock();
        assert_eq!(log.released, 1);
        assert_eq!(log.started, 0);
    }

    #[test]
    fn device_that_never_records_aborts_loop() {
        let (mut device, log) = FakeDevice::new(vec![Ok(vec![9, 9])]);
        device.failure = Failure::NeverRecords;
        let recorder = WavRecorder::new(device);
        let sink = SharedSink::default();

        recorder.start(sink.clone()).unwrap();
        wait_for(|| !recorder.is_running());

        let summary = recorder.stop().unwrap();
        assert!(summary.failed);
        assert_eq!(sink.bytes().len(), WAV_HEADER_SIZE);
        assert_eq!(log.lock().released, 1);
    }

    #[test]
    fn read_error_ends_loop_without_reaching_caller() {
        let (device, log) = FakeDevice::new(vec![
            Ok(vec![4, 0]),
            Err(CaptureError::ReadFailed("buffer overrun".into())),
            Ok(vec![8, 0]),
        ]);
        let recorder = WavRecorder::new(device);
        let sink = SharedSink::default();

        recorder.start(sink.clone()).unwrap();
        wait_for(|| !recorder.is_running());

        let summary = recorder.stop().unwrap();
        assert!(summary.failed);
        assert_eq!(summary.reads, 1);
        assert_eq!(&sink.bytes()[WAV_HEADER_SIZE..], &[4, 0]);
        assert_eq!(log.lock().released, 1);
    }

    #[test]
    fn recorder_cannot_be_restarted() {
        let (device, _) = FakeDevice::new(vec![]);
        let recorder = WavRecorder::new(device);

        recorder.start(io::sink()).unwrap();
        assert!(matches!(recorder.start(io::sink()), Err(CaptureError::InvalidState(_))));
        recorder.stop();
        assert!(matches!(recorder.start(io::sink()), Err(CaptureError::InvalidState(_))));
    }

    #[test]
    fn stop_gives_up_after_timeout() {
        let (mut device, log) = FakeDevice::new(vec![]);
        device.idle_read = Duration::from_millis(400);
        let config = CaptureConfiguration {
            stop_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let recorder = WavRecorder::with_config(device, config);

        recorder.start(io::sink()).unwrap();
        thread::sleep(Duration::from_millis(50));

        let begin = Instant::now();
        assert_eq!(recorder.stop(), None);
        assert!(begin.elapsed() < Duration::from_millis(300));

        // The loop still finishes and releases the device on its own.
        wait_for(|| log.lock().released == 1);
    }
}
