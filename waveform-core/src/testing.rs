//! In-memory collaborators for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{Cursor, Read};
use std::rc::Rc;
use std::time::Duration;

use crate::models::error::WaveformError;
use crate::processing::wav_format;
use crate::traits::asset_resolver::AssetResolver;
use crate::traits::media::{AudioDecoder, CodecFactory, DecodedBlock, MediaExtractor, OutputEvent, TrackFormat};

/// Shared record of what the fakes were asked to do.
#[derive(Debug, Default)]
pub struct CallLog {
    pub decoders_created: usize,
    pub units_fed: Vec<i64>,
    pub extractor_released: usize,
    pub decoder_stopped: usize,
    pub decoder_released: usize,
    /// Teardown calls in order, e.g. `["decoder.stop", "decoder.release", "extractor.release"]`.
    pub teardown: Vec<&'static str>,
}

pub type SharedLog = Rc<RefCell<CallLog>>;

pub fn audio_format(duration_micros: u64) -> TrackFormat {
    TrackFormat {
        mime: "audio/mpeg".into(),
        duration_micros: Some(duration_micros),
        sample_rate: Some(44100),
        channels: Some(1),
        codec_private: None,
        pcm_encoding: None,
        max_input_size: None,
    }
}

/// Little-endian PCM bytes holding `count` copies of `value`.
pub fn pcm_block(value: i16, count: usize) -> Vec<u8> {
    wav_format::pcm_to_bytes(&vec![value; count])
}

pub struct FakeExtractor {
    tracks: Vec<TrackFormat>,
    units: Vec<(i64, Vec<u8>)>,
    position: usize,
    log: SharedLog,
}

impl FakeExtractor {
    pub fn new(tracks: Vec<TrackFormat>, units: Vec<(i64, Vec<u8>)>, log: SharedLog) -> Self {
        Self { tracks, units, position: 0, log }
    }
}

impl MediaExtractor for FakeExtractor {
    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn track_format(&self, index: usize) -> Result<TrackFormat, WaveformError> {
        self.tracks.get(index).cloned().ok_or(WaveformError::NoAudioTrack)
    }

    fn select_track(&mut self, _index: usize) -> Result<(), WaveformError> {
        Ok(())
    }

    fn read_sample_data(&mut self, buf: &mut Vec<u8>) -> Result<Option<usize>, WaveformError> {
        let Some((_, data)) = self.units.get(self.position) else {
            return Ok(None);
        };
        buf.clear();
        buf.extend_from_slice(data);
        Ok(Some(data.len()))
    }

    fn sample_time(&self) -> Option<i64> {
        self.units.get(self.position).map(|(ts, _)| *ts)
    }

    fn advance(&mut self) -> bool {
        self.position += 1;
        self.position < self.units.len()
    }

    fn release(&mut self) {
        let mut log = self.log.borrow_mut();
        log.extractor_released += 1;
        log.teardown.push("extractor.release");
    }
}

/// How a [`FakeDecoder`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderMode {
    /// Every input unit comes back as a PCM block with the same bytes and timestamp.
    PassThrough,
    /// Accepts input but never produces output.
    Stuck,
}

pub struct FakeDecoder {
    mode: DecoderMode,
    pending: VecDeque<DecodedBlock>,
    log: SharedLog,
}

impl AudioDecoder for FakeDecoder {
    fn start(&mut self) -> Result<(), WaveformError> {
        Ok(())
    }

    fn input_ready(&mut self, _timeout: Duration) -> Result<bool, WaveformError> {
        Ok(true)
    }

    fn queue_input(&mut self, data: &[u8], pts: i64, end_of_stream: bool) -> Result<(), WaveformError> {
        if !end_of_stream {
            self.log.borrow_mut().units_fed.push(pts);
        }
        if self.mode == DecoderMode::PassThrough {
            self.pending.push_back(DecodedBlock {
                data: data.to_vec(),
                presentation_time_micros: pts,
                end_of_stream,
            });
        }
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Result<OutputEvent, WaveformError> {
        Ok(match self.pending.pop_front() {
            Some(block) => OutputEvent::Block(block),
            None => OutputEvent::TryAgainLater,
        })
    }

    fn stop(&mut self) {
        let mut log = self.log.borrow_mut();
        log.decoder_stopped += 1;
        log.teardown.push("decoder.stop");
    }

    fn release(&mut self) {
        let mut log = self.log.borrow_mut();
        log.decoder_released += 1;
        log.teardown.push("decoder.release");
    }
}

pub struct FakeCodecs {
    pub mode: DecoderMode,
    pub log: SharedLog,
}

impl CodecFactory for FakeCodecs {
    fn create_decoder(&self, _format: &TrackFormat) -> Result<Box<dyn AudioDecoder>, WaveformError> {
        self.log.borrow_mut().decoders_created += 1;
        Ok(Box::new(FakeDecoder {
            mode: self.mode,
            pending: VecDeque::new(),
            log: Rc::clone(&self.log),
        }))
    }
}

/// Resolver over a single in-memory asset.
pub struct FakeResolver {
    pub mime: String,
    pub bytes: Vec<u8>,
    pub tracks: Vec<TrackFormat>,
    pub units: Vec<(i64, Vec<u8>)>,
    pub log: SharedLog,
}

impl AssetResolver for FakeResolver {
    type Handle = str;

    fn content_type(&self, handle: &str) -> Result<String, WaveformError> {
        if handle.is_empty() {
            return Err(WaveformError::AssetUnavailable("empty handle".into()));
        }
        Ok(self.mime.clone())
    }

    fn open_stream(&self, _handle: &str) -> Result<Box<dyn Read>, WaveformError> {
        Ok(Box::new(Cursor::new(self.bytes.clone())))
    }

    fn open_extractor(&self, _handle: &str) -> Result<Box<dyn MediaExtractor>, WaveformError> {
        Ok(Box::new(FakeExtractor::new(
            self.tracks.clone(),
            self.units.clone(),
            Rc::clone(&self.log),
        )))
    }
}
