//! Symphonia-backed demuxer and decoder.
//!
//! `SymphoniaExtractor` walks a container's packets for one track and
//! `SymphoniaDecoder` turns those packets into interleaved 16-bit PCM blocks.
//! Decoding is synchronous, so the decoder's output queue fills as soon as a
//! unit is queued.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use symphonia::core::audio::{Channels, SampleBuffer, SignalSpec};
use symphonia::core::codecs::{
    CodecParameters, CodecType, Decoder, DecoderOptions, CODEC_TYPE_AAC, CODEC_TYPE_ALAC, CODEC_TYPE_FLAC,
    CODEC_TYPE_MP3, CODEC_TYPE_NULL, CODEC_TYPE_PCM_F32LE, CODEC_TYPE_PCM_S16LE, CODEC_TYPE_PCM_S24LE,
    CODEC_TYPE_PCM_S32LE, CODEC_TYPE_PCM_U8, CODEC_TYPE_VORBIS,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;

use waveform_core::models::error::WaveformError;
use waveform_core::processing::wav_format;
use waveform_core::traits::media::{
    AudioDecoder, CodecFactory, DecodedBlock, MediaExtractor, OutputEvent, PcmEncoding, TrackFormat,
};

/// Codecs this backend can hand back to a decoder, by MIME type.
const CODEC_MIMES: &[(CodecType, &str)] = &[
    (CODEC_TYPE_MP3, "audio/mpeg"),
    (CODEC_TYPE_AAC, "audio/aac"),
    (CODEC_TYPE_FLAC, "audio/flac"),
    (CODEC_TYPE_VORBIS, "audio/vorbis"),
    (CODEC_TYPE_ALAC, "audio/alac"),
];

/// MIME of uncompressed tracks; the layout travels in [`TrackFormat::pcm_encoding`].
pub const AUDIO_RAW: &str = "audio/raw";

/// MIME for codecs symphonia can demux but this backend does not map.
pub const AUDIO_UNKNOWN: &str = "audio/x-unknown";

const PCM_CODECS: &[(CodecType, PcmEncoding)] = &[
    (CODEC_TYPE_PCM_U8, PcmEncoding::U8),
    (CODEC_TYPE_PCM_S16LE, PcmEncoding::S16Le),
    (CODEC_TYPE_PCM_S24LE, PcmEncoding::S24Le),
    (CODEC_TYPE_PCM_S32LE, PcmEncoding::S32Le),
    (CODEC_TYPE_PCM_F32LE, PcmEncoding::F32Le),
];

pub fn pcm_encoding_for_codec(codec: CodecType) -> Option<PcmEncoding> {
    PCM_CODECS.iter().find(|(c, _)| *c == codec).map(|(_, e)| *e)
}

pub fn codec_for_pcm_encoding(encoding: PcmEncoding) -> CodecType {
    PCM_CODECS
        .iter()
        .find(|(_, e)| *e == encoding)
        .map(|(c, _)| *c)
        .unwrap_or(CODEC_TYPE_PCM_S16LE)
}

pub fn mime_for_codec(codec: CodecType) -> &'static str {
    if codec == CODEC_TYPE_NULL {
        return "application/octet-stream";
    }
    if pcm_encoding_for_codec(codec).is_some() {
        return AUDIO_RAW;
    }
    CODEC_MIMES
        .iter()
        .find(|(c, _)| *c == codec)
        .map(|(_, mime)| *mime)
        .unwrap_or(AUDIO_UNKNOWN)
}

fn mime_essence(mime: &str) -> &str {
    mime.split(';').next().unwrap_or_default().trim()
}

pub fn codec_for_mime(mime: &str) -> Option<CodecType> {
    let essence = mime_essence(mime);
    CODEC_MIMES
        .iter()
        .find(|(_, m)| m.eq_ignore_ascii_case(essence))
        .map(|(c, _)| *c)
}

/// Codec for `format`: raw tracks by their PCM layout, everything else by MIME.
fn codec_for_format(format: &TrackFormat) -> Option<CodecType> {
    if mime_essence(&format.mime).eq_ignore_ascii_case(AUDIO_RAW) {
        return format.pcm_encoding.map(codec_for_pcm_encoding);
    }
    codec_for_mime(&format.mime)
}

/// Convert a timestamp in `time_base` units to microseconds.
fn ts_to_micros(ts: u64, time_base: Option<TimeBase>, sample_rate: Option<u32>) -> u64 {
    match (time_base, sample_rate) {
        (Some(tb), _) => {
            let time = tb.calc_time(ts);
            time.seconds * 1_000_000 + (time.frac * 1_000_000.0).round() as u64
        }
        (None, Some(rate)) if rate > 0 => ((ts as u128 * 1_000_000) / rate as u128) as u64,
        _ => ts,
    }
}

fn track_format(track: &Track) -> TrackFormat {
    let params = &track.codec_params;
    TrackFormat {
        mime: mime_for_codec(params.codec).to_string(),
        duration_micros: params
            .n_frames
            .map(|frames| ts_to_micros(frames, params.time_base, params.sample_rate)),
        sample_rate: params.sample_rate,
        channels: params.channels.map(|c| c.count() as u16),
        codec_private: params.extra_data.as_ref().map(|data| data.to_vec()),
        pcm_encoding: pcm_encoding_for_codec(params.codec),
        max_input_size: max_input_size(params),
    }
}

/// Largest packet in bytes, derivable for fixed-width sample codecs.
fn max_input_size(params: &CodecParameters) -> Option<usize> {
    let frames = params.max_frames_per_packet?;
    let bits = params.bits_per_coded_sample.or(params.bits_per_sample)?;
    let channels = params.channels?.count();
    Some(frames as usize * channels * (bits as usize).div_ceil(8))
}

fn is_end_of_stream(err: &SymphoniaError) -> bool {
    matches!(err, SymphoniaError::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof)
}

/// Demuxer over any container symphonia can probe.
pub struct SymphoniaExtractor {
    reader: Box<dyn FormatReader>,
    tracks: Vec<Track>,
    selected: Option<usize>,
    current: Option<Packet>,
}

impl SymphoniaExtractor {
    /// Probe `source`. `extension` is a format hint, e.g. `"m4a"`.
    pub fn open(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Self, WaveformError> {
        let stream = MediaSourceStream::new(source, Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| WaveformError::Decoder(format!("probe failed: {}", e)))?;

        let tracks = probed.format.tracks().to_vec();
        log::debug!("Probed container with {} track(s)", tracks.len());

        Ok(Self {
            reader: probed.format,
            tracks,
            selected: None,
            current: None,
        })
    }

    fn selected_track(&self) -> Option<&Track> {
        self.selected.and_then(|i| self.tracks.get(i))
    }

    /// Pull the next packet belonging to the selected track.
    fn next_packet(&mut self) -> Option<Packet> {
        let track_id = self.selected_track()?.id;
        loop {
            match self.reader.next_packet() {
                Ok(packet) if packet.track_id() == track_id => return Some(packet),
                Ok(_) => continue,
                Err(e) if is_end_of_stream(&e) => return None,
                Err(e) => {
                    log::warn!("Demuxer stopped early: {}", e);
                    return None;
                }
            }
        }
    }
}

impl MediaExtractor for SymphoniaExtractor {
    fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn track_format(&self, index: usize) -> Result<TrackFormat, WaveformError> {
        self.tracks
            .get(index)
            .map(track_format)
            .ok_or_else(|| WaveformError::Decoder(format!("no track at index {}", index)))
    }

    fn select_track(&mut self, index: usize) -> Result<(), WaveformError> {
        if index >= self.tracks.len() {
            return Err(WaveformError::Decoder(format!("no track at index {}", index)));
        }
        self.selected = Some(index);
        self.current = self.next_packet();
        Ok(())
    }

    fn read_sample_data(&mut self, buf: &mut Vec<u8>) -> Result<Option<usize>, WaveformError> {
        let Some(packet) = &self.current else {
            return Ok(None);
        };
        buf.clear();
        buf.extend_from_slice(packet.buf());
        Ok(Some(packet.buf().len()))
    }

    fn sample_time(&self) -> Option<i64> {
        let packet = self.current.as_ref()?;
        let params = &self.selected_track()?.codec_params;
        Some(ts_to_micros(packet.ts(), params.time_base, params.sample_rate) as i64)
    }

    fn advance(&mut self) -> bool {
        self.current = self.next_packet();
        self.current.is_some()
    }

    fn release(&mut self) {
        self.current = None;
        self.selected = None;
        log::debug!("Extractor released");
    }
}

/// Creates symphonia decoders from a [`TrackFormat`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaCodecs;

impl SymphoniaCodecs {
    pub fn new() -> Self {
        Self
    }
}

impl CodecFactory for SymphoniaCodecs {
    fn create_decoder(&self, format: &TrackFormat) -> Result<Box<dyn AudioDecoder>, WaveformError> {
        let codec = codec_for_format(format)
            .ok_or_else(|| WaveformError::Decoder(format!("no decoder for {}", format.mime)))?;

        let mut params = CodecParameters::new();
        params.for_codec(codec);
        if let Some(rate) = format.sample_rate {
            params.with_sample_rate(rate);
        }
        if let Some(count) = format.channels.filter(|c| *c > 0 && *c <= 32) {
            params.with_channels(Channels::from_bits_truncate((1u64 << count).wrapping_sub(1) as u32));
        }
        if let Some(data) = &format.codec_private {
            params.with_extra_data(data.clone().into_boxed_slice());
        }
        if let Some(encoding) = pcm_encoding_for_codec(codec) {
            params
                .with_bits_per_sample(encoding.bits_per_sample())
                .with_bits_per_coded_sample(encoding.bits_per_sample());
            let frame_size = encoding.bytes_per_sample() * format.channels.unwrap_or(1).max(1) as usize;
            let max_frames = format
                .max_input_size
                .ok_or_else(|| WaveformError::Decoder("raw PCM track without a maximum input size".into()))?
                / frame_size;
            params.with_max_frames_per_packet(max_frames as u64);
        }

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| WaveformError::Decoder(format!("failed to create {} decoder: {}", format.mime, e)))?;

        log::debug!("Created decoder for {}", format.mime);
        Ok(Box::new(SymphoniaDecoder::new(decoder)))
    }
}

/// Synchronous decoder behind the two-queue [`AudioDecoder`] interface.
pub struct SymphoniaDecoder {
    decoder: Box<dyn Decoder>,
    output: VecDeque<OutputEvent>,
    spec: Option<SignalSpec>,
    samples: Option<SampleBuffer<i16>>,
    started: bool,
}

impl SymphoniaDecoder {
    pub fn new(decoder: Box<dyn Decoder>) -> Self {
        Self {
            decoder,
            output: VecDeque::new(),
            spec: None,
            samples: None,
            started: false,
        }
    }

    fn decode_unit(&mut self, data: &[u8], presentation_time_micros: i64) -> Result<(), WaveformError> {
        let packet = Packet::new_from_slice(0, presentation_time_micros.max(0) as u64, 0, data);
        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("Skipping undecodable unit at {}us: {}", presentation_time_micros, e);
                return Ok(());
            }
            Err(e) => return Err(WaveformError::Decoder(e.to_string())),
        };

        let spec = *decoded.spec();
        if self.spec != Some(spec) {
            self.output.push_back(OutputEvent::FormatChanged(format!(
                "{} Hz, {} channel(s)",
                spec.rate,
                spec.channels.count()
            )));
            self.spec = Some(spec);
            self.samples = None;
        }

        let frames = decoded.capacity();
        if self.samples.as_ref().is_some_and(|buf| buf.capacity() < frames * spec.channels.count()) {
            self.samples = None;
        }
        let samples = self
            .samples
            .get_or_insert_with(|| SampleBuffer::<i16>::new(frames as u64, spec));
        samples.copy_interleaved_ref(decoded);

        self.output.push_back(OutputEvent::Block(DecodedBlock {
            data: wav_format::pcm_to_bytes(samples.samples()),
            presentation_time_micros,
            end_of_stream: false,
        }));
        Ok(())
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn start(&mut self) -> Result<(), WaveformError> {
        self.started = true;
        Ok(())
    }

    fn input_ready(&mut self, _timeout: Duration) -> Result<bool, WaveformError> {
        Ok(self.started)
    }

    fn queue_input(
        &mut self,
        data: &[u8],
        presentation_time_micros: i64,
        end_of_stream: bool,
    ) -> Result<(), WaveformError> {
        if !self.started {
            return Err(WaveformError::Decoder("decoder not started".into()));
        }
        if !data.is_empty() {
            self.decode_unit(data, presentation_time_micros)?;
        }
        if end_of_stream {
            self.output.push_back(OutputEvent::Block(DecodedBlock {
                data: Vec::new(),
                presentation_time_micros,
                end_of_stream: true,
            }));
        }
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Result<OutputEvent, WaveformError> {
        Ok(self.output.pop_front().unwrap_or(OutputEvent::TryAgainLater))
    }

    fn stop(&mut self) {
        self.started = false;
        self.output.clear();
        self.decoder.reset();
    }

    fn release(&mut self) {
        self.samples = None;
        log::debug!("Decoder released");
    }
}
