/// Streaming WAV container utilities.
///
/// The writer emits a standard 44-byte RIFF header whose size fields hold
/// [`STREAMING_SIZE`] because the total length is unknown while recording.
/// Those fields are never patched afterwards. The reader skips the header
/// and reinterprets everything after it as little-endian 16-bit PCM.
use std::io::{self, Read, Write};

use crate::models::error::WaveformError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Sentinel stored in both size fields of a still-growing file.
pub const STREAMING_SIZE: u32 = u32::MAX;

/// Generate a 44-byte WAV RIFF header with sentinel sizes.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    0xFFFFFFFF (unknown, still streaming)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  0xFFFFFFFF (unknown, still streaming)
/// ```
pub fn generate_streaming_header(sample_rate: u32, channels: u16, bit_depth: u16) -> [u8; WAV_HEADER_SIZE] {
    WavHeader::streaming(sample_rate, channels, bit_depth).to_bytes()
}

/// Write the streaming header to `sink`.
pub fn write_header<W: Write + ?Sized>(
    sink: &mut W,
    sample_rate: u32,
    channels: u16,
    bit_depth: u16,
) -> io::Result<()> {
    sink.write_all(&generate_streaming_header(sample_rate, channels, bit_depth))
}

/// Consume exactly [`WAV_HEADER_SIZE`] bytes from `source`.
///
/// Fails with [`WaveformError::HeaderTruncated`] if the stream ends first.
pub fn skip_header<R: Read + ?Sized>(source: &mut R) -> Result<(), WaveformError> {
    let mut header = [0u8; WAV_HEADER_SIZE];
    let mut filled = 0;
    while filled < WAV_HEADER_SIZE {
        match source.read(&mut header[filled..]) {
            Ok(0) => {
                return Err(WaveformError::HeaderTruncated {
                    expected: WAV_HEADER_SIZE,
                    actual: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Read the rest of `source` as little-endian signed 16-bit samples.
///
/// The caller must already have skipped the header. A trailing odd byte is
/// dropped.
pub fn read_pcm<R: Read + ?Sized>(source: &mut R) -> Result<Vec<i16>, WaveformError> {
    let mut data = Vec::new();
    source.read_to_end(&mut data)?;
    Ok(pcm_from_bytes(&data))
}

/// Reinterpret raw bytes as little-endian i16 samples.
pub fn pcm_from_bytes(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Serialize samples as little-endian bytes, the inverse of [`pcm_from_bytes`].
pub fn pcm_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Decoded view of a 44-byte canonical WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub format_code: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bit_depth: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// PCM header for a file whose length is not known yet.
    pub fn streaming(sample_rate: u32, channels: u16, bit_depth: u16) -> Self {
        Self {
            riff_size: STREAMING_SIZE,
            format_code: 1,
            channels,
            sample_rate,
            byte_rate: sample_rate * channels as u32 * bit_depth as u32 / 8,
            block_align: channels * bit_depth / 8,
            bit_depth,
            data_size: STREAMING_SIZE,
        }
    }

    pub fn to_bytes(&self) -> [u8; WAV_HEADER_SIZE] {
        let mut header = [0u8; WAV_HEADER_SIZE];

        // RIFF chunk descriptor
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&self.riff_size.to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");

        // fmt sub-chunk
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes());
        header[20..22].copy_from_slice(&self.format_code.to_le_bytes());
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        header[34..36].copy_from_slice(&self.bit_depth.to_le_bytes());

        // data sub-chunk
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&self.data_size.to_le_bytes());

        header
    }

    /// Parse a canonical 44-byte header. Only the chunk magic and the fmt
    /// chunk size are checked.
    pub fn parse(bytes: &[u8]) -> Result<Self, WaveformError> {
        if bytes.len() < WAV_HEADER_SIZE {
            return Err(WaveformError::HeaderTruncated {
                expected: WAV_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        for (at, magic) in [(0, b"RIFF"), (8, b"WAVE"), (12, b"fmt "), (36, b"data")] {
            if &bytes[at..at + 4] != magic {
                return Err(WaveformError::InvalidHeader(format!(
                    "expected {:?} at offset {}",
                    String::from_utf8_lossy(magic),
                    at
                )));
            }
        }
        if u32_at(16) != 16 {
            return Err(WaveformError::InvalidHeader(format!(
                "unsupported fmt chunk size {}",
                u32_at(16)
            )));
        }

        Ok(Self {
            riff_size: u32_at(4),
            format_code: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bit_depth: u16_at(34),
            data_size: u32_at(40),
        })
    }

    /// Whether both size fields still hold the streaming sentinel.
    pub fn is_streaming(&self) -> bool {
        self.riff_size == STREAMING_SIZE && self.data_size == STREAMING_SIZE
    }
}
