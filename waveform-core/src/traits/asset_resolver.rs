use std::io::Read;

use crate::models::error::WaveformError;
use crate::traits::media::MediaExtractor;

/// Maps a logical asset handle to its content type and readable forms.
pub trait AssetResolver {
    type Handle: ?Sized;

    /// MIME type of the asset, e.g. `audio/wav`.
    fn content_type(&self, handle: &Self::Handle) -> Result<String, WaveformError>;

    /// Raw byte stream of the asset, positioned at its first byte.
    fn open_stream(&self, handle: &Self::Handle) -> Result<Box<dyn Read>, WaveformError>;

    /// Demuxer over the asset.
    fn open_extractor(&self, handle: &Self::Handle) -> Result<Box<dyn MediaExtractor>, WaveformError>;
}
