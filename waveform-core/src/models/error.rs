use thiserror::Error;

/// Errors that can occur while capturing audio to a streaming WAV sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device not available")]
    DeviceNotAvailable,

    #[error("device initialization failed: {0}")]
    DeviceInitFailed(String),

    #[error("device failed to enter recording state")]
    NotRecording,

    #[error("device read failed: {0}")]
    ReadFailed(String),

    #[error("invalid capture state: {0}")]
    InvalidState(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Coarse classification of a [`WaveformError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The asset itself is unusable. Never retried.
    Input,
    /// The decoder stopped producing output.
    DecodeStall,
    /// The decode/demux collaborator reported a failure.
    Decoder,
    /// Reading the underlying stream failed.
    Io,
}

/// Errors that can occur while extracting a waveform.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaveformError {
    #[error("no audio track")]
    NoAudioTrack,

    #[error("unknown duration")]
    UnknownDuration,

    #[error("zero duration")]
    ZeroDuration,

    #[error("mime not audio: {0}")]
    NotAudio(String),

    #[error("invalid WAV: header truncated ({actual} of {expected} bytes)")]
    HeaderTruncated { expected: usize, actual: usize },

    #[error("invalid WAV header: {0}")]
    InvalidHeader(String),

    #[error("asset unavailable: {0}")]
    AssetUnavailable(String),

    #[error("decoder stalled after {0} iterations without output")]
    DecodeStall(u32),

    #[error("decoder failed: {0}")]
    Decoder(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl WaveformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoAudioTrack
            | Self::UnknownDuration
            | Self::ZeroDuration
            | Self::NotAudio(_)
            | Self::HeaderTruncated { .. }
            | Self::InvalidHeader(_)
            | Self::AssetUnavailable(_) => ErrorKind::Input,
            Self::DecodeStall(_) => ErrorKind::DecodeStall,
            Self::Decoder(_) => ErrorKind::Decoder,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Errors decoding a persisted voice-note draft.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("not a voice note draft: {0}")]
    WrongType(String),

    #[error("invalid draft uri: {0}")]
    InvalidUri(String),

    #[error("draft uri has no size")]
    MissingSize,

    #[error("invalid draft size: {0}")]
    InvalidSize(String),
}

impl From<std::io::Error> for WaveformError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
