//! Unsent voice notes persisted as message drafts.
//!
//! The draft value is the recording's URI with `size` and `type` query
//! parameters appended, e.g. `content://part/42?size=1024&type=audio%2Fwav`.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::extract::AUDIO_AAC;
use crate::models::error::DraftError;

/// Draft type tag for voice notes.
pub const VOICE_NOTE: &str = "voice_note";

const SIZE: &str = "size";
const TYPE: &str = "type";

/// A typed draft row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    #[serde(rename = "type")]
    pub draft_type: String,
    pub value: String,
}

/// A recorded but unsent voice note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceNoteDraft {
    pub uri: Url,
    pub size: u64,
    pub content_type: String,
}

impl VoiceNoteDraft {
    /// Build a draft with the default `audio/aac` content type.
    pub fn new(uri: Url, size: u64) -> Self {
        Self::with_content_type(uri, size, AUDIO_AAC)
    }

    pub fn with_content_type(uri: Url, size: u64, content_type: &str) -> Self {
        Self {
            uri,
            size,
            content_type: content_type.to_string(),
        }
    }

    pub fn from_draft(draft: &Draft) -> Result<Self, DraftError> {
        if draft.draft_type != VOICE_NOTE {
            return Err(DraftError::WrongType(draft.draft_type.clone()));
        }

        let mut uri = Url::parse(&draft.value).map_err(|e| DraftError::InvalidUri(e.to_string()))?;

        let mut size = None;
        let mut content_type = None;
        for (key, value) in uri.query_pairs() {
            match &*key {
                SIZE => size = Some(value.into_owned()),
                TYPE => content_type = Some(value.into_owned()),
                _ => {}
            }
        }

        let size = size
            .ok_or(DraftError::MissingSize)?
            .parse::<u64>()
            .map_err(|e| DraftError::InvalidSize(e.to_string()))?;
        uri.set_query(None);

        Ok(Self {
            uri,
            size,
            content_type: content_type.unwrap_or_else(|| AUDIO_AAC.to_string()),
        })
    }

    pub fn as_draft(&self) -> Draft {
        let mut uri = self.uri.clone();
        uri.query_pairs_mut()
            .append_pair(SIZE, &self.size.to_string())
            .append_pair(TYPE, &self.content_type);

        Draft {
            draft_type: VOICE_NOTE.to_string(),
            value: uri.to_string(),
        }
    }
}
