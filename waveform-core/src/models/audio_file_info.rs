use serde::{Deserialize, Serialize};

use super::config::BAR_COUNT;

/// Duration and waveform preview of an audio asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFileInfo {
    /// Total duration in microseconds.
    pub duration_micros: u64,
    /// Normalized amplitude per bar; the loudest bar is 255.
    #[serde(with = "bar_array")]
    pub bars: [u8; BAR_COUNT],
}

impl AudioFileInfo {
    pub fn new(duration_micros: u64, bars: [u8; BAR_COUNT]) -> Self {
        Self { duration_micros, bars }
    }

    /// A zero-length asset: no duration, flat waveform.
    pub fn empty() -> Self {
        Self::new(0, [0; BAR_COUNT])
    }

    pub fn is_silent(&self) -> bool {
        self.bars.iter().all(|&b| b == 0)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_micros as f64 / 1_000_000.0
    }
}

/// serde only derives fixed-size arrays up to 32 elements.
mod bar_array {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::BAR_COUNT;

    pub fn serialize<S: Serializer>(bars: &[u8; BAR_COUNT], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(bars.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; BAR_COUNT], D::Error> {
        let bars = Vec::<u8>::deserialize(deserializer)?;
        let len = bars.len();
        bars.try_into()
            .map_err(|_| D::Error::invalid_length(len, &"exactly 46 bars"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_silent() {
        let info = AudioFileInfo::empty();
        assert_eq!(info.duration_micros, 0);
        assert!(info.is_silent());
    }

    #[test]
    fn json_keeps_all_bars() {
        let mut bars = [0u8; BAR_COUNT];
        bars[45] = 255;
        let info = AudioFileInfo::new(1_500_000, bars);

        let json = serde_json::to_string(&info).unwrap();
        let parsed: AudioFileInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, info);
        assert!((parsed.duration_secs() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn json_with_wrong_bar_count_is_rejected() {
        let json = r#"{"duration_micros":10,"bars":[1,2,3]}"#;
        assert!(serde_json::from_str::<AudioFileInfo>(json).is_err());
    }
}
