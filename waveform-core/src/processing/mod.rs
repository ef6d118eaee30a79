pub mod bars;
pub mod wav_format;
