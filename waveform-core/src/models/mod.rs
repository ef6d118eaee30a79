pub mod audio_file_info;
pub mod config;
pub mod error;
pub mod state;
