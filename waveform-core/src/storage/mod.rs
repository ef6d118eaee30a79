pub mod draft;
pub mod metadata;
pub mod recording_file;
