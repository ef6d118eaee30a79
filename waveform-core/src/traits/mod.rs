pub mod asset_resolver;
pub mod capture_device;
pub mod media;
