pub mod geocode;
pub mod readers;

pub use geocode::GeocoderService;
