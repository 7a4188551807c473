//! Stateless building blocks: metrics, the shareable-link codec, the file gate and
//! EXIF GPS extraction.
pub mod error;
pub mod exif_gps;
pub mod file_acceptance;
pub mod geo_metrics;
pub mod result_codec;
