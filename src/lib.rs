//! # Geolens
//!
//! Locate a photo and share where it was taken.
//!
//! A photo's location comes either from its EXIF GPS tags (exact) or from an estimate
//! made from its content. This crate holds the logic around that result:
//!
//! - **Location Result**: a closed [`LocationResult`] type, exact or estimated, validated on construction.
//! - **Geo Metrics**: uncertainty radius, confidence tier and coordinate formatting for display.
//! - **Shareable Links**: a lossless, strict codec between a result and a URL query string.
//! - **Uploads**: a single-flight upload session with progress events, cancellation and typed failures.
//! - **File Acceptance**: the type and size gate a file passes before it is uploaded.
//! - **EXIF GPS**: building an exact result from a raw GPS tag set.
//!
//! ## Usage
//!
//! ```rust
//! use geolens::{Coordinates, ExifLocation, LocationResult};
//! use geolens::features::geo_metrics::estimate_radius;
//! use geolens::features::result_codec::{decode, encode};
//!
//! # fn main() -> Result<(), geolens::GeolensError> {
//! let coordinates = Coordinates::new(48.8584, 2.2945)?;
//! let result: LocationResult = ExifLocation::new(coordinates, Some(5.0), "EXIF", None)?.into();
//!
//! assert_eq!(estimate_radius(&result), 5.0);
//!
//! let query = encode(&result);
//! assert_eq!(decode(&query)?, result);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod features;
pub mod location;
pub mod upload;

pub use error::GeolensError;
pub use features::file_acceptance::{CandidateFile, FileAcceptance, FileMetadata};
pub use features::geo_metrics::{ConfidenceLevel, ResultMetrics};
pub use location::{
    Coordinates, EstimateLocation, ExifLocation, LocationKind, LocationPayload, LocationResult,
};
pub use upload::Uploader;
