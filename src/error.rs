use thiserror::Error;

/// The primary error type for the geolens crate.
#[derive(Error, Debug)]
pub enum GeolensError {
    #[error("Invalid location: {0}")]
    Location(#[from] crate::location::LocationError),

    #[error("Metric computation failed: {0}")]
    GeoMetrics(#[from] crate::features::error::GeoMetricsError),

    #[error("Shareable link could not be decoded: {0}")]
    Decode(#[from] crate::features::error::DecodeError),

    #[error("File rejected: {0}")]
    Rejected(#[from] crate::features::error::Rejection),

    // --- Upload Errors ---
    #[error("Upload could not start: {0}")]
    Start(#[from] crate::upload::StartError),

    #[error("Upload failed: {0}")]
    Session(#[from] crate::upload::SessionFailure),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
