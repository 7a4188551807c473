use crate::features::error::GeoMetricsError;
use crate::location::LocationResult;
use serde::{Deserialize, Serialize};

/// Nominal GPS precision used when the metadata has no horizontal accuracy.
pub const DEFAULT_EXIF_RADIUS_METERS: f64 = 10.0;
/// Radius of an estimate made with full confidence.
pub const MIN_ESTIMATE_RADIUS_METERS: f64 = 1_000.0;
/// Radius of an estimate made with zero confidence.
pub const MAX_ESTIMATE_RADIUS_METERS: f64 = 50_000.0;

pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.7;
pub const MEDIUM_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Coarse bucketing of a confidence score, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::High => "Very likely to be accurate",
            Self::Medium => "Moderately likely to be accurate",
            Self::Low => "Less likely to be accurate",
        }
    }
}

/// Radius in meters of the uncertainty circle drawn around a result.
///
/// EXIF results use their accuracy, or [`DEFAULT_EXIF_RADIUS_METERS`] without one.
/// Estimates interpolate geometrically between 50 km at confidence 0 and 1 km at
/// confidence 1:
///
/// ```text
/// r(c) = 50_000 * (1_000 / 50_000)^c
/// ```
///
/// which is strictly decreasing in `c`, so every step up in confidence shrinks the
/// circle by the same factor. A missing confidence counts as zero.
pub fn estimate_radius(result: &LocationResult) -> f64 {
    match result {
        LocationResult::Exif(exif) => exif.accuracy().unwrap_or(DEFAULT_EXIF_RADIUS_METERS),
        LocationResult::Estimate(estimate) => {
            let confidence = estimate.confidence().unwrap_or(0.0);
            let ratio = MIN_ESTIMATE_RADIUS_METERS / MAX_ESTIMATE_RADIUS_METERS;
            MAX_ESTIMATE_RADIUS_METERS * ratio.powf(confidence)
        }
    }
}

pub fn classify_confidence(confidence: f64) -> Result<ConfidenceLevel, GeoMetricsError> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(GeoMetricsError::InvalidArgument(confidence));
    }
    Ok(if confidence >= HIGH_CONFIDENCE_THRESHOLD {
        ConfidenceLevel::High
    } else if confidence >= MEDIUM_CONFIDENCE_THRESHOLD {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    })
}

pub fn format_coordinates(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.6}, {longitude:.6}")
}

/// Human-readable distance, in meters below a kilometer and in kilometers above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} meters", meters.round())
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

pub fn maps_url(result: &LocationResult) -> Option<String> {
    result.has_usable_coordinates().then(|| {
        format!(
            "https://www.google.com/maps?q={},{}",
            result.latitude(),
            result.longitude()
        )
    })
}

/// Everything a renderer needs to draw a result, derived without touching it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetrics {
    pub radius_meters: f64,
    pub distance_label: String,
    pub confidence_level: Option<ConfidenceLevel>,
    /// `None` when the result carries the `(0, 0)` "no coordinates" sentinel.
    pub coordinates_label: Option<String>,
}

impl ResultMetrics {
    pub fn of(result: &LocationResult) -> Self {
        let radius_meters = estimate_radius(result);
        let confidence_level = match result {
            LocationResult::Exif(_) => None,
            LocationResult::Estimate(estimate) => estimate
                .confidence()
                .and_then(|c| classify_confidence(c).ok()),
        };
        let coordinates_label = result
            .has_usable_coordinates()
            .then(|| format_coordinates(result.latitude(), result.longitude()));

        Self {
            radius_meters,
            distance_label: format_distance(radius_meters),
            confidence_level,
            coordinates_label,
        }
    }
}
