//! The location result model shared by every other module.
//!
//! A [`LocationResult`] is either an exact position read from EXIF GPS tags or an
//! estimate produced by a model. The two variants carry different optional fields,
//! so the mutual exclusion between `accuracy` and `confidence` holds by construction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("Latitude must be a finite number in [-90, 90], got {0}")]
    LatitudeOutOfRange(f64),

    #[error("Longitude must be a finite number in [-180, 180], got {0}")]
    LongitudeOutOfRange(f64),

    #[error("Accuracy must be a finite, non-negative number of meters, got {0}")]
    InvalidAccuracy(f64),

    #[error("Confidence must be a finite number in [0, 1], got {0}")]
    InvalidConfidence(f64),

    #[error("Source must not be empty")]
    EmptySource,

    #[error("Unknown location type: {0}")]
    UnknownKind(String),

    #[error("Field `{field}` is not allowed on {kind} results")]
    FieldNotAllowed {
        field: &'static str,
        kind: LocationKind,
    },
}

/// Discriminant of a [`LocationResult`], with the wire names used by the upload
/// endpoint and by shareable links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum LocationKind {
    #[serde(rename = "EXIF")]
    Exif,
    #[serde(rename = "ESTIMATE")]
    Estimate,
}

impl LocationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exif => "EXIF",
            Self::Estimate => "ESTIMATE",
        }
    }

    /// Parses the exact wire name. Anything else, including other casings, is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "EXIF" => Some(Self::Exif),
            "ESTIMATE" => Some(Self::Estimate),
            _ => None,
        }
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        if !latitude.is_finite() || !(MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude) {
            return Err(LocationError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude) {
            return Err(LocationError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// `(0, 0)` is the "no coordinates" sentinel, not a point in the Gulf of Guinea.
    pub fn is_usable(&self) -> bool {
        !(self.latitude == 0.0 && self.longitude == 0.0)
    }
}

fn validated_source(source: impl Into<String>) -> Result<String, LocationError> {
    let source = source.into();
    if source.trim().is_empty() {
        return Err(LocationError::EmptySource);
    }
    Ok(source)
}

/// A position read from the GPS tag group of the image metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ExifLocation {
    coordinates: Coordinates,
    accuracy: Option<f64>,
    source: String,
    raw_metadata: Option<Map<String, Value>>,
}

impl ExifLocation {
    pub fn new(
        coordinates: Coordinates,
        accuracy: Option<f64>,
        source: impl Into<String>,
        raw_metadata: Option<Map<String, Value>>,
    ) -> Result<Self, LocationError> {
        if let Some(accuracy) = accuracy
            && (!accuracy.is_finite() || accuracy < 0.0)
        {
            return Err(LocationError::InvalidAccuracy(accuracy));
        }
        Ok(Self {
            coordinates,
            accuracy,
            source: validated_source(source)?,
            raw_metadata,
        })
    }

    /// Horizontal accuracy in meters, when the metadata supplied one.
    pub const fn accuracy(&self) -> Option<f64> {
        self.accuracy
    }

    pub const fn raw_metadata(&self) -> Option<&Map<String, Value>> {
        self.raw_metadata.as_ref()
    }
}

/// A position guessed from image content.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateLocation {
    coordinates: Coordinates,
    confidence: Option<f64>,
    source: String,
}

impl EstimateLocation {
    pub fn new(
        coordinates: Coordinates,
        confidence: Option<f64>,
        source: impl Into<String>,
    ) -> Result<Self, LocationError> {
        if let Some(confidence) = confidence
            && (!confidence.is_finite() || !(0.0..=1.0).contains(&confidence))
        {
            return Err(LocationError::InvalidConfidence(confidence));
        }
        Ok(Self {
            coordinates,
            confidence,
            source: validated_source(source)?,
        })
    }

    pub const fn confidence(&self) -> Option<f64> {
        self.confidence
    }
}

/// The outcome of locating a photo. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "LocationPayload", into = "LocationPayload")]
pub enum LocationResult {
    Exif(ExifLocation),
    Estimate(EstimateLocation),
}

impl LocationResult {
    pub const fn kind(&self) -> LocationKind {
        match self {
            Self::Exif(_) => LocationKind::Exif,
            Self::Estimate(_) => LocationKind::Estimate,
        }
    }

    pub const fn coordinates(&self) -> Coordinates {
        match self {
            Self::Exif(exif) => exif.coordinates,
            Self::Estimate(estimate) => estimate.coordinates,
        }
    }

    pub const fn latitude(&self) -> f64 {
        self.coordinates().latitude()
    }

    pub const fn longitude(&self) -> f64 {
        self.coordinates().longitude()
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Exif(exif) => &exif.source,
            Self::Estimate(estimate) => &estimate.source,
        }
    }

    pub fn has_usable_coordinates(&self) -> bool {
        self.coordinates().is_usable()
    }
}

impl From<ExifLocation> for LocationResult {
    fn from(value: ExifLocation) -> Self {
        Self::Exif(value)
    }
}

impl From<EstimateLocation> for LocationResult {
    fn from(value: EstimateLocation) -> Self {
        Self::Estimate(value)
    }
}

/// The flat JSON shape returned by the upload endpoint:
/// `{type, lat, lng, accuracy?, confidence?, source, exif?}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LocationPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exif: Option<Map<String, Value>>,
}

impl TryFrom<LocationPayload> for LocationResult {
    type Error = LocationError;

    fn try_from(payload: LocationPayload) -> Result<Self, Self::Error> {
        let kind = LocationKind::parse(&payload.kind)
            .ok_or_else(|| LocationError::UnknownKind(payload.kind.clone()))?;
        let coordinates = Coordinates::new(payload.lat, payload.lng)?;

        match kind {
            LocationKind::Exif => {
                if payload.confidence.is_some() {
                    return Err(LocationError::FieldNotAllowed {
                        field: "confidence",
                        kind,
                    });
                }
                ExifLocation::new(coordinates, payload.accuracy, payload.source, payload.exif)
                    .map(Self::Exif)
            }
            LocationKind::Estimate => {
                if payload.accuracy.is_some() {
                    return Err(LocationError::FieldNotAllowed {
                        field: "accuracy",
                        kind,
                    });
                }
                if payload.exif.is_some() {
                    return Err(LocationError::FieldNotAllowed {
                        field: "exif",
                        kind,
                    });
                }
                EstimateLocation::new(coordinates, payload.confidence, payload.source)
                    .map(Self::Estimate)
            }
        }
    }
}

impl From<LocationResult> for LocationPayload {
    fn from(result: LocationResult) -> Self {
        let kind = result.kind().as_str().to_string();
        match result {
            LocationResult::Exif(exif) => Self {
                kind,
                lat: exif.coordinates.latitude,
                lng: exif.coordinates.longitude,
                accuracy: exif.accuracy,
                confidence: None,
                source: exif.source,
                exif: exif.raw_metadata,
            },
            LocationResult::Estimate(estimate) => Self {
                kind,
                lat: estimate.coordinates.latitude,
                lng: estimate.coordinates.longitude,
                accuracy: None,
                confidence: estimate.confidence,
                source: estimate.source,
                exif: None,
            },
        }
    }
}
