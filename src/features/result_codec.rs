//! Shareable-link codec for [`LocationResult`].
//!
//! A result is flattened into `application/x-www-form-urlencoded` pairs with the keys
//! `kind, lat, lng, accuracy?, confidence?, source, exif?`. These key names are the
//! link format: changing them breaks every link already handed out.

use crate::features::error::DecodeError;
use crate::location::{
    Coordinates, EstimateLocation, ExifLocation, LocationError, LocationKind, LocationResult,
};
use serde_json::{Map, Value};

pub const KEY_KIND: &str = "kind";
pub const KEY_LAT: &str = "lat";
pub const KEY_LNG: &str = "lng";
pub const KEY_ACCURACY: &str = "accuracy";
pub const KEY_CONFIDENCE: &str = "confidence";
pub const KEY_SOURCE: &str = "source";
pub const KEY_EXIF: &str = "exif";

/// Path the read-only shared result view is served from.
pub const RESULT_PATH: &str = "result";

/// Serializes a result into a query string (without the leading `?`).
///
/// Numbers are written in the shortest form that parses back to the same `f64`, so
/// coordinates survive the trip bit for bit.
pub fn encode(result: &LocationResult) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair(KEY_KIND, result.kind().as_str());
    query.append_pair(KEY_LAT, &result.latitude().to_string());
    query.append_pair(KEY_LNG, &result.longitude().to_string());

    match result {
        LocationResult::Exif(exif) => {
            if let Some(accuracy) = exif.accuracy() {
                query.append_pair(KEY_ACCURACY, &accuracy.to_string());
            }
        }
        LocationResult::Estimate(estimate) => {
            if let Some(confidence) = estimate.confidence() {
                query.append_pair(KEY_CONFIDENCE, &confidence.to_string());
            }
        }
    }

    query.append_pair(KEY_SOURCE, result.source());

    if let LocationResult::Exif(exif) = result
        && let Some(raw) = exif.raw_metadata()
    {
        query.append_pair(KEY_EXIF, &Value::Object(raw.clone()).to_string());
    }

    query.finish()
}

/// Parses a query string back into a result. A leading `?` is accepted.
pub fn decode(query: &str) -> Result<LocationResult, DecodeError> {
    let query = query.strip_prefix('?').unwrap_or(query);
    decode_pairs(form_urlencoded::parse(query.as_bytes()))
}

#[derive(Default)]
struct RawFields {
    kind: Option<String>,
    lat: Option<String>,
    lng: Option<String>,
    accuracy: Option<String>,
    confidence: Option<String>,
    source: Option<String>,
    exif: Option<String>,
}

impl RawFields {
    fn collect<K, V, I>(pairs: I) -> Result<Self, DecodeError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut fields = Self::default();
        for (key, value) in pairs {
            let key = key.as_ref();
            let slot = match key {
                KEY_KIND => &mut fields.kind,
                KEY_LAT => &mut fields.lat,
                KEY_LNG => &mut fields.lng,
                KEY_ACCURACY => &mut fields.accuracy,
                KEY_CONFIDENCE => &mut fields.confidence,
                KEY_SOURCE => &mut fields.source,
                KEY_EXIF => &mut fields.exif,
                _ => return Err(DecodeError::UnknownField(key.to_string())),
            };
            if slot.replace(value.as_ref().to_string()).is_some() {
                return Err(DecodeError::DuplicateField(key.to_string()));
            }
        }
        Ok(fields)
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, DecodeError> {
    value.ok_or_else(|| DecodeError::MissingField(field.to_string()))
}

fn parse_number(value: &str, field: &str) -> Result<f64, DecodeError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| DecodeError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn parse_exif(value: &str) -> Result<Map<String, Value>, DecodeError> {
    match serde_json::from_str::<Value>(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DecodeError::MalformedExif(
            "expected a JSON object".to_string(),
        )),
        Err(e) => Err(DecodeError::MalformedExif(e.to_string())),
    }
}

fn not_allowed(field: &str, kind: LocationKind) -> DecodeError {
    DecodeError::FieldNotAllowed {
        field: field.to_string(),
        kind,
    }
}

impl From<LocationError> for DecodeError {
    fn from(error: LocationError) -> Self {
        let out_of_range = |field: &str, value: f64| DecodeError::OutOfRange {
            field: field.to_string(),
            value,
        };
        match error {
            LocationError::LatitudeOutOfRange(v) => out_of_range(KEY_LAT, v),
            LocationError::LongitudeOutOfRange(v) => out_of_range(KEY_LNG, v),
            LocationError::InvalidAccuracy(v) => out_of_range(KEY_ACCURACY, v),
            LocationError::InvalidConfidence(v) => out_of_range(KEY_CONFIDENCE, v),
            LocationError::EmptySource => DecodeError::EmptySource,
            LocationError::UnknownKind(kind) => DecodeError::InvalidKind(kind),
            LocationError::FieldNotAllowed { field, kind } => not_allowed(field, kind),
        }
    }
}

/// Strict decoding from already-split key/value pairs.
///
/// Unknown or repeated keys, missing mandatory fields, malformed numbers and
/// malformed `exif` JSON all reject the whole input.
pub fn decode_pairs<K, V, I>(pairs: I) -> Result<LocationResult, DecodeError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let fields = RawFields::collect(pairs)?;

    let kind_value = required(fields.kind, KEY_KIND)?;
    let kind =
        LocationKind::parse(&kind_value).ok_or_else(|| DecodeError::InvalidKind(kind_value))?;
    let lat = parse_number(&required(fields.lat, KEY_LAT)?, KEY_LAT)?;
    let lng = parse_number(&required(fields.lng, KEY_LNG)?, KEY_LNG)?;
    let source = required(fields.source, KEY_SOURCE)?;
    let coordinates = Coordinates::new(lat, lng)?;

    let result: LocationResult = match kind {
        LocationKind::Exif => {
            if fields.confidence.is_some() {
                return Err(not_allowed(KEY_CONFIDENCE, kind));
            }
            let accuracy = fields
                .accuracy
                .as_deref()
                .map(|v| parse_number(v, KEY_ACCURACY))
                .transpose()?;
            let raw_metadata = fields.exif.as_deref().map(parse_exif).transpose()?;
            ExifLocation::new(coordinates, accuracy, source, raw_metadata)?.into()
        }
        LocationKind::Estimate => {
            if fields.accuracy.is_some() {
                return Err(not_allowed(KEY_ACCURACY, kind));
            }
            if fields.exif.is_some() {
                return Err(not_allowed(KEY_EXIF, kind));
            }
            let confidence = fields
                .confidence
                .as_deref()
                .map(|v| parse_number(v, KEY_CONFIDENCE))
                .transpose()?;
            EstimateLocation::new(coordinates, confidence, source)?.into()
        }
    };

    Ok(result)
}

/// Builds `{base}/result?{query}` for a result.
pub fn share_url(base: &str, result: &LocationResult) -> String {
    format!(
        "{}/{RESULT_PATH}?{}",
        base.trim_end_matches('/'),
        encode(result)
    )
}

/// Decodes the query part of a full shareable link. Fragments are ignored.
pub fn decode_share_url(url: &str) -> Result<LocationResult, DecodeError> {
    let url = url.split_once('#').map_or(url, |(before, _)| before);
    let (_, query) = url.split_once('?').ok_or(DecodeError::MissingQuery)?;
    decode(query)
}
