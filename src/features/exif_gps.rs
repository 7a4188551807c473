use crate::location::{Coordinates, ExifLocation, LocationResult};
use serde_json::{Map, Value};

pub const EXIF_SOURCE: &str = "EXIF";

/// Looks a tag up under its bare name (`GPSLatitude`, as exiftool prints it) or with
/// the IFD prefix (`GPS GPSLatitude`, as exifread prints it).
fn get_tag<'a>(tags: &'a Value, name: &str) -> Option<&'a Value> {
    tags.get(name).or_else(|| tags.get(format!("GPS {name}")))
}

fn parse_component(part: &str) -> Option<f64> {
    let part = part.trim();
    if let Some((num, den)) = part.split_once('/') {
        let (num, den) = (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?);
        return (den != 0.0).then(|| num / den);
    }
    part.parse().ok()
}

/// Reads an angle given either as decimal degrees or as degrees, minutes and seconds.
///
/// Accepts numbers, `[d, m, s]` arrays, and strings such as `"[39, 28, 15.3]"` or
/// `"48, 51, 527/25"`.
pub fn parse_angle(value: &Value) -> Option<f64> {
    let parts: Vec<f64> = match value {
        Value::Number(n) => return n.as_f64(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => parse_component(s),
                other => other.as_f64(),
            })
            .collect::<Option<_>>()?,
        Value::String(s) => s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(parse_component)
            .collect::<Option<_>>()?,
        _ => return None,
    };
    dms_to_decimal(&parts)
}

fn dms_to_decimal(parts: &[f64]) -> Option<f64> {
    match *parts {
        [degrees] => Some(degrees),
        [degrees, minutes] => Some(degrees + minutes / 60.0),
        [degrees, minutes, seconds] => Some(degrees + minutes / 60.0 + seconds / 3600.0),
        _ => None,
    }
}

/// Applies a hemisphere reference. `S` and `W` point negative; anything else,
/// including a missing reference, keeps the sign the value already has.
fn apply_ref(value: f64, reference: Option<&Value>) -> f64 {
    match reference.and_then(Value::as_str).map(str::trim) {
        Some(r) if r.eq_ignore_ascii_case("S") || r.eq_ignore_ascii_case("W") => -value.abs(),
        Some(r) if r.eq_ignore_ascii_case("N") || r.eq_ignore_ascii_case("E") => value.abs(),
        _ => value,
    }
}

fn gps_tags(tags: &Value) -> Option<Map<String, Value>> {
    let gps: Map<String, Value> = tags
        .as_object()?
        .iter()
        .filter(|(key, _)| key.starts_with("GPS"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    (!gps.is_empty()).then_some(gps)
}

/// Builds an EXIF location from a tag set, or `None` when it has no usable GPS position.
///
/// The GPS tags are kept as the result's raw metadata. Horizontal accuracy comes from
/// `GPSHPositioningError` when the camera wrote one.
pub fn get_exif_location(tags: &Value) -> Option<LocationResult> {
    let raw_metadata = gps_tags(tags)?;

    let (Some(latitude), Some(longitude)) = (
        get_tag(tags, "GPSLatitude").and_then(parse_angle),
        get_tag(tags, "GPSLongitude").and_then(parse_angle),
    ) else {
        return None;
    };
    let latitude = apply_ref(latitude, get_tag(tags, "GPSLatitudeRef"));
    let longitude = apply_ref(longitude, get_tag(tags, "GPSLongitudeRef"));

    let accuracy = get_tag(tags, "GPSHPositioningError")
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(parse_component)))
        .filter(|a| a.is_finite() && *a >= 0.0);

    let coordinates = Coordinates::new(latitude, longitude).ok()?;
    ExifLocation::new(coordinates, accuracy, EXIF_SOURCE, Some(raw_metadata))
        .ok()
        .map(LocationResult::Exif)
}
