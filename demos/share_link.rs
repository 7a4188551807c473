use geolens::features::exif_gps::get_exif_location;
use geolens::features::geo_metrics::{estimate_radius, format_distance};
use geolens::features::result_codec::{decode_share_url, share_url};
use geolens::{Coordinates, EstimateLocation, LocationResult};
use serde_json::json;

/// Build links for an exact and an estimated result, then open them again.
fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let tags = json!({
        "GPS GPSLatitude": "[40, 42, 46.08]",
        "GPS GPSLatitudeRef": "N",
        "GPS GPSLongitude": "[74, 0, 21.6]",
        "GPS GPSLongitudeRef": "W"
    });
    let exact = get_exif_location(&tags).ok_or_else(|| color_eyre::eyre::eyre!("no GPS"))?;

    let estimate: LocationResult =
        EstimateLocation::new(Coordinates::new(35.6762, 139.6503)?, Some(0.55), "geo-model")?
            .into();

    for result in [exact, estimate] {
        let url = share_url("https://geolens.example", &result);
        let reopened = decode_share_url(&url)?;
        assert_eq!(reopened, result);
        println!("{url}");
        println!(
            "\t{} within {}",
            result.kind(),
            format_distance(estimate_radius(&reopened))
        );
    }

    Ok(())
}
