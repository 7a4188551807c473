use color_eyre::eyre::{bail, eyre};
use geolens::features::exif_gps::get_exif_location;
use geolens::features::geo_metrics::maps_url;
use geolens::features::result_codec::{decode, decode_share_url, share_url};
use geolens::{LocationResult, ResultMetrics};
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

const USAGE: &str = "\
Usage:
  geolens share <result.json> [--base <url>]   Build a shareable link from a result payload
  geolens exif <tags.json> [--base <url>]      Build a shareable link from raw GPS tags
  geolens open <link-or-query>                 Decode a shareable link and print its metrics";

fn print_result(result: &LocationResult) -> color_eyre::Result<()> {
    let report = json!({
        "result": result,
        "metrics": ResultMetrics::of(result),
        "mapsUrl": maps_url(result),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_json(path: &PathBuf) -> color_eyre::Result<Value> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        println!("{USAGE}");
        return Ok(());
    }
    let base: String = args
        .opt_value_from_str("--base")?
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    match args.subcommand()?.as_deref() {
        Some("share") => {
            let path: PathBuf = args.free_from_str()?;
            let result: LocationResult = serde_json::from_value(read_json(&path)?)?;
            println!("{}", share_url(&base, &result));
        }
        Some("exif") => {
            let path: PathBuf = args.free_from_str()?;
            let tags = read_json(&path)?;
            let result = get_exif_location(&tags)
                .ok_or_else(|| eyre!("No usable GPS position in {}", path.display()))?;
            println!("{}", share_url(&base, &result));
        }
        Some("open") => {
            let input: String = args.free_from_str()?;
            let result = if input.contains("://") {
                decode_share_url(&input)?
            } else {
                decode(&input)?
            };
            print_result(&result)?;
        }
        _ => bail!("{USAGE}"),
    }

    Ok(())
}
