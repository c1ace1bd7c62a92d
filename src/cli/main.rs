use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use geotag_card::{config, exif, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "geotag-card",
    version,
    about = "Burn a geotag card (map, address, date/time, coordinates, weather) into a photo and embed matching EXIF GPS and date tags"
)]
struct Cli {
    /// Image to stamp (JPEG, PNG, WebP or TIFF)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Date as YYYY-MM-DD
    #[arg(long)]
    date: Option<String>,

    /// Time as HH:MM
    #[arg(long)]
    time: Option<String>,

    /// Map screenshot to place on the card
    #[arg(long, value_name = "FILE")]
    map: Option<PathBuf>,

    /// Output file (default: <stem>_geotagged.<ext> next to the input)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Skip reverse geocoding, weather and static map lookups
    #[arg(long)]
    offline: bool,

    /// Output the run report as JSON
    #[arg(long)]
    json: bool,

    /// Display the GPS, date and camera EXIF tags of INPUT and exit
    #[arg(long = "show-exif")]
    show_exif: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    let Some(input) = cli.input.as_deref() else {
        anyhow::bail!("No input image specified. Use --help for usage.");
    };

    // Handle --show-exif
    if cli.show_exif {
        return print_geotag(input);
    }

    let (Some(lat), Some(lon), Some(date), Some(time)) = (cli.lat, cli.lon, cli.date.as_deref(), cli.time.as_deref())
    else {
        anyhow::bail!("--lat, --lon, --date and --time are all required. Use --help for usage.");
    };

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;
    if cli.offline {
        config = config.offline();
    }

    let lookups = config.enabled_lookups();
    if lookups.is_empty() {
        log::info!("Lookups: none (offline)");
    } else {
        log::info!("Lookups: {}", lookups.join(", "));
    }

    let image = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let map = match cli.map.as_deref() {
        Some(path) => Some(std::fs::read(path).with_context(|| format!("Failed to read map {}", path.display()))?),
        None => None,
    };

    let suffix = config.output.suffix.clone();
    let runner = pipeline::Pipeline::from_config(config)?;

    log::info!("Processing: {}", input.display());
    let output = runner
        .run(&pipeline::GeoRequest {
            image: &image,
            map_image: map.as_deref(),
            latitude: lat,
            longitude: lon,
            date,
            time,
        })
        .await?;

    let output_path = match cli.output {
        Some(path) => path,
        None => default_output_path(input, &suffix, output.kind),
    };
    std::fs::write(&output_path, &output.bytes)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    log::info!("  Address: {}", output.context.address);
    log::info!(
        "  GPS: {} {}",
        output.embed.latitude_ref, output.embed.longitude_ref
    );
    match output.embed.timestamp {
        Some(ref ts) => log::info!("  Timestamp: {ts}"),
        None => log::warn!("  Timestamp: skipped ({date} {time} is not YYYY-MM-DD HH:MM)"),
    }
    log::info!("Wrote {}", output_path.display());

    // JSON output
    if cli.json {
        let report = serde_json::json!({
            "input": input.display().to_string(),
            "output": output_path.display().to_string(),
            "result": output,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

/// `<dir>/<stem><suffix>.<ext>`, keeping the input's extension when it has one.
fn default_output_path(input: &Path, suffix: &str, kind: pipeline::ImageKind) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| kind.extension().to_string());
    input.with_file_name(format!("{stem}{suffix}.{ext}"))
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print the geotag-related EXIF of a file, organized by section.
fn print_geotag(path: &Path) -> Result<()> {
    let data = exif::read_geotag(path)?;

    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    // --- GPS ---
    if data.has_gps {
        println!("  {BOLD}GPS{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        if let Some(r) = data.latitude_ref {
            print_row("GPSLatitudeRef", &r.to_string());
        }
        if let Some(lat) = data.latitude {
            print_row("GPSLatitude", &format!("{lat:.6}"));
        }
        if let Some(r) = data.longitude_ref {
            print_row("GPSLongitudeRef", &r.to_string());
        }
        if let Some(lon) = data.longitude {
            print_row("GPSLongitude", &format!("{lon:.6}"));
        }
        println!();
    }

    // --- Date / Time ---
    let date_fields: Vec<(&str, Option<&str>)> = vec![
        ("ModifyDate", data.modify_date.as_deref()),
        ("DateTimeOriginal", data.date_time_original.as_deref()),
        ("CreateDate", data.create_date.as_deref()),
    ];
    if date_fields.iter().any(|(_, v)| v.is_some()) {
        println!("  {BOLD}Date / Time{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        for (tag, val) in &date_fields {
            if let Some(v) = val {
                print_row(tag, v);
            }
        }
        println!();
    }

    // --- Camera / Device ---
    let camera_fields: Vec<(&str, Option<&str>)> =
        vec![("Make", data.make.as_deref()), ("Model", data.model.as_deref())];
    if camera_fields.iter().any(|(_, v)| v.is_some()) {
        println!("  {BOLD}Camera / Device{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        for (tag, val) in &camera_fields {
            if let Some(v) = val {
                print_row(tag, v);
            }
        }
        println!();
    }

    if data == exif::GeoTagData::default() {
        println!("  {DIM}(no geotag metadata found){RESET}");
        println!();
    }

    Ok(())
}

/// Print a single row in the EXIF display table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
