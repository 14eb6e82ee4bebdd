// other crates
use clap::Parser;
use log::info;
use std::io::{BufWriter, Write};

use crate::error::{ConvertError, Result};
use crate::input_osm_json::{DEFAULT_API_URL, InputOsm, scan_json_bytes_to_osm};
use crate::kernel_in::{BoundingBox, GeographicCoordinates};
use crate::kernel_out::write_json_array;
use crate::pipeline::{Conversion, convert};

// https://docs.rs/clap/latest/clap/_derive/index.html
#[derive(Parser, Debug, Clone)]
#[command(
    about = "Converts the OSM buildings of a map tile into 3D solids, printed as JSON",
    version,
    long_about = None
)]
pub struct ObiArgs {
    // Magdeburg: 8722 5401
    /// Tile column (slippy map)
    #[arg(default_value_t = 8722)]
    pub tile_x: u32,
    /// Tile row (slippy map)
    #[arg(default_value_t = 5401)]
    pub tile_y: u32,
    #[arg(short, long, default_value_t = crate::kernel_in::TILE_ZOOM)]
    pub zoom: u32,
    /// Read an Overpass JSON response from this file instead of the API
    #[arg(short, long)]
    pub input: Option<std::path::PathBuf>,
    #[arg(long, env = "OVERPASS_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,
    /// Building parts get no solid of their own
    #[arg(long)]
    pub skip_parts: bool,
    /// Print the defects as JSON to stderr
    #[arg(long)]
    pub defects: bool,
}

/// Tile of a CGI request path: `/<x>/<y>`, optionally followed by `/` and `.json`
pub fn parse_tile_path(path: &str) -> Result<(u32, u32)> {
    let invalid = || ConvertError::InvalidTilePath(path.to_string());

    let rest = path.strip_prefix('/').ok_or_else(invalid)?;
    let rest = rest.strip_suffix(".json").unwrap_or(rest);
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    let (x, y) = rest.split_once('/').ok_or_else(invalid)?;

    let number = |digits: &str| {
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse::<u32>().map_err(|_| invalid())
    };
    Ok((number(x)?, number(y)?))
}

/// Loads the tile (from file or API) and converts it
pub async fn convert_tile(args: &ObiArgs, tile_x: u32, tile_y: u32) -> Result<Conversion> {
    info!("processing tile {}/{tile_x}/{tile_y}", args.zoom);
    let bounding_box = BoundingBox::from_tile(tile_x, tile_y, args.zoom);
    let ground_null_coordinates = GeographicCoordinates::tile_center(tile_x, tile_y, args.zoom);

    let bytes = match &args.input {
        Some(path) => std::fs::read(path)?,
        None => {
            InputOsm::new(&args.api_url)
                .fetch_tile(&bounding_box)
                .await?
                .to_vec()
        }
    };

    let layer = scan_json_bytes_to_osm(&bytes, &ground_null_coordinates, args.skip_parts)?;
    convert(layer, ground_null_coordinates)
}

fn print_defects(conversion: &Conversion) -> Result<()> {
    let stderr = std::io::stderr();
    let mut writer = stderr.lock();
    serde_json::to_writer_pretty(&mut writer, &conversion.defects)?;
    writeln!(writer)?;
    Ok(())
}

///////////////////////////////////////////////////////////////////////////////////////////////////
// Main: command line or CGI //////////////////////////////////////////////////////////////////////

pub async fn main_async() -> Result<()> {
    let args = ObiArgs::parse();
    let stdout = std::io::stdout();
    let mut writer = BufWriter::new(stdout.lock());

    if std::env::var_os("REQUEST_METHOD").is_none() {
        let conversion = convert_tile(&args, args.tile_x, args.tile_y).await?;
        write_json_array(&mut writer, &conversion.outputs)?;
        writer.flush()?;
        if args.defects {
            print_defects(&conversion)?;
        }
        return Ok(());
    }

    // CGI: the answer is always JSON, errors included
    write!(writer, "Content-Type: application/json; charset=utf-8\r\n\r\n")?;
    let path = std::env::var("PATH_INFO").unwrap_or_default();
    let result = match parse_tile_path(&path) {
        Ok((tile_x, tile_y)) => convert_tile(&args, tile_x, tile_y).await,
        Err(error) => Err(error),
    };
    match result {
        Ok(conversion) => write_json_array(&mut writer, &conversion.outputs)?,
        Err(error) => {
            log::error!("{error}");
            serde_json::to_writer(&mut writer, &[format!("Error: {error}")])?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}
