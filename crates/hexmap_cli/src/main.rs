use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hexmap_core::config::OverlayConfig;
use hexmap_core::feature::DisplayPoint;
use hexmap_core::render::{MapViewport, OverlaySink, RenderCoordinator, ShapeId};
use hexmap_core::reproject::Reprojector;
use hexmap_core::source::{FeatureSource, GeoJsonFileSource};
use hexmap_core::viewport::GeoBounds;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(
    name = "hexmap",
    version,
    about = "Render polygon datasets as H3 hexagon overlays"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tile a dataset for one viewport and print the drawn hexagons as GeoJSON
    Render {
        /// GeoJSON file or http(s) URL, coordinates in Web Mercator metres
        #[arg(long, env = "HEXMAP_INPUT")]
        input: String,
        /// Overlay config (JSON); defaults apply when absent
        #[arg(long)]
        config: Option<PathBuf>,
        /// Map zoom level; falls back to the config's initial zoom
        #[arg(long)]
        zoom: Option<f64>,
        /// Viewport as south,west,north,east in degrees
        #[arg(long, allow_hyphen_values = true)]
        bbox: GeoBounds,
        /// Pan by lat_fraction,lng_fraction of the view before output; repeatable
        #[arg(long, value_parser = parse_pan, allow_hyphen_values = true)]
        pan: Vec<(f64, f64)>,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Give up waiting for tiling after this many seconds
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },
}

fn parse_pan(value: &str) -> Result<(f64, f64), String> {
    let (lat, lng) = value
        .split_once(',')
        .ok_or_else(|| format!("invalid pan `{value}`: expected lat_fraction,lng_fraction"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .map_err(|err| format!("invalid pan `{value}`: {err}"))
    };
    Ok((parse(lat)?, parse(lng)?))
}

/// Fixed viewport driven from the command line.
struct CliViewport {
    zoom: f64,
    bounds: GeoBounds,
}

impl MapViewport for CliViewport {
    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn bounds(&self) -> GeoBounds {
        self.bounds
    }
}

/// Collects drawn shapes as GeoJSON features.
#[derive(Default)]
struct GeoJsonSink {
    next_id: u64,
    shapes: Vec<(ShapeId, Value)>,
}

impl OverlaySink for GeoJsonSink {
    fn add_shape(&mut self, ring: &[DisplayPoint], color: &str, fill_opacity: f64) -> ShapeId {
        self.next_id += 1;
        let id = ShapeId(self.next_id);
        // GeoJSON wants lng/lat order and a closed ring.
        let mut coordinates = ring
            .iter()
            .map(|point| [point.lng, point.lat])
            .collect::<Vec<_>>();
        if let Some(first) = coordinates.first().copied() {
            coordinates.push(first);
        }
        self.shapes.push((
            id,
            json!({
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [coordinates] },
                "properties": { "color": color, "fill_opacity": fill_opacity },
            }),
        ));
        id
    }

    fn remove_shape(&mut self, id: ShapeId) {
        self.shapes.retain(|(shape_id, _)| *shape_id != id);
    }
}

fn open_source(input: &str) -> Result<Box<dyn FeatureSource>> {
    if input.starts_with("http://") || input.starts_with("https://") {
        #[cfg(feature = "http")]
        {
            let source = hexmap_core::source::HttpFeatureSource::new(input)
                .context("failed to build HTTP client")?;
            return Ok(Box::new(source));
        }
        #[cfg(not(feature = "http"))]
        bail!("built without the `http` feature, cannot fetch {input}");
    }
    Ok(Box::new(GeoJsonFileSource::new(input)))
}

fn render(
    input: &str,
    config: Option<PathBuf>,
    zoom: Option<f64>,
    bbox: GeoBounds,
    pans: &[(f64, f64)],
    output: Option<PathBuf>,
    timeout: Duration,
) -> Result<()> {
    let config = match config {
        Some(path) => OverlayConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => OverlayConfig::default(),
    };
    let viewport = CliViewport {
        zoom: zoom.unwrap_or(config.initial_zoom),
        bounds: bbox,
    };
    let mut coordinator = RenderCoordinator::new(viewport, GeoJsonSink::default(), config);

    let source = open_source(input)?;
    let reprojector = Reprojector::web_mercator()?;
    coordinator.load(source.as_ref(), &reprojector)?;
    if !coordinator.wait_for_pending(timeout) {
        bail!("tiling did not finish within {}s", timeout.as_secs());
    }

    for &(lat_fraction, lng_fraction) in pans {
        let bounds = coordinator.viewport().bounds.panned(lat_fraction, lng_fraction);
        coordinator.viewport_mut().bounds = bounds;
        coordinator.on_move_end();
    }

    let stats = coordinator.stats();
    info!(
        resolution = %coordinator.resolution(),
        hexagons = coordinator.drawn_shapes(),
        redraws = stats.redraws,
        failures = stats.failures,
        "render finished"
    );

    let features = coordinator
        .sink()
        .shapes
        .iter()
        .map(|(_, feature)| feature.clone())
        .collect::<Vec<_>>();
    let collection = json!({
        "type": "FeatureCollection",
        "properties": { "resolution": u8::from(coordinator.resolution()) },
        "features": features,
    });
    let text = serde_json::to_string_pretty(&collection)?;
    match output {
        Some(path) => fs::write(&path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{text}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Render {
            input,
            config,
            zoom,
            bbox,
            pan,
            output,
            timeout_secs,
        } => render(
            &input,
            config,
            zoom,
            bbox,
            &pan,
            output,
            Duration::from_secs(timeout_secs),
        ),
    }
}
