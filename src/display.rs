//! Display sink: map composition, charts and console lines.

use crate::region::{Bounds, Region};
use crate::render::{ChartSpec, Color, Legend};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Raster visualization range and palette.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<Color>,
}

/// Region outline style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineStyle {
    pub color: Color,
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self {
            color: Color::rgb(0xFF, 0, 0),
        }
    }
}

/// Center marker style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub color: Color,
    pub point_size: u32,
    pub point_shape: String,
    pub width: u32,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            color: Color::rgb(0xFF, 0, 0),
            point_size: 15,
            point_shape: "circle".to_string(),
            width: 3,
        }
    }
}

/// A map layer. Layers draw in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layer {
    Raster {
        name: String,
        band: String,
        vis: VisParams,
    },
    Outline {
        name: String,
        bounds: Bounds,
        style: OutlineStyle,
    },
    Marker {
        name: String,
        /// (lon, lat)
        position: [f64; 2],
        style: MarkerStyle,
    },
}

impl Layer {
    pub fn name(&self) -> &str {
        match self {
            Self::Raster { name, .. } | Self::Outline { name, .. } | Self::Marker { name, .. } => name,
        }
    }
}

/// A map centered on the region, with layers and legend overlays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    /// (lon, lat)
    pub center: [f64; 2],
    pub zoom: u8,
    pub layers: Vec<Layer>,
    /// Panels drawn above every layer
    pub overlays: Vec<Legend>,
}

impl MapView {
    pub fn new(region: &Region, zoom: u8) -> Self {
        Self {
            center: [region.longitude, region.latitude],
            zoom,
            layers: Vec::new(),
            overlays: Vec::new(),
        }
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn add_overlay(&mut self, legend: Legend) {
        self.overlays.push(legend);
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(Layer::name).collect()
    }
}

/// Where maps, charts and console lines end up.
pub trait DisplaySink {
    fn show_map(&mut self, map: &MapView) -> Result<()>;

    fn show_chart(&mut self, chart: &ChartSpec) -> Result<()>;

    fn print_line(&mut self, line: &str) -> Result<()>;
}

/// Text rendering to a writer (stdout by default).
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: std::io::stdout() }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DisplaySink for ConsoleSink<W> {
    fn show_map(&mut self, map: &MapView) -> Result<()> {
        writeln!(
            self.out,
            "Map centered at ({:.6}, {:.6}), zoom {}",
            map.center[1], map.center[0], map.zoom
        )?;
        for layer in &map.layers {
            match layer {
                Layer::Raster { name, band, vis } => writeln!(
                    self.out,
                    "  layer '{}': {} [{} .. {}], {} colours",
                    name,
                    band,
                    vis.min,
                    vis.max,
                    vis.palette.len()
                )?,
                Layer::Outline { name, bounds, style } => writeln!(
                    self.out,
                    "  outline '{}': [{:.5}, {:.5}, {:.5}, {:.5}] {}",
                    name, bounds[0], bounds[1], bounds[2], bounds[3], style.color
                )?,
                Layer::Marker { name, position, style } => writeln!(
                    self.out,
                    "  marker '{}': ({:.6}, {:.6}) {} {} size {}",
                    name, position[1], position[0], style.color, style.point_shape, style.point_size
                )?,
            }
        }
        for legend in &map.overlays {
            writeln!(self.out, "{}", legend.title)?;
            for row in &legend.rows {
                writeln!(self.out, "  {} {}", row.color, row.label)?;
            }
        }
        Ok(())
    }

    fn show_chart(&mut self, chart: &ChartSpec) -> Result<()> {
        writeln!(self.out, "{} ({:?})", chart.title, chart.kind)?;
        for row in &chart.rows {
            let values: Vec<String> = row
                .values
                .iter()
                .map(|v| v.map_or_else(|| "no data".to_string(), |v| format!("{:.3}", v)))
                .collect();
            writeln!(self.out, "  {}: {}", row.label, values.join(", "))?;
        }
        Ok(())
    }

    fn print_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{}", line)?;
        Ok(())
    }
}

/// Collects everything it is shown.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub maps: Vec<MapView>,
    pub charts: Vec<ChartSpec>,
    pub lines: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySink for RecordingSink {
    fn show_map(&mut self, map: &MapView) -> Result<()> {
        self.maps.push(map.clone());
        Ok(())
    }

    fn show_chart(&mut self, chart: &ChartSpec) -> Result<()> {
        self.charts.push(chart.clone());
        Ok(())
    }

    fn print_line(&mut self, line: &str) -> Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }
}
