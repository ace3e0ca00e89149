//! Legend panels: one builder for categorical and continuous data.

use super::palette::{parse_palette, Color};
use crate::error::LegendError;
use crate::platform::{StatKey, Statistics};
use crate::transform::ClassificationScheme;
use serde::{Deserialize, Serialize};

/// Square meters per hectare.
pub const M2_PER_HECTARE: f64 = 10_000.0;

/// One legend row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub color: Color,
    pub label: String,
}

/// Title plus colour rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub title: String,
    pub rows: Vec<LegendEntry>,
}

/// How a continuous range is split into rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Breaks {
    /// `steps` equal intervals between the range min and max
    Linear { steps: usize },
    /// Fixed ascending boundaries; the range is ignored
    Explicit { values: Vec<f64> },
}

impl Breaks {
    pub fn resolve(&self, min: f64, max: f64) -> Result<Vec<f64>, LegendError> {
        match self {
            Self::Linear { steps } => linear_breaks(min, max, *steps),
            Self::Explicit { values } => {
                if values.len() < 2 {
                    return Err(LegendError::NoSteps);
                }
                if let Some(w) = values.windows(2).find(|w| w[0] >= w[1]) {
                    return Err(LegendError::EmptyRange { min: w[0], max: w[1] });
                }
                Ok(values.clone())
            }
        }
    }
}

/// Which palette colour a row gets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Row `i` takes colour `i`
    #[default]
    Sequential,
    /// Row `i` of `k` takes colour `floor(i * len / k)`
    Spread,
}

impl Sampling {
    fn index(self, row: usize, rows: usize, palette_len: usize) -> usize {
        let idx = match self {
            Self::Sequential => row,
            Self::Spread => row * palette_len / rows.max(1),
        };
        idx.min(palette_len - 1)
    }
}

/// Row label format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelStyle {
    /// `"<lo><separator><hi> <unit>"`
    Interval {
        #[serde(default = "default_separator")]
        separator: String,
        /// Fixed decimals; shortest representation when absent
        #[serde(default)]
        decimals: Option<usize>,
    },
    /// `"<round(lo)> <unit>"`, optionally followed by a row for the max
    Value {
        #[serde(default)]
        include_max: bool,
    },
}

fn default_separator() -> String {
    " - ".to_string()
}

/// Continuous legend description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousLegend {
    /// Title; `{min}` and `{max}` are replaced by the rounded range
    pub title: String,
    pub breaks: Breaks,
    #[serde(default)]
    pub sampling: Sampling,
    pub labels: LabelStyle,
    #[serde(default)]
    pub unit: Option<String>,
}

/// `steps + 1` evenly spaced values from `min` to `max` inclusive.
pub fn linear_breaks(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, LegendError> {
    if steps == 0 {
        return Err(LegendError::NoSteps);
    }
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(LegendError::EmptyRange { min, max });
    }
    let range = max - min;
    let mut breaks: Vec<f64> = (0..steps)
        .map(|i| min + range * i as f64 / steps as f64)
        .collect();
    breaks.push(max);
    Ok(breaks)
}

/// Format a number with fixed decimals, or the shortest form when `None`.
pub fn format_number(value: f64, decimals: Option<usize>) -> String {
    match decimals {
        Some(d) => format!("{:.*}", d, value),
        None => format!("{}", value),
    }
}

/// Round to an integer, folding `-0` into `0`.
fn whole(value: f64) -> f64 {
    value.round() + 0.0
}

fn with_unit(text: String, unit: Option<&str>) -> String {
    match unit {
        Some(unit) if !unit.is_empty() => format!("{} {}", text, unit),
        _ => text,
    }
}

impl Legend {
    /// A legend with a title and no rows, used when there is nothing to show.
    pub fn empty(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rows: Vec::new(),
        }
    }

    /// One row per class, in class index order.
    ///
    /// With `areas`, labels read `"<name> (<ha> ha)"`; a class absent from the
    /// statistics shows `0.00 ha`.
    pub fn categorical(
        title: impl Into<String>,
        scheme: &ClassificationScheme,
        areas: Option<&Statistics>,
    ) -> Result<Self, LegendError> {
        if scheme.names.len() != scheme.colors.len() {
            return Err(LegendError::LengthMismatch {
                names: scheme.names.len(),
                colors: scheme.colors.len(),
            });
        }
        let colors = parse_palette(&scheme.colors)?;

        let rows = scheme
            .names
            .iter()
            .zip(colors)
            .enumerate()
            .map(|(i, (name, color))| {
                let label = match areas {
                    Some(stats) => {
                        let m2 = stats.get(&StatKey::Class(i as i64 + 1)).unwrap_or(0.0);
                        format!("{} ({:.2} ha)", name, m2 / M2_PER_HECTARE)
                    }
                    None => name.clone(),
                };
                LegendEntry { color, label }
            })
            .collect();

        Ok(Self {
            title: title.into(),
            rows,
        })
    }

    /// Rows over a numeric range.
    pub fn continuous(spec: &ContinuousLegend, palette: &[Color], min: f64, max: f64) -> Result<Self, LegendError> {
        if palette.is_empty() {
            return Err(LegendError::EmptyPalette);
        }
        let breaks = spec.breaks.resolve(min, max)?;
        let rows_len = breaks.len() - 1;
        let unit = spec.unit.as_deref();

        let mut rows: Vec<LegendEntry> = (0..rows_len)
            .map(|i| {
                let color = palette[spec.sampling.index(i, rows_len, palette.len())];
                let label = match &spec.labels {
                    LabelStyle::Interval { separator, decimals } => with_unit(
                        format!(
                            "{}{}{}",
                            format_number(breaks[i], *decimals),
                            separator,
                            format_number(breaks[i + 1], *decimals)
                        ),
                        unit,
                    ),
                    LabelStyle::Value { .. } => with_unit(format_number(whole(breaks[i]), None), unit),
                };
                LegendEntry { color, label }
            })
            .collect();

        if let LabelStyle::Value { include_max: true } = spec.labels {
            rows.push(LegendEntry {
                color: palette[palette.len() - 1],
                label: with_unit(format_number(whole(breaks[rows_len]), None), unit),
            });
        }

        let title = spec
            .title
            .replace("{min}", &format_number(whole(min), None))
            .replace("{max}", &format_number(whole(max), None));

        Ok(Self { title, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(colors: &[&str]) -> Vec<Color> {
        parse_palette(colors).unwrap()
    }

    fn precip_palette() -> Vec<Color> {
        palette(&[
            "#FFFFFF", "#D2EFF7", "#96CCE2", "#5BA4D4", "#3E8EC4", "#2E6FAD", "#1C4C96", "#0C2C7E", "#041451",
        ])
    }

    fn scheme() -> ClassificationScheme {
        ClassificationScheme {
            names: vec!["Water".into(), "Trees".into()],
            colors: vec!["#1A5BAB".into(), "#358221".into()],
            from: vec![1, 2],
            to: vec![1, 2],
        }
    }

    #[test]
    fn test_linear_breaks() {
        assert_eq!(linear_breaks(0.0, 40.0, 4).unwrap(), vec![0.0, 10.0, 20.0, 30.0, 40.0]);
        assert_eq!(linear_breaks(0.0, 1.0, 0), Err(LegendError::NoSteps));
        assert!(matches!(linear_breaks(5.0, 1.0, 2), Err(LegendError::EmptyRange { .. })));
    }

    #[test]
    fn test_precipitation_legend() {
        let spec = ContinuousLegend {
            title: "Annual Precipitation (mm)".to_string(),
            breaks: Breaks::Linear { steps: 5 },
            sampling: Sampling::Sequential,
            labels: LabelStyle::Interval {
                separator: " - ".to_string(),
                decimals: None,
            },
            unit: Some("mm".to_string()),
        };
        let colors = precip_palette();
        let legend = Legend::continuous(&spec, &colors, 0.0, 500.0).unwrap();

        assert_eq!(legend.len(), 5);
        for (i, row) in legend.rows.iter().enumerate() {
            assert_eq!(row.color, colors[i]);
        }
        assert_eq!(legend.rows[0].label, "0 - 100 mm");
        assert_eq!(legend.rows[4].label, "400 - 500 mm");
    }

    #[test]
    fn test_spread_sampling() {
        let spec = ContinuousLegend {
            title: "Temperature (°C)".to_string(),
            breaks: Breaks::Linear { steps: 4 },
            sampling: Sampling::Spread,
            labels: LabelStyle::Interval {
                separator: " - ".to_string(),
                decimals: None,
            },
            unit: Some("°C".to_string()),
        };
        let colors: Vec<Color> = (0..25).map(|i| Color::rgb(i, 0, 0)).collect();
        let legend = Legend::continuous(&spec, &colors, 0.0, 40.0).unwrap();

        let reds: Vec<u8> = legend.rows.iter().map(|r| r.color.r).collect();
        assert_eq!(reds, vec![0, 6, 12, 18]);
        assert_eq!(legend.rows[3].label, "30 - 40 °C");
    }

    #[test]
    fn test_value_labels_with_max_row() {
        let spec = ContinuousLegend {
            title: "Elevation (m)\n{min} - {max}".to_string(),
            breaks: Breaks::Linear { steps: 5 },
            sampling: Sampling::Spread,
            labels: LabelStyle::Value { include_max: true },
            unit: Some("m".to_string()),
        };
        let colors: Vec<Color> = (0..10).map(|i| Color::rgb(0, i, 0)).collect();
        let legend = Legend::continuous(&spec, &colors, 10.4, 510.6).unwrap();

        assert_eq!(legend.title, "Elevation (m)\n10 - 511");
        assert_eq!(legend.len(), 6);
        assert_eq!(legend.rows[0].label, "10 m");
        assert_eq!(legend.rows[5].label, "511 m");
        assert_eq!(legend.rows[1].color.g, 2);
        assert_eq!(legend.rows[5].color.g, 9);
    }

    #[test]
    fn test_value_labels_never_negative_zero() {
        let spec = ContinuousLegend {
            title: "Elevation (m)\n{min} - {max}".to_string(),
            breaks: Breaks::Linear { steps: 2 },
            sampling: Sampling::Sequential,
            labels: LabelStyle::Value { include_max: true },
            unit: None,
        };
        let colors: Vec<Color> = (0..3).map(|i| Color::rgb(i, 0, 0)).collect();
        let legend = Legend::continuous(&spec, &colors, -0.4, -0.2).unwrap();

        assert_eq!(legend.title, "Elevation (m)\n0 - 0");
        let labels: Vec<&str> = legend.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["0", "0", "0"]);
    }

    #[test]
    fn test_explicit_breaks() {
        let spec = ContinuousLegend {
            title: "NDVI Values\n(Vegetation Index)".to_string(),
            breaks: Breaks::Explicit {
                values: vec![-0.2, 0.0, 0.2, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0],
            },
            sampling: Sampling::Sequential,
            labels: LabelStyle::Interval {
                separator: " to ".to_string(),
                decimals: Some(1),
            },
            unit: None,
        };
        let colors: Vec<Color> = (0..9).map(|i| Color::rgb(0, 0, i)).collect();
        let legend = Legend::continuous(&spec, &colors, -0.2, 0.8).unwrap();

        assert_eq!(legend.len(), 9);
        assert_eq!(legend.rows[0].label, "-0.2 to 0.0");
        assert_eq!(legend.rows[8].label, "0.9 to 1.0");
        assert_eq!(legend.rows[8].color.b, 8);
    }

    #[test]
    fn test_continuous_empty_palette() {
        let spec = ContinuousLegend {
            title: "t".to_string(),
            breaks: Breaks::Linear { steps: 2 },
            sampling: Sampling::Sequential,
            labels: LabelStyle::Value { include_max: false },
            unit: None,
        };
        assert_eq!(Legend::continuous(&spec, &[], 0.0, 1.0), Err(LegendError::EmptyPalette));
    }

    #[test]
    fn test_categorical_names() {
        let legend = Legend::categorical("Land Cover Class", &scheme(), None).unwrap();
        assert_eq!(legend.len(), 2);
        assert_eq!(legend.rows[0].label, "Water");
        assert_eq!(legend.rows[1].color, Color::parse("#358221").unwrap());
    }

    #[test]
    fn test_categorical_with_areas() {
        let stats: Statistics = vec![(StatKey::Class(1), 125_000.0)].into_iter().collect();
        let legend = Legend::categorical("Land Cover Class", &scheme(), Some(&stats)).unwrap();
        assert_eq!(legend.rows[0].label, "Water (12.50 ha)");
        assert_eq!(legend.rows[1].label, "Trees (0.00 ha)");
    }

    #[test]
    fn test_categorical_length_mismatch() {
        let mut bad = scheme();
        bad.colors.pop();
        assert_eq!(
            Legend::categorical("x", &bad, None),
            Err(LegendError::LengthMismatch { names: 2, colors: 1 })
        );
    }
}
