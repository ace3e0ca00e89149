//! Calendar-month bucketing of an image collection.

use crate::platform::ImageCollection;
use crate::raster::{GridSpec, Raster};
use crate::transform::{composite, Composite};
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Month labels used on chart axes.
pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Per-month collection reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalReducer {
    Sum,
    Mean,
}

impl TemporalReducer {
    pub fn composite(self) -> Composite {
        match self {
            Self::Sum => Composite::Sum,
            Self::Mean => Composite::Mean,
        }
    }
}

/// One month's composite.
#[derive(Debug, Clone)]
pub struct MonthlyComposite {
    /// Calendar month, 1-12
    pub month: u32,
    /// First day of the month in the analysis year
    pub time_start: NaiveDate,
    /// Composite raster; band-less when no image fell in the month
    pub raster: Raster,
    /// Number of source images in the month
    pub image_count: usize,
}

/// Buckets a collection by calendar month and composites each bucket.
#[derive(Debug, Clone)]
pub struct TemporalAggregator {
    pub reducer: TemporalReducer,
    /// Analysis year, stamped on every monthly composite
    pub year: i32,
}

impl TemporalAggregator {
    pub fn new(reducer: TemporalReducer, year: i32) -> Self {
        Self { reducer, year }
    }

    /// Produce exactly twelve composites, January first.
    ///
    /// Months are matched across the whole collection regardless of year.
    pub fn aggregate(&self, collection: &ImageCollection, grid: &GridSpec) -> Result<Vec<MonthlyComposite>> {
        (1..=12u32)
            .map(|month| {
                let bucket = collection.filter_month(month);
                let time_start = NaiveDate::from_ymd_opt(self.year, month, 1)
                    .ok_or_else(|| anyhow!("Invalid analysis year {}", self.year))?;

                let mut raster = composite(&bucket, self.reducer.composite(), grid)?
                    .with_date(time_start)
                    .with_property("month", month as f64);
                raster.id = format!("{}-{:02}", self.year, month);

                tracing::debug!("Month {:02}: {} images", month, bucket.len());

                Ok(MonthlyComposite {
                    month,
                    time_start,
                    raster,
                    image_count: bucket.len(),
                })
            })
            .collect()
    }
}

/// One row of a monthly series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesEntry {
    pub month: u32,
    pub label: String,
    /// Series name -> value; `None` means no data for the month
    pub values: BTreeMap<String, Option<f64>>,
}

/// Twelve monthly entries over one or more named series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub series: Vec<String>,
    pub entries: Vec<TimeSeriesEntry>,
}

impl TimeSeries {
    /// Twelve entries with every value missing.
    pub fn new(series: Vec<String>) -> Self {
        let entries = (1..=12u32)
            .map(|month| TimeSeriesEntry {
                month,
                label: MONTH_LABELS[month as usize - 1].to_string(),
                values: series.iter().map(|s| (s.clone(), None)).collect(),
            })
            .collect();
        Self { series, entries }
    }

    /// Set one value. Months outside 1-12 are ignored.
    pub fn set(&mut self, month: u32, series: &str, value: Option<f64>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.month == month) {
            entry.values.insert(series.to_string(), value);
        }
    }

    /// Values of one series in month order.
    pub fn values(&self, series: &str) -> Vec<Option<f64>> {
        self.entries
            .iter()
            .map(|e| e.values.get(series).copied().flatten())
            .collect()
    }

    /// Mean over the months that have data.
    pub fn mean(&self, series: &str) -> Option<f64> {
        let present: Vec<f64> = self.values(series).into_iter().flatten().collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Band;
    use ndarray::array;

    fn grid() -> GridSpec {
        GridSpec::new([0.0, 0.0, 1.0, 1.0], 1, 1)
    }

    fn daily(y: i32, m: u32, d: u32, v: f64) -> Raster {
        Raster::empty(format!("{y}{m:02}{d:02}"), grid())
            .with_date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
            .with_band(Band::new("precipitation", array![[v]]))
            .unwrap()
    }

    #[test]
    fn test_twelve_months_in_order() {
        let collection = ImageCollection::new(
            "chirps",
            vec![daily(2023, 3, 1, 1.0), daily(2023, 3, 2, 2.0), daily(2023, 7, 9, 5.0)],
        );
        let months = TemporalAggregator::new(TemporalReducer::Sum, 2023)
            .aggregate(&collection, &grid())
            .unwrap();

        assert_eq!(months.len(), 12);
        assert_eq!(months.iter().map(|m| m.month).collect::<Vec<_>>(), (1..=12).collect::<Vec<_>>());
        assert_eq!(months[2].image_count, 2);
        assert_eq!(months[2].raster.band("precipitation").unwrap().data[[0, 0]], 3.0);
        assert_eq!(months[6].raster.band("precipitation").unwrap().data[[0, 0]], 5.0);
        assert!(months[0].raster.bands.is_empty());
    }

    #[test]
    fn test_empty_collection_still_twelve() {
        let months = TemporalAggregator::new(TemporalReducer::Mean, 2023)
            .aggregate(&ImageCollection::default(), &grid())
            .unwrap();
        assert_eq!(months.len(), 12);
        assert!(months.iter().all(|m| m.image_count == 0 && m.raster.bands.is_empty()));
    }

    #[test]
    fn test_time_start_uses_analysis_year() {
        let collection = ImageCollection::new("c", vec![daily(2023, 5, 1, 1.0)]);
        let months = TemporalAggregator::new(TemporalReducer::Mean, 2023)
            .aggregate(&collection, &grid())
            .unwrap();
        assert_eq!(months[4].time_start, NaiveDate::from_ymd_opt(2023, 5, 1).unwrap());
        assert_eq!(months[4].raster.date, Some(months[4].time_start));
        assert_eq!(months[4].raster.properties["month"], 5.0);
    }

    #[test]
    fn test_time_series() {
        let mut series = TimeSeries::new(vec!["day_temp".to_string(), "night_temp".to_string()]);
        assert_eq!(series.len(), 12);
        assert_eq!(series.entries[0].label, "Jan");
        assert_eq!(series.entries[11].label, "Dec");

        series.set(1, "day_temp", Some(30.0));
        series.set(2, "day_temp", Some(34.0));
        series.set(13, "day_temp", Some(99.0));

        assert_eq!(series.values("day_temp")[0], Some(30.0));
        assert_eq!(series.values("night_temp"), vec![None; 12]);
        assert_eq!(series.mean("day_temp"), Some(32.0));
        assert_eq!(series.mean("night_temp"), None);
    }
}
