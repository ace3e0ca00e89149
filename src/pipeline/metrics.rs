//! Run metrics collection.

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Metrics for one pipeline run.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Images returned by source selection
    pub images_fetched: AtomicU64,

    /// Images dropped by date, bounds or quality filters
    pub images_rejected: AtomicU64,

    /// Region reductions completed
    pub reductions: AtomicU64,

    /// Pixels touched by reductions
    pub pixels_reduced: AtomicU64,

    /// Months with no source images
    pub empty_months: AtomicU64,

    /// Start time
    start_time: Option<Instant>,

    // Per-stage timing (in microseconds for precision)
    /// Time spent fetching collections (microseconds)
    pub fetch_us: AtomicU64,

    /// Time spent in band transforms and composites (microseconds)
    pub transform_us: AtomicU64,

    /// Time spent reducing (microseconds, summed across blocking tasks)
    pub reduce_us: AtomicU64,
}

impl Metrics {
    /// Create new metrics.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        })
    }

    pub fn add_images_fetched(&self, count: u64) {
        self.images_fetched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_images_rejected(&self, count: u64) {
        self.images_rejected.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a completed reduction.
    pub fn add_reduction(&self) {
        self.reductions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pixels_reduced(&self, pixels: u64) {
        self.pixels_reduced.fetch_add(pixels, Ordering::Relaxed);
    }

    /// Record a month without source images.
    pub fn add_empty_month(&self) {
        self.empty_months.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_fetch_time(&self, duration: Duration) {
        self.fetch_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn add_transform_time(&self, duration: Duration) {
        self.transform_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn add_reduce_time(&self, duration: Duration) {
        self.reduce_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start_time.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Get pixels reduced per second.
    pub fn pixels_per_second(&self) -> f64 {
        let pixels = self.pixels_reduced.load(Ordering::Relaxed);
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            pixels as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            images_fetched: self.images_fetched.load(Ordering::Relaxed),
            images_rejected: self.images_rejected.load(Ordering::Relaxed),
            reductions: self.reductions.load(Ordering::Relaxed),
            pixels_reduced: self.pixels_reduced.load(Ordering::Relaxed),
            empty_months: self.empty_months.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            pixels_per_second: self.pixels_per_second(),
            fetch_secs: self.fetch_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            transform_secs: self.transform_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            reduce_secs: self.reduce_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub images_fetched: u64,
    pub images_rejected: u64,
    pub reductions: u64,
    pub pixels_reduced: u64,
    pub empty_months: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub pixels_per_second: f64,
    /// Total time spent fetching (seconds)
    pub fetch_secs: f64,
    /// Total time spent transforming and compositing (seconds)
    pub transform_secs: f64,
    /// Total time spent reducing (seconds, summed across blocking tasks)
    pub reduce_secs: f64,
}

impl MetricsSnapshot {
    /// Save metrics to a JSON file.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Metrics saved to {}", path);
        Ok(())
    }

    /// Print a final summary.
    pub fn print_summary(&self) {
        println!("\n=== Run Summary ===");
        println!("Total time: {:.2}s", self.elapsed.as_secs_f64());
        println!("Images fetched: {}", self.images_fetched);
        println!("Images rejected: {}", self.images_rejected);
        println!("Reductions: {}", self.reductions);
        println!("Pixels reduced: {}", self.pixels_reduced);
        println!("Empty months: {}", self.empty_months);

        let total = self.fetch_secs + self.transform_secs + self.reduce_secs;
        if total > 0.0 {
            println!("\n--- Stage Time Breakdown ---");
            println!("Fetch:      {:>7.3}s ({:>5.1}%)", self.fetch_secs, self.fetch_secs / total * 100.0);
            println!("Transform:  {:>7.3}s ({:>5.1}%)", self.transform_secs, self.transform_secs / total * 100.0);
            println!("Reduce:     {:>7.3}s ({:>5.1}%)", self.reduce_secs, self.reduce_secs / total * 100.0);
        }
        println!("===================\n");
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.fetch_secs + self.transform_secs + self.reduce_secs;
        let (fetch_pct, transform_pct, reduce_pct) = if total > 0.0 {
            (
                self.fetch_secs / total * 100.0,
                self.transform_secs / total * 100.0,
                self.reduce_secs / total * 100.0,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        write!(
            f,
            "Images: {} fetched, {} rejected | Reductions: {} ({} pixels) | \
             Empty months: {} | Elapsed: {:.2}s | \
             Time: fetch {:.0}% | transform {:.0}% | reduce {:.0}%",
            self.images_fetched,
            self.images_rejected,
            self.reductions,
            self.pixels_reduced,
            self.empty_months,
            self.elapsed.as_secs_f64(),
            fetch_pct,
            transform_pct,
            reduce_pct,
        )
    }
}
