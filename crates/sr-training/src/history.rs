//! Per-epoch training metrics and the event log.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sr_core::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const EVENTS_FILE: &str = "events.jsonl";
pub const METRICS_CSV_FILE: &str = "metrics.csv";

const CSV_HEADER: &str = "epoch,loss,psnr,val_loss,val_psnr,lr";

/// Metrics of one epoch (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f64,
    pub psnr: f64,
    pub val_loss: f64,
    pub val_psnr: f64,
    pub lr: f64,
}

/// Column-wise metric history, one entry per epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub loss: Vec<f64>,
    pub psnr: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub val_psnr: Vec<f64>,
    pub lr: Vec<f64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metrics: &EpochMetrics) {
        self.loss.push(metrics.loss);
        self.psnr.push(metrics.psnr);
        self.val_loss.push(metrics.val_loss);
        self.val_psnr.push(metrics.val_psnr);
        self.lr.push(metrics.lr);
    }

    pub fn len(&self) -> usize {
        self.loss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loss.is_empty()
    }

    /// Best validation PSNR and its 1-based epoch
    pub fn best_val_psnr(&self) -> Option<(usize, f64)> {
        self.val_psnr
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, psnr)| !psnr.is_nan())
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, psnr)| (i + 1, psnr))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct EpochEvent<'a> {
    timestamp: String,
    #[serde(flatten)]
    metrics: &'a EpochMetrics,
}

/// Appends epoch records to `events.jsonl` and `metrics.csv` in a log directory
#[derive(Debug, Clone)]
pub struct EventLog {
    events_path: PathBuf,
    csv_path: PathBuf,
}

impl EventLog {
    pub fn new(log_dir: &Path) -> Result<Self> {
        fs::create_dir_all(log_dir)?;
        let log = Self {
            events_path: log_dir.join(EVENTS_FILE),
            csv_path: log_dir.join(METRICS_CSV_FILE),
        };
        if !log.csv_path.exists() {
            fs::write(&log.csv_path, format!("{CSV_HEADER}\n"))?;
        }
        Ok(log)
    }

    pub fn record(&self, metrics: &EpochMetrics) -> Result<()> {
        let event = EpochEvent {
            timestamp: Utc::now().to_rfc3339(),
            metrics,
        };
        let mut events = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)?;
        writeln!(events, "{}", serde_json::to_string(&event)?)?;

        let mut csv = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            csv,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6e}",
            metrics.epoch, metrics.loss, metrics.psnr, metrics.val_loss, metrics.val_psnr, metrics.lr
        )?;
        Ok(())
    }
}
