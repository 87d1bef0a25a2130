//! Historical price logger
//!
//! Appends each valuation pass's cache snapshot to daily CSV files for
//! offline research. One row per cache entry per pass, rotated at midnight
//! UTC.
//!
//! Output format (CSV):
//!   timestamp, symbol, price, source, stale
//!
//! File naming: prices_YYYYMMDD.csv
//!
//! Author: AI-Generated
//! Created: 2026-08-05

use crate::types::PriceEntry;
use chrono::{NaiveDate, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

const CSV_HEADER: &str = "timestamp,symbol,price,source,stale";

pub struct PriceLogger {
    log_dir: PathBuf,
    current_date: Option<NaiveDate>,
    file: Option<File>,
}

impl PriceLogger {
    /// Create a new PriceLogger. Creates the log directory if it doesn't exist.
    pub fn new(log_dir: &str) -> Self {
        let path = PathBuf::from(log_dir);
        if let Err(e) = fs::create_dir_all(&path) {
            warn!("Failed to create price log directory {}: {}", log_dir, e);
        }
        info!("PriceLogger initialized: {}", log_dir);

        Self {
            log_dir: path,
            current_date: None,
            file: None,
        }
    }

    /// Append one row per entry. Rotates the file daily.
    pub fn log_pass(&mut self, entries: &[PriceEntry]) {
        let now = Utc::now();
        let today = now.date_naive();

        if self.current_date != Some(today) {
            self.rotate_file(today);
        }

        let Some(file) = self.file.as_mut() else {
            return;
        };

        let timestamp = now.format("%Y-%m-%dT%H:%M:%SZ");
        for entry in entries {
            if let Err(e) = writeln!(
                file,
                "{},{},{:.10},{},{}",
                timestamp, entry.symbol, entry.price, entry.source, entry.stale
            ) {
                warn!("Failed to write price log row: {}", e);
                return;
            }
        }
    }

    fn rotate_file(&mut self, date: NaiveDate) {
        let filename = format!("prices_{}.csv", date.format("%Y%m%d"));
        let path = self.log_dir.join(&filename);
        let is_new = !path.exists();

        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(mut file) => {
                if is_new {
                    if let Err(e) = writeln!(file, "{}", CSV_HEADER) {
                        warn!("Failed to write CSV header to {}: {}", filename, e);
                    }
                }
                info!("Price log rotated to {}", filename);
                self.current_date = Some(date);
                self.file = Some(file);
            }
            Err(e) => {
                warn!("Failed to open price log {}: {}", filename, e);
                self.current_date = Some(date);
                self.file = None;
            }
        }
    }
}
