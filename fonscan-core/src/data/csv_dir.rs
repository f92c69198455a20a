//! Local CSV price provider.
//!
//! Reads `<dir>/<CODE>.csv` with a header row. Required columns: `date`
//! (YYYY-MM-DD) and `price`. Optional: `market_cap`, `investor_count`,
//! `title`. Useful offline and as a fixture source for tests.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use super::provider::{FetchError, PriceProvider, RawRow, RawSeries};
use crate::domain::{DateRange, InstrumentId};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    price: f64,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    investor_count: Option<u64>,
    #[serde(default)]
    title: Option<String>,
}

pub struct CsvDirProvider {
    dir: PathBuf,
}

impl CsvDirProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &InstrumentId) -> PathBuf {
        self.dir.join(format!("{}.csv", id.as_str()))
    }
}

impl PriceProvider for CsvDirProvider {
    fn name(&self) -> &str {
        "csv_dir"
    }

    fn fetch(&self, id: &InstrumentId, range: &DateRange) -> Result<RawSeries, FetchError> {
        let path = self.path_for(id);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound { id: id.clone() })
            }
            Err(e) => {
                return Err(FetchError::NetworkUnreachable(format!(
                    "{}: {e}",
                    path.display()
                )))
            }
        };

        let mut reader = csv::Reader::from_reader(file);
        let mut title = None;
        let mut rows = Vec::new();
        for record in reader.deserialize::<CsvRow>() {
            let row = record.map_err(|e| {
                FetchError::ResponseFormatChanged(format!("{}: {e}", path.display()))
            })?;
            if !range.contains(row.date) {
                continue;
            }
            if title.is_none() {
                title = row.title.filter(|t| !t.trim().is_empty());
            }
            rows.push(RawRow {
                date: row.date,
                price: row.price,
                market_cap: row.market_cap,
                investor_count: row.investor_count,
            });
        }

        Ok(RawSeries::new(title, rows))
    }
}
