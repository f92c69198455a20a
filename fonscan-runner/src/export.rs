//! Result export: CSV table, Markdown run summary, JSON manifest.
//!
//! A destination is a name inside an output directory. Exporting clears
//! whatever the destination held and rewrites three files:
//! - `<destination>.csv`: the ranked table
//! - `<destination>.summary.md`: fetch accounting for the run
//! - `<destination>.manifest.json`: counts plus the completion stamp
//!
//! The weekly table's `code`/`name` columns double as a universe file, so
//! `analyze` can run on a weekly result.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::scan::{AnalysisScanReport, WeeklyScanReport};
use crate::summary::RunSummary;

/// Files written for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub summary: PathBuf,
    pub manifest: PathBuf,
}

impl ExportPaths {
    fn new(dir: &Path, destination: &str) -> Self {
        Self {
            csv: dir.join(format!("{destination}.csv")),
            summary: dir.join(format!("{destination}.summary.md")),
            manifest: dir.join(format!("{destination}.manifest.json")),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [&self.csv, &self.summary, &self.manifest]
    }
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    destination: &'a str,
    scan: &'static str,
    completed_at: String,
    today: NaiveDate,
    range_start: NaiveDate,
    range_end: NaiveDate,
    rows: usize,
    insufficient: usize,
    summary: &'a RunSummary,
}

// ─── CSV tables ─────────────────────────────────────────────────────

/// Columns: code, name, week_1..week_n (most recent first), total.
pub fn weekly_csv(report: &WeeklyScanReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["code".to_string(), "name".to_string()];
    header.extend((1..=report.weeks).map(|k| format!("week_{k}")));
    header.push("total".to_string());
    wtr.write_record(&header)?;

    for r in &report.ranked {
        let mut row = vec![r.id.to_string(), r.name.clone()];
        row.extend(r.period_returns.iter().map(|c| format!("{c:.2}")));
        row.push(format!("{:.2}", r.cumulative_return));
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: code, name, investors, market_cap, sortino, sharpe, return_pct,
/// volatility_pct. Missing size fields are left blank.
pub fn analysis_csv(report: &AnalysisScanReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "code",
        "name",
        "investors",
        "market_cap",
        "sortino",
        "sharpe",
        "return_pct",
        "volatility_pct",
    ])?;

    for r in &report.ranked {
        let row: Vec<String> = vec![
            r.id.to_string(),
            r.name.clone(),
            r.investors.map(|n| n.to_string()).unwrap_or_default(),
            r.market_cap.map(|m| format!("{m:.2}")).unwrap_or_default(),
            format!("{:.2}", r.sortino),
            format!("{:.2}", r.sharpe),
            format!("{:.2}", r.return_pct),
            format!("{:.2}", r.volatility_pct),
        ];
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Destination bundle ─────────────────────────────────────────────

pub fn export_weekly(
    report: &WeeklyScanReport,
    dir: &Path,
    destination: &str,
    completed_at: DateTime<FixedOffset>,
) -> Result<ExportPaths> {
    let csv = weekly_csv(report)?;
    let heading = format!(
        "# Weekly scan: {destination}\n\n\
         - Window: {} weeks ending {}\n\
         - Fetched: {}\n\
         - Threshold: {:.2}%\n\
         - Passed: {}, below threshold: {}, insufficient window: {}\n\
         - Completed: {}\n\n",
        report.weeks,
        report.today,
        report.range,
        report.threshold,
        report.ranked.len(),
        report.below_threshold,
        report.insufficient.len(),
        completed_at.to_rfc3339(),
    );
    let manifest = Manifest {
        destination,
        scan: "weekly",
        completed_at: completed_at.to_rfc3339(),
        today: report.today,
        range_start: report.range.start(),
        range_end: report.range.end(),
        rows: report.ranked.len(),
        insufficient: report.insufficient.len(),
        summary: &report.summary,
    };
    write_destination(dir, destination, &csv, &heading, &report.summary, &manifest)
}

pub fn export_analysis(
    report: &AnalysisScanReport,
    dir: &Path,
    destination: &str,
    completed_at: DateTime<FixedOffset>,
) -> Result<ExportPaths> {
    let csv = analysis_csv(report)?;
    let heading = format!(
        "# Analysis scan: {destination}\n\n\
         - Fetched: {}\n\
         - Ranked: {}, too few points: {}\n\
         - Completed: {}\n\n",
        report.range,
        report.ranked.len(),
        report.insufficient.len(),
        completed_at.to_rfc3339(),
    );
    let manifest = Manifest {
        destination,
        scan: "analysis",
        completed_at: completed_at.to_rfc3339(),
        today: report.today,
        range_start: report.range.start(),
        range_end: report.range.end(),
        rows: report.ranked.len(),
        insufficient: report.insufficient.len(),
        summary: &report.summary,
    };
    write_destination(dir, destination, &csv, &heading, &report.summary, &manifest)
}

fn write_destination(
    dir: &Path,
    destination: &str,
    csv: &str,
    heading: &str,
    summary: &RunSummary,
    manifest: &Manifest<'_>,
) -> Result<ExportPaths> {
    validate_destination(destination)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir: {}", dir.display()))?;

    let paths = ExportPaths::new(dir, destination);
    for path in paths.all() {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("failed to clear {}", path.display()))?;
        }
    }

    std::fs::write(&paths.csv, csv)
        .with_context(|| format!("failed to write {}", paths.csv.display()))?;

    let mut md = heading.to_string();
    md.push_str(&summary.render_markdown());
    std::fs::write(&paths.summary, md)
        .with_context(|| format!("failed to write {}", paths.summary.display()))?;

    let json = serde_json::to_string_pretty(manifest).context("failed to serialize manifest")?;
    std::fs::write(&paths.manifest, json)
        .with_context(|| format!("failed to write {}", paths.manifest.display()))?;

    Ok(paths)
}

fn validate_destination(destination: &str) -> Result<()> {
    if destination.trim().is_empty() {
        bail!("destination name is empty");
    }
    if destination.contains(['/', '\\']) || destination == "." || destination == ".." {
        bail!("destination '{destination}' must be a plain name, not a path");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fonscan_core::domain::{DateRange, InstrumentId};
    use fonscan_core::metrics::AnalysisRecord;
    use fonscan_core::returns::WeeklyReturnRecord;
    use std::collections::BTreeMap;

    fn id(s: &str) -> InstrumentId {
        InstrumentId::parse(s).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn empty_summary() -> RunSummary {
        RunSummary {
            submitted: 2,
            succeeded: 2,
            no_data: 0,
            unresolved: 0,
            stages_run: 1,
            stages: vec![],
            unresolved_funds: BTreeMap::new(),
            no_data_funds: vec![],
        }
    }

    fn weekly_report() -> WeeklyScanReport {
        WeeklyScanReport {
            today: today(),
            range: DateRange::lookback_days(today(), 35).unwrap(),
            weeks: 2,
            threshold: 2.0,
            ranked: vec![WeeklyReturnRecord {
                id: id("AAK"),
                name: "Ak, Portföy".into(),
                period_returns: vec![1.234, 3.0],
                cumulative_return: 4.234,
            }],
            below_threshold: 1,
            insufficient: vec![],
            summary: empty_summary(),
        }
    }

    fn analysis_report() -> AnalysisScanReport {
        AnalysisScanReport {
            today: today(),
            range: DateRange::lookback_months(today(), 3).unwrap(),
            ranked: vec![AnalysisRecord {
                id: id("TTE"),
                name: "Teknoloji".into(),
                investors: Some(1200),
                market_cap: None,
                sortino: 2.345,
                sharpe: 1.5,
                return_pct: 12.0,
                volatility_pct: 18.25,
            }],
            insufficient: vec![id("XYZ")],
            summary: empty_summary(),
        }
    }

    fn completed() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-15T18:30:00+03:00").unwrap()
    }

    #[test]
    fn weekly_csv_has_week_columns() {
        let csv = weekly_csv(&weekly_report()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("code,name,week_1,week_2,total"));
        assert_eq!(lines.next(), Some("AAK,\"Ak, Portföy\",1.23,3.00,4.23"));
    }

    #[test]
    fn analysis_csv_blanks_missing_fields() {
        let csv = analysis_csv(&analysis_report()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("code,name,investors,market_cap,sortino,sharpe,return_pct,volatility_pct")
        );
        assert_eq!(lines.next(), Some("TTE,Teknoloji,1200,,2.35,1.50,12.00,18.25"));
    }

    #[test]
    fn export_writes_three_files_and_stamps_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let paths = export_weekly(&weekly_report(), dir.path(), "weekly", completed()).unwrap();

        assert!(paths.csv.exists());
        let md = std::fs::read_to_string(&paths.summary).unwrap();
        assert!(md.contains("# Weekly scan: weekly"));
        assert!(md.contains("# Run Summary"));

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.manifest).unwrap()).unwrap();
        assert_eq!(manifest["completed_at"], "2024-03-15T18:30:00+03:00");
        assert_eq!(manifest["rows"], 1);
        assert_eq!(manifest["scan"], "weekly");
        assert_eq!(manifest["summary"]["submitted"], 2);
    }

    #[test]
    fn export_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.csv"), "stale\n").unwrap();
        let paths = export_analysis(&analysis_report(), dir.path(), "out", completed()).unwrap();
        let csv = std::fs::read_to_string(&paths.csv).unwrap();
        assert!(!csv.contains("stale"));
        assert!(csv.starts_with("code,name,investors"));
    }

    #[test]
    fn weekly_export_is_a_valid_universe() {
        let dir = tempfile::tempdir().unwrap();
        let paths = export_weekly(&weekly_report(), dir.path(), "weekly", completed()).unwrap();
        let u = fonscan_core::data::Universe::from_csv_path(&paths.csv, "code", Some("name"))
            .unwrap();
        assert_eq!(u.name(&id("AAK")), Some("Ak, Portföy"));
    }

    #[test]
    fn path_like_destination_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(export_weekly(&weekly_report(), dir.path(), "../escape", completed()).is_err());
        assert!(export_weekly(&weekly_report(), dir.path(), "  ", completed()).is_err());
    }
}
