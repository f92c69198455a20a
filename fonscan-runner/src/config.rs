//! Scan configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! The `[[stages]]` array is the retry ladder: each entry is one pass over
//! whatever the previous pass left unresolved.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fonscan_core::data::tefas::DEFAULT_BASE_URL;
use fonscan_core::data::{CsvDirProvider, PriceProvider, TefasOptions, TefasProvider};
use fonscan_core::domain::{DateRange, RangeError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config validation failed: {0}")]
    Invalid(String),

    #[error("build price provider: {0}")]
    Provider(String),
}

/// One rung of the retry ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    pub max_concurrency: usize,
    /// Sleep before each fetch. Zero disables the delay and the jitter.
    #[serde(default)]
    pub base_delay_secs: f64,
    /// Upper bound of the uniform jitter added on top of the base delay.
    #[serde(default)]
    pub jitter_secs: f64,
}

impl StageConfig {
    pub fn new(
        name: impl Into<String>,
        max_concurrency: usize,
        base_delay_secs: f64,
        jitter_secs: f64,
    ) -> Self {
        Self {
            name: name.into(),
            max_concurrency,
            base_delay_secs,
            jitter_secs,
        }
    }

    /// `base + U(0, jitter)` when `base > 0`, otherwise zero. Never longer
    /// than [`MAX_STAGE_DELAY_SECS`].
    pub fn pre_fetch_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        if !self.base_delay_secs.is_finite() || self.base_delay_secs <= 0.0 {
            return Duration::ZERO;
        }
        let jitter = if self.jitter_secs.is_finite() && self.jitter_secs > 0.0 {
            rng.gen_range(0.0..=self.jitter_secs)
        } else {
            0.0
        };
        let secs = (self.base_delay_secs + jitter).min(MAX_STAGE_DELAY_SECS);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(Duration::from_secs(MAX_STAGE_DELAY_SECS as u64))
    }
}

/// Upper bound on `base_delay_secs + jitter_secs` for one stage (one day).
pub const MAX_STAGE_DELAY_SECS: f64 = 86_400.0;

pub fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig::new("initial", 10, 0.0, 0.0),
        StageConfig::new("retry-1", 4, 1.5, 1.0),
        StageConfig::new("retry-2", 2, 3.0, 2.0),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Tefas,
    CsvDir,
}

/// Where prices come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// TEFAS fund type: YAT, EMK or BYF.
    #[serde(default = "default_fund_type")]
    pub fund_type: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Required when `kind = "csv_dir"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prices_dir: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            base_url: default_base_url(),
            fund_type: default_fund_type(),
            timeout_secs: default_timeout_secs(),
            prices_dir: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_fund_type() -> String {
    "YAT".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

/// Column names in the universe CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseConfig {
    #[serde(default = "default_code_column")]
    pub code_column: String,
    #[serde(default = "default_name_column")]
    pub name_column: String,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            code_column: default_code_column(),
            name_column: default_name_column(),
        }
    }
}

fn default_code_column() -> String {
    "code".to_string()
}

fn default_name_column() -> String {
    "name".to_string()
}

/// Weekly momentum scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyConfig {
    #[serde(default = "default_weeks")]
    pub weeks: usize,
    /// Extra days fetched before the oldest boundary so it has an as-of price.
    #[serde(default = "default_padding_days")]
    pub padding_days: u32,
    /// Minimum cumulative return (percent) to make the result set.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for WeeklyConfig {
    fn default() -> Self {
        Self {
            weeks: default_weeks(),
            padding_days: default_padding_days(),
            threshold: default_threshold(),
        }
    }
}

impl WeeklyConfig {
    /// `[today - (weeks * 7 + padding_days), today]`.
    pub fn range(&self, today: NaiveDate) -> Result<DateRange, RangeError> {
        let weeks = u32::try_from(self.weeks).unwrap_or(u32::MAX);
        let days = weeks.saturating_mul(7).saturating_add(self.padding_days);
        DateRange::lookback_days(today, days)
    }
}

const fn default_weeks() -> usize {
    2
}

const fn default_padding_days() -> u32 {
    21
}

const fn default_threshold() -> f64 {
    2.0
}

/// Detailed risk analysis scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_lookback_months")]
    pub lookback_months: u32,
    /// Series shorter than this are excluded.
    #[serde(default = "default_min_points")]
    pub min_points: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lookback_months: default_lookback_months(),
            min_points: default_min_points(),
        }
    }
}

impl AnalysisConfig {
    pub fn range(&self, today: NaiveDate) -> Result<DateRange, RangeError> {
        DateRange::lookback_months(today, self.lookback_months)
    }
}

const fn default_lookback_months() -> u32 {
    3
}

const fn default_min_points() -> usize {
    10
}

/// Top-level scan configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// IANA zone "today" and completion stamps are computed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Fixes the per-task jitter when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_seed: Option<u64>,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub weekly: WeeklyConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            jitter_seed: None,
            source: SourceConfig::default(),
            universe: UniverseConfig::default(),
            weekly: WeeklyConfig::default(),
            analysis: AnalysisConfig::default(),
            stages: default_stages(),
        }
    }
}

fn default_timezone() -> String {
    "Europe/Istanbul".to_string()
}

impl ScanConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configurations the scheduler or scans cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.stages.is_empty() {
            return invalid("at least one [[stages]] entry is required".into());
        }
        let mut seen = std::collections::BTreeSet::new();
        for (i, stage) in self.stages.iter().enumerate() {
            let label = format!("stage {} ('{}')", i + 1, stage.name);
            if stage.name.trim().is_empty() {
                return invalid(format!("stage {} has a blank name", i + 1));
            }
            if !seen.insert(stage.name.as_str()) {
                return invalid(format!("{label}: duplicate stage name"));
            }
            if stage.max_concurrency == 0 {
                return invalid(format!("{label}: max_concurrency must be at least 1"));
            }
            if !stage.base_delay_secs.is_finite() || stage.base_delay_secs < 0.0 {
                return invalid(format!("{label}: base_delay_secs must be finite and >= 0"));
            }
            if !stage.jitter_secs.is_finite() || stage.jitter_secs < 0.0 {
                return invalid(format!("{label}: jitter_secs must be finite and >= 0"));
            }
            if stage.base_delay_secs + stage.jitter_secs > MAX_STAGE_DELAY_SECS {
                return invalid(format!(
                    "{label}: base_delay_secs + jitter_secs must not exceed {MAX_STAGE_DELAY_SECS}s"
                ));
            }
        }

        if self.weekly.weeks == 0 {
            return invalid("weekly.weeks must be at least 1".into());
        }
        if !self.weekly.threshold.is_finite() {
            return invalid("weekly.threshold must be finite".into());
        }
        if self.analysis.lookback_months == 0 {
            return invalid("analysis.lookback_months must be at least 1".into());
        }
        if self.source.timeout_secs == 0 {
            return invalid("source.timeout_secs must be at least 1".into());
        }
        if self.source.kind == SourceKind::CsvDir && self.source.prices_dir.is_none() {
            return invalid("source.prices_dir is required when source.kind = \"csv_dir\"".into());
        }
        self.tz()?;
        Ok(())
    }

    /// Ladder shapes that run but defeat the backoff: concurrency rising or
    /// delay shrinking from one stage to the next.
    pub fn ladder_warnings(&self) -> Vec<String> {
        self.stages
            .windows(2)
            .flat_map(|w| {
                let (prev, next) = (&w[0], &w[1]);
                let mut out = Vec::new();
                if next.max_concurrency > prev.max_concurrency {
                    out.push(format!(
                        "stage '{}' raises concurrency {} -> {}",
                        next.name, prev.max_concurrency, next.max_concurrency
                    ));
                }
                if next.base_delay_secs < prev.base_delay_secs {
                    out.push(format!(
                        "stage '{}' lowers base delay {}s -> {}s",
                        next.name, prev.base_delay_secs, next.base_delay_secs
                    ));
                }
                out
            })
            .collect()
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Current calendar date in the configured zone.
    pub fn today(&self) -> Result<NaiveDate, ConfigError> {
        Ok(Utc::now().with_timezone(&self.tz()?).date_naive())
    }

    /// Current instant with the configured zone's offset, for completion stamps.
    pub fn now(&self) -> Result<DateTime<FixedOffset>, ConfigError> {
        Ok(Utc::now().with_timezone(&self.tz()?).fixed_offset())
    }

    /// Build the provider `[source]` describes.
    pub fn build_provider(&self) -> Result<Box<dyn PriceProvider>, ConfigError> {
        match self.source.kind {
            SourceKind::Tefas => {
                let options = TefasOptions {
                    base_url: self.source.base_url.clone(),
                    fund_type: self.source.fund_type.clone(),
                    timeout: Duration::from_secs(self.source.timeout_secs),
                };
                let provider =
                    TefasProvider::new(options).map_err(|e| ConfigError::Provider(e.to_string()))?;
                Ok(Box::new(provider))
            }
            SourceKind::CsvDir => {
                let dir = self.source.prices_dir.clone().ok_or_else(|| {
                    ConfigError::Invalid("source.prices_dir is required for csv_dir".into())
                })?;
                Ok(Box::new(CsvDirProvider::new(dir)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_file_is_default_config() {
        let config = ScanConfig::from_toml("").unwrap();
        assert_eq!(config, ScanConfig::default());
        assert_eq!(config.stages.len(), 3);
        assert_eq!(config.weekly.weeks, 2);
        assert_eq!(config.weekly.threshold, 2.0);
        assert_eq!(config.timezone, "Europe/Istanbul");
    }

    #[test]
    fn default_config_survives_toml() {
        let config = ScanConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(ScanConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn custom_ladder_parses() {
        let text = r#"
            jitter_seed = 7

            [weekly]
            weeks = 4
            threshold = 3.5

            [[stages]]
            name = "fast"
            max_concurrency = 8

            [[stages]]
            name = "slow"
            max_concurrency = 1
            base_delay_secs = 5.0
            jitter_secs = 0.5
        "#;
        let config = ScanConfig::from_toml(text).unwrap();
        assert_eq!(config.jitter_seed, Some(7));
        assert_eq!(config.weekly.weeks, 4);
        assert_eq!(config.weekly.padding_days, 21);
        assert_eq!(config.stages[0].base_delay_secs, 0.0);
        assert_eq!(config.stages[1].max_concurrency, 1);
    }

    #[test]
    fn rejects_empty_ladder() {
        let mut config = ScanConfig::default();
        config.stages.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = ScanConfig::default();
        config.stages[1].max_concurrency = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("retry-1"), "{err}");
    }

    #[test]
    fn rejects_negative_and_nan_delays() {
        let mut config = ScanConfig::default();
        config.stages[2].base_delay_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = ScanConfig::default();
        config.stages[2].jitter_secs = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_stage_names() {
        let mut config = ScanConfig::default();
        config.stages[2].name = "retry-1".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_timezone() {
        let config = ScanConfig {
            timezone: "Mars/Olympus".into(),
            ..ScanConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn csv_dir_requires_prices_dir() {
        let mut config = ScanConfig::default();
        config.source.kind = SourceKind::CsvDir;
        assert!(config.validate().is_err());
        config.source.prices_dir = Some(PathBuf::from("prices"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_ladder_has_no_warnings() {
        assert!(ScanConfig::default().ladder_warnings().is_empty());
    }

    #[test]
    fn inverted_ladder_warns_but_validates() {
        let config = ScanConfig {
            stages: vec![
                StageConfig::new("a", 2, 3.0, 0.0),
                StageConfig::new("b", 8, 1.0, 0.0),
            ],
            ..ScanConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.ladder_warnings().len(), 2);
    }

    #[test]
    fn zero_base_delay_skips_jitter() {
        let stage = StageConfig::new("initial", 10, 0.0, 5.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(stage.pre_fetch_delay(&mut rng), Duration::ZERO);
    }

    #[test]
    fn delay_stays_within_jitter_band() {
        let stage = StageConfig::new("retry", 2, 1.5, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let d = stage.pre_fetch_delay(&mut rng).as_secs_f64();
            assert!((1.5..=2.5 + 1e-9).contains(&d), "{d}");
        }
    }

    #[test]
    fn zero_jitter_is_exact_base() {
        let stage = StageConfig::new("retry", 2, 0.25, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(stage.pre_fetch_delay(&mut rng), Duration::from_millis(250));
    }

    #[test]
    fn rejects_delay_longer_than_a_day() {
        let mut config = ScanConfig::default();
        config.stages.push(StageConfig::new("slow", 1, 1e20, 0.0));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.stages.pop();
        config.stages.push(StageConfig::new("slow", 1, 86_000.0, 500.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_delay_is_capped_not_dropped() {
        let stage = StageConfig::new("slow", 1, 1e20, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            stage.pre_fetch_delay(&mut rng),
            Duration::from_secs(MAX_STAGE_DELAY_SECS as u64)
        );
    }

    #[test]
    fn weekly_range_covers_weeks_and_padding() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let range = WeeklyConfig::default().range(today).unwrap();
        assert_eq!(range.end(), today);
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2024, 2, 9).unwrap());
    }
}
