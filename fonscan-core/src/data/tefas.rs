//! TEFAS price provider.
//!
//! Fetches daily fund history from the TEFAS history endpoint (the same one
//! the public "Tarihsel Veriler" page posts to). The endpoint sits behind a
//! WAF that answers bursts with 403/429 or an HTML rejection page; all of
//! those surface as transient errors so the stage ladder can slow down.
//!
//! One `fetch` is one POST. There is no retry loop here.

use super::provider::{FetchError, PriceProvider, RawRow, RawSeries};
use crate::domain::{DateRange, InstrumentId};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.tefas.gov.tr";
const HISTORY_PATH: &str = "/api/DB/BindHistoryInfo";
const REFERER_PATH: &str = "/TarihselVeriler.aspx";

/// History endpoint response.
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    data: Option<Vec<HistoryRow>>,
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    #[serde(rename = "TARIH")]
    date: EpochMillis,
    #[serde(rename = "FONKODU")]
    code: Option<String>,
    #[serde(rename = "FONUNVAN")]
    title: Option<String>,
    #[serde(rename = "FIYAT")]
    price: Option<f64>,
    #[serde(rename = "PORTFOYBUYUKLUK")]
    market_cap: Option<f64>,
    #[serde(rename = "KISISAYISI")]
    investors: Option<f64>,
}

/// TARIH arrives as a quoted millisecond timestamp, occasionally unquoted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EpochMillis {
    Text(String),
    Number(i64),
}

impl EpochMillis {
    fn to_date(&self) -> Result<NaiveDate, FetchError> {
        let ms = match self {
            EpochMillis::Number(n) => *n,
            EpochMillis::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                FetchError::ResponseFormatChanged(format!("invalid TARIH value: {s:?}"))
            })?,
        };
        let nanos = (ms.rem_euclid(1000) * 1_000_000) as u32;
        DateTime::from_timestamp(ms.div_euclid(1000), nanos)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| FetchError::ResponseFormatChanged(format!("invalid timestamp: {ms}")))
    }
}

/// Connection settings for [`TefasProvider`].
#[derive(Debug, Clone)]
pub struct TefasOptions {
    pub base_url: String,
    /// TEFAS fund type code: "YAT" (securities funds), "EMK" (pension), "BYF" (ETFs).
    pub fund_type: String,
    pub timeout: Duration,
}

impl Default for TefasOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fund_type: "YAT".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// TEFAS data provider.
pub struct TefasProvider {
    client: reqwest::blocking::Client,
    options: TefasOptions,
}

impl TefasProvider {
    pub fn new(options: TefasOptions) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;
        Ok(Self { client, options })
    }

    fn history_url(&self) -> String {
        format!("{}{HISTORY_PATH}", self.options.base_url.trim_end_matches('/'))
    }

    /// TEFAS expects `dd.mm.yyyy`.
    fn format_date(date: NaiveDate) -> String {
        date.format("%d.%m.%Y").to_string()
    }

    /// Parse a history response body into raw rows.
    fn parse_response(id: &InstrumentId, body: &str) -> Result<RawSeries, FetchError> {
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            return Err(FetchError::ResponseFormatChanged(
                "HTML body instead of JSON (request rejected upstream)".into(),
            ));
        }

        let resp: HistoryResponse = serde_json::from_str(trimmed).map_err(|e| {
            FetchError::ResponseFormatChanged(format!("failed to parse response for {id}: {e}"))
        })?;

        let mut title = None;
        let mut rows = Vec::new();

        for row in resp.data.unwrap_or_default() {
            if let Some(code) = row.code.as_deref() {
                if !code.trim().eq_ignore_ascii_case(id.as_str()) {
                    continue;
                }
            }
            if title.is_none() {
                title = row.title.clone().filter(|t| !t.trim().is_empty());
            }
            rows.push(RawRow {
                date: row.date.to_date()?,
                price: row.price.unwrap_or(f64::NAN),
                market_cap: row.market_cap,
                investor_count: row
                    .investors
                    .filter(|n| n.is_finite() && *n >= 0.0)
                    .map(|n| n.round() as u64),
            });
        }

        Ok(RawSeries::new(title, rows))
    }
}

impl PriceProvider for TefasProvider {
    fn name(&self) -> &str {
        "tefas"
    }

    fn fetch(&self, id: &InstrumentId, range: &DateRange) -> Result<RawSeries, FetchError> {
        let start = Self::format_date(range.start());
        let end = Self::format_date(range.end());
        let form = [
            ("fontip", self.options.fund_type.as_str()),
            ("sfontur", ""),
            ("fonkod", id.as_str()),
            ("fongrup", ""),
            ("bastarih", start.as_str()),
            ("bittarih", end.as_str()),
            ("fonturkod", ""),
            ("fonunvantip", ""),
        ];

        let referer = format!(
            "{}{REFERER_PATH}",
            self.options.base_url.trim_end_matches('/')
        );
        let resp = self
            .client
            .post(self.history_url())
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", referer)
            .form(&form)
            .send()
            .map_err(|e| FetchError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(FetchError::RateLimited {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .map_err(|e| FetchError::NetworkUnreachable(format!("reading body for {id}: {e}")))?;
        Self::parse_response(id, &body)
    }
}
