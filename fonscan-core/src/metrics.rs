//! Risk metrics for the detailed analysis scan.
//!
//! Pure functions over a completed price series: prices in, scalars out.
//! Annualization assumes 252 trading days.

use serde::{Deserialize, Serialize};

use crate::domain::{InstrumentId, PriceSeries};

const TRADING_DAYS: f64 = 252.0;

/// Annualized return/risk statistics for one fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// (last / first - 1) * 100.
    pub total_return_pct: f64,
    pub volatility_pct: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub market_cap: Option<f64>,
    pub investor_count: Option<u64>,
}

impl RiskMetrics {
    /// `None` when the series has fewer than `min_points` points (or fewer
    /// than two, since no daily return exists then).
    pub fn compute(series: &PriceSeries, min_points: usize) -> Option<Self> {
        if series.len() < min_points.max(2) {
            return None;
        }
        let prices: Vec<f64> = series.prices().collect();
        let returns = daily_returns(&prices);
        let first = *prices.first()?;
        let last_point = series.last()?;

        let std = std_dev(&returns);
        Some(Self {
            total_return_pct: (last_point.price / first - 1.0) * 100.0,
            volatility_pct: std * TRADING_DAYS.sqrt() * 100.0,
            sharpe: sharpe_ratio(&returns),
            sortino: sortino_ratio(&returns),
            market_cap: last_point.market_cap,
            investor_count: last_point.investor_count,
        })
    }
}

/// One ranked row of the analysis scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: InstrumentId,
    pub name: String,
    pub investors: Option<u64>,
    pub market_cap: Option<f64>,
    pub sortino: f64,
    pub sharpe: f64,
    pub return_pct: f64,
    pub volatility_pct: f64,
}

impl AnalysisRecord {
    pub fn new(id: InstrumentId, name: impl Into<String>, metrics: RiskMetrics) -> Self {
        Self {
            id,
            name: name.into(),
            investors: metrics.investor_count,
            market_cap: metrics.market_cap,
            sortino: metrics.sortino,
            sharpe: metrics.sharpe,
            return_pct: metrics.total_return_pct,
            volatility_pct: metrics.volatility_pct,
        }
    }
}

/// Simple returns between consecutive prices.
pub fn daily_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Annualized Sharpe with a zero risk-free rate. 0 for a flat series.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / std * TRADING_DAYS.sqrt()
}

/// Annualized mean over annualized downside deviation.
///
/// Downside deviation is the sample standard deviation of the negative
/// returns only; fewer than two of them yields 0.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    let negatives: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if negatives.len() < 2 {
        return 0.0;
    }
    let downside = std_dev(&negatives) * TRADING_DAYS.sqrt();
    if downside < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) * TRADING_DAYS / downside
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
