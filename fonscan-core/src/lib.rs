//! fonscan core: domain types, price providers, fetch classification, metrics.
//!
//! This crate has no opinion on scheduling. It knows how to:
//! - identify funds and bound date ranges
//! - fetch one fund's history once and classify what came back
//! - turn a canonical series into weekly returns or risk metrics
//! - derive per-task jitter RNGs from one master seed

pub mod data;
pub mod domain;
pub mod metrics;
pub mod returns;
pub mod rng;
