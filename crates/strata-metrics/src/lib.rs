//! Change metrics and aggregations over mined file histories.
//!
//! The reducers here are pure functions of their inputs:
//! - [`hassan`]: windowed entropy of changes with decay variants
//! - [`moser`]: per-file process metrics
//! - [`dambros`]: churn and entropy of static metric deltas
//! - [`aggregation`]: dispersion and inequality measures over value lists
//!
//! All floating point reductions go through [`ExactSum`].

pub mod aggregation;
mod dambros;
mod hassan;
mod moser;
mod summation;

pub use dambros::{dambros, DambrosMetrics};
pub use hassan::{hassan, HassanMetrics};
pub use moser::{moser, MoserMetrics};
pub use summation::{exact_sum, ExactSum};
