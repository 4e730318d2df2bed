//! Rolling statistics and the augmented Dickey-Fuller unit-root test.
//!
//! The ADF test regresses `Δx_t` on a constant, the lagged level `x_{t-1}` and
//! `p` lagged differences. The lag order `p` is chosen by AIC over
//! `0..=maxlag`, every candidate being fitted on the same rows. The reported
//! statistic is the t-value of the lagged level in a refit with the chosen
//! order. P-values follow MacKinnon (1994) and critical values MacKinnon
//! (2010), both for the constant-only case with one series.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use chrono::NaiveDateTime;
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use super::error::{AnalyticsError, AnalyticsResult};
use crate::models::StationTimeSeries;

/// A series is reported stationary when the ADF p-value is below this.
pub const STATIONARITY_P_VALUE: f64 = 0.05;

// MacKinnon (1994), regression "c", N = 1.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALLP: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGEP: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010), regression "c", N = 1: b0 + b1/n + b2/n^2 + b3/n^3.
const CRITICAL_VALUES: [(&str, [f64; 4]); 3] = [
    ("1%", [-3.43035, -6.5393, -16.786, -79.433]),
    ("5%", [-2.86154, -2.8903, -4.234, -40.040]),
    ("10%", [-2.56677, -1.5384, -2.809, 0.0]),
];

/// Trailing rolling mean and sample standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub window: usize,
    pub timestamps: Vec<NaiveDateTime>,
    pub mean: Vec<Option<f64>>,
    pub std: Vec<Option<f64>>,
}

/// Outcome of an augmented Dickey-Fuller test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityReport {
    pub statistic: f64,
    pub p_value: f64,
    pub lags_used: usize,
    /// Rows in the final regression.
    pub n_obs: usize,
    pub critical_values: BTreeMap<String, f64>,
    /// AIC of the selected lag order.
    pub ic_best: f64,
    pub is_stationary: bool,
}

/// Rolling statistics and ADF report for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityCheck {
    pub rolling: RollingStats,
    pub report: StationarityReport,
}

/// Rolling mean and std over a trailing `window`.
///
/// A position is `None` until `window` points are available, and whenever the
/// window holds a missing value. The std uses one delta degree of freedom, so
/// `window == 1` yields no std at all.
pub fn rolling_stats(series: &StationTimeSeries, window: usize) -> AnalyticsResult<RollingStats> {
    if window == 0 {
        return Err(AnalyticsError::invalid_config("rolling window must be at least 1")
            .with_operation("rolling_stats"));
    }

    let values = series.values();
    let mut mean = Vec::with_capacity(values.len());
    let mut std = Vec::with_capacity(values.len());

    for end in 0..values.len() {
        let full: Option<Vec<f64>> = if end + 1 >= window {
            values[end + 1 - window..=end].iter().copied().collect()
        } else {
            None
        };
        match full {
            Some(w) => {
                let m = w.iter().sum::<f64>() / window as f64;
                mean.push(Some(m));
                std.push((window > 1).then(|| {
                    let ss: f64 = w.iter().map(|v| (v - m).powi(2)).sum();
                    (ss / (window - 1) as f64).sqrt()
                }));
            }
            None => {
                mean.push(None);
                std.push(None);
            }
        }
    }

    Ok(RollingStats {
        window,
        timestamps: series.timestamps(),
        mean,
        std,
    })
}

/// ADF test on a series with no missing buckets.
pub fn stationarity_test(series: &StationTimeSeries) -> AnalyticsResult<StationarityReport> {
    let values = series.complete_values().ok_or_else(|| {
        AnalyticsError::insufficient_data(format!(
            "series has {} missing values",
            series.missing_count()
        ))
        .with_operation("stationarity_test")
        .with_station(series.station_id)
    })?;
    adf_test(&values).map_err(|e| e.with_station(series.station_id))
}

/// Rolling statistics plus ADF test, as one report.
pub fn check_stationarity(
    series: &StationTimeSeries,
    window: usize,
) -> AnalyticsResult<StationarityCheck> {
    Ok(StationarityCheck {
        rolling: rolling_stats(series, window)?,
        report: stationarity_test(series)?,
    })
}

/// Default maximum lag: `⌈12·(n/100)^{1/4}⌉`, capped at `n/2 − 2`.
pub fn default_max_lag(n: usize) -> Option<usize> {
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as i64;
    let cap = (n / 2) as i64 - 2;
    let maxlag = schwert.min(cap);
    (maxlag >= 0).then_some(maxlag as usize)
}

/// Augmented Dickey-Fuller test with a constant term and AIC lag selection.
pub fn adf_test(x: &[f64]) -> AnalyticsResult<StationarityReport> {
    if let Some(pos) = x.iter().position(|v| !v.is_finite()) {
        return Err(
            AnalyticsError::non_finite(format!("value at position {} is not finite", pos))
                .with_operation("adf_test"),
        );
    }
    let maxlag = default_max_lag(x.len()).ok_or_else(|| {
        AnalyticsError::insufficient_data(format!(
            "{} observations are too few for a unit-root test",
            x.len()
        ))
        .with_operation("adf_test")
    })?;

    let diff: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    // Every candidate order is fitted on the rows available at `maxlag`.
    let (full_x, full_y) = design(x, &diff, maxlag, maxlag);
    let mut best: Option<(f64, usize)> = None;
    for lags in 0..=maxlag {
        let fit = ols(&full_x.columns(0, lags + 2).into_owned(), &full_y)?;
        let aic = fit.aic();
        debug!("ADF lag {} -> AIC {:.4}", lags, aic);
        if best.map_or(true, |(b, _)| aic < b) {
            best = Some((aic, lags));
        }
    }
    let (ic_best, lags_used) = best.ok_or_else(|| {
        AnalyticsError::insufficient_data("no lag order could be fitted").with_operation("adf_test")
    })?;

    let (x_mat, y_vec) = design(x, &diff, lags_used, lags_used);
    let fit = ols(&x_mat, &y_vec)?;
    let statistic = fit.params[1] / fit.bse[1];
    if !statistic.is_finite() {
        return Err(AnalyticsError::non_finite(
            "ADF statistic is not finite (series is constant or perfectly linear)",
        )
        .with_operation("adf_test"));
    }

    let p_value = mackinnon_p_value(statistic)?;
    let n_obs = fit.nobs;

    Ok(StationarityReport {
        statistic,
        p_value,
        lags_used,
        n_obs,
        critical_values: mackinnon_critical_values(n_obs),
        ic_best,
        is_stationary: p_value < STATIONARITY_P_VALUE,
    })
}

/// Approximate asymptotic p-value of an ADF statistic.
pub fn mackinnon_p_value(statistic: f64) -> AnalyticsResult<f64> {
    if statistic > TAU_MAX {
        return Ok(1.0);
    }
    if statistic < TAU_MIN {
        return Ok(0.0);
    }
    let z = if statistic <= TAU_STAR {
        polyval(&TAU_SMALLP, statistic)
    } else {
        polyval(&TAU_LARGEP, statistic)
    };
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AnalyticsError::invalid_config(format!("standard normal: {}", e)))?;
    Ok(normal.cdf(z))
}

/// Finite-sample critical values at 1%, 5% and 10%.
pub fn mackinnon_critical_values(n_obs: usize) -> BTreeMap<String, f64> {
    let inv = 1.0 / n_obs as f64;
    CRITICAL_VALUES
        .iter()
        .map(|(level, coef)| (level.to_string(), polyval(coef, inv)))
        .collect()
}

/// `c[0] + c[1]·t + c[2]·t² + …`
fn polyval(coef: &[f64], t: f64) -> f64 {
    coef.iter().rev().fold(0.0, |acc, c| acc * t + c)
}

/// Rows for `j in skip..diff.len()`: `[1, x_j, Δx_{j-1}, …, Δx_{j-lags}]`
/// against `Δx_j`. Requires `skip >= lags`.
fn design(x: &[f64], diff: &[f64], lags: usize, skip: usize) -> (DMatrix<f64>, DVector<f64>) {
    let rows = diff.len().saturating_sub(skip);
    let cols = lags + 2;
    let mut data = Vec::with_capacity(rows * cols);
    for j in skip..diff.len() {
        data.push(1.0);
        data.push(x[j]);
        for i in 1..=lags {
            data.push(diff[j - i]);
        }
    }
    (
        DMatrix::from_row_slice(rows, cols, &data),
        DVector::from_iterator(rows, diff[skip..].iter().copied()),
    )
}

struct OlsFit {
    params: DVector<f64>,
    bse: DVector<f64>,
    ssr: f64,
    nobs: usize,
}

impl OlsFit {
    fn aic(&self) -> f64 {
        let n = self.nobs as f64;
        let llf = -n / 2.0 * ((2.0 * PI).ln() + (self.ssr / n).ln() + 1.0);
        -2.0 * llf + 2.0 * self.params.len() as f64
    }
}

fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> AnalyticsResult<OlsFit> {
    let (nobs, k) = x.shape();
    if nobs <= k {
        return Err(AnalyticsError::insufficient_data(format!(
            "{} rows cannot fit {} regressors",
            nobs, k
        ))
        .with_operation("adf_test"));
    }

    let xt = x.transpose();
    let inv = (&xt * x).try_inverse().ok_or_else(|| {
        AnalyticsError::insufficient_data("regressors are collinear (constant series?)")
            .with_operation("adf_test")
    })?;
    let params = &inv * (&xt * y);
    let ssr = (y - x * &params).norm_squared();
    let sigma2 = ssr / (nobs - k) as f64;
    let bse = inv.diagonal().map(|v| (sigma2 * v).sqrt());

    Ok(OlsFit {
        params,
        bse,
        ssr,
        nobs,
    })
}

#[cfg(test)]
#[path = "stationarity_tests.rs"]
mod stationarity_tests;
