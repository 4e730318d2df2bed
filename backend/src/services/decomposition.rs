//! Additive seasonal decomposition: `observed = trend + seasonal + residual`.
//!
//! The trend is a centred moving average (a 2×m average for even periods).
//! Its undefined ends are filled by a least-squares line through the nearest
//! `period` trend values, so every component is defined at every point.
//! The seasonal component is the per-position mean of the detrended series,
//! centred to sum to zero over one cycle and tiled over the whole series.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::error::{AnalyticsError, AnalyticsResult};
use crate::models::StationTimeSeries;

/// Components of an additive decomposition, aligned with `timestamps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub period: usize,
    pub timestamps: Vec<NaiveDateTime>,
    pub observed: Vec<f64>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
}

impl Decomposition {
    /// One cycle of the seasonal component.
    pub fn seasonal_profile(&self) -> &[f64] {
        &self.seasonal[..self.period.min(self.seasonal.len())]
    }
}

/// Decompose with the period implied by the series granularity.
pub fn decompose(series: &StationTimeSeries) -> AnalyticsResult<Decomposition> {
    let period = series.granularity.seasonal_period().ok_or_else(|| {
        AnalyticsError::invalid_config(format!(
            "granularity {} has no natural seasonal period; pass one explicitly",
            series.granularity
        ))
        .with_operation("decompose")
    })?;
    decompose_with_period(series, period)
}

/// Decompose with an explicit period.
pub fn decompose_with_period(
    series: &StationTimeSeries,
    period: usize,
) -> AnalyticsResult<Decomposition> {
    let tag = |e: AnalyticsError| e.with_operation("decompose").with_station(series.station_id);

    let values = series.complete_values().ok_or_else(|| {
        tag(AnalyticsError::insufficient_data(format!(
            "series has {} missing values",
            series.missing_count()
        )))
    })?;
    if !series.is_contiguous() {
        return Err(tag(AnalyticsError::insufficient_data(
            "series has timestamp gaps",
        )));
    }

    let (trend, seasonal, residual) = additive_decompose(&values, period).map_err(tag)?;

    Ok(Decomposition {
        period,
        timestamps: series.timestamps(),
        observed: values,
        trend,
        seasonal,
        residual,
    })
}

/// `(trend, seasonal, residual)` of `x` for the given period.
pub fn additive_decompose(
    x: &[f64],
    period: usize,
) -> AnalyticsResult<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    if period < 2 {
        return Err(AnalyticsError::invalid_config(format!(
            "seasonal period must be at least 2, got {}",
            period
        )));
    }
    if period > x.len() / 2 {
        return Err(AnalyticsError::insufficient_data(format!(
            "need two full cycles ({} points), got {}",
            period.saturating_mul(2),
            x.len()
        )));
    }

    let mut trend = centred_moving_average(x, period);
    extrapolate_ends(&mut trend, period);
    let trend: Vec<f64> = trend.into_iter().map(|t| t.unwrap_or(f64::NAN)).collect();

    let detrended: Vec<f64> = x.iter().zip(&trend).map(|(v, t)| v - t).collect();

    let mut profile: Vec<f64> = (0..period)
        .map(|pos| {
            let cycle: Vec<f64> = detrended.iter().skip(pos).step_by(period).copied().collect();
            cycle.iter().sum::<f64>() / cycle.len() as f64
        })
        .collect();
    let centre = profile.iter().sum::<f64>() / period as f64;
    profile.iter_mut().for_each(|s| *s -= centre);

    let seasonal: Vec<f64> = (0..x.len()).map(|i| profile[i % period]).collect();
    let residual: Vec<f64> = detrended
        .iter()
        .zip(&seasonal)
        .map(|(d, s)| d - s)
        .collect();

    Ok((trend, seasonal, residual))
}

/// Centred moving average; `None` where the window would overhang.
fn centred_moving_average(x: &[f64], period: usize) -> Vec<Option<f64>> {
    let weights: Vec<f64> = if period % 2 == 0 {
        let mut w = vec![1.0 / period as f64; period + 1];
        w[0] /= 2.0;
        w[period] /= 2.0;
        w
    } else {
        vec![1.0 / period as f64; period]
    };
    let half = weights.len() / 2;

    (0..x.len())
        .map(|i| {
            (i >= half && i + half < x.len()).then(|| {
                weights
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * x[i - half + k])
                    .sum()
            })
        })
        .collect()
}

/// Fill leading and trailing gaps with a line fitted to the nearest
/// `npoints` defined values.
fn extrapolate_ends(trend: &mut [Option<f64>], npoints: usize) {
    let Some(front) = trend.iter().position(Option::is_some) else {
        return;
    };
    let Some(back) = trend.iter().rposition(Option::is_some) else {
        return;
    };

    let front_last = (front + npoints).min(back);
    let (slope, intercept) = fit_line(trend, front, front_last.max(front + 1));
    for (i, t) in trend.iter_mut().enumerate().take(front) {
        *t = Some(slope * i as f64 + intercept);
    }

    // The fit window stops short of `back` itself.
    let back_first = front.max(back.saturating_sub(npoints));
    let (slope, intercept) = fit_line(trend, back_first, back.max(back_first + 1));
    for (i, t) in trend.iter_mut().enumerate().skip(back + 1) {
        *t = Some(slope * i as f64 + intercept);
    }
}

/// Least-squares `(slope, intercept)` through `(i, trend[i])` for `i in from..to`.
/// A single point gives a flat line.
fn fit_line(trend: &[Option<f64>], from: usize, to: usize) -> (f64, f64) {
    let pts: Vec<(f64, f64)> = (from..to)
        .filter_map(|i| trend[i].map(|v| (i as f64, v)))
        .collect();
    let n = pts.len() as f64;
    if pts.len() < 2 {
        return (0.0, pts.first().map(|p| p.1).unwrap_or(0.0));
    }
    let mean_x = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let sxy: f64 = pts.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let sxx: f64 = pts.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let slope = sxy / sxx;
    (slope, mean_y - slope * mean_x)
}

#[cfg(test)]
#[path = "decomposition_tests.rs"]
mod decomposition_tests;
