//! Walk-forward evaluation of one-step-ahead forecasters.
//!
//! A model is fitted once on the training series, then steps through the
//! test series: it predicts the next point from the most recent window of
//! history, and the TRUE observation is appended before the following step.
//! Scores are RMSE and MAE over all predictions. See
//! [`WALK_FORWARD_PROTOCOL`].

pub mod convnet;
pub mod model;

pub use convnet::{ConvNetFactory, ConvNetForecaster};
pub use model::{Forecaster, ForecasterFactory, PersistenceForecaster};

use log::{debug, info};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{AnalyticsError, AnalyticsResult};
use crate::models::{
    EvaluationResult, EvaluationSummary, ForecastConfig, ForecastConfigParams,
    WALK_FORWARD_PROTOCOL,
};

/// Sliding windows of `width` inputs and the value that follows each.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisedSet {
    inputs: Array2<f64>,
    targets: Array1<f64>,
}

impl SupervisedSet {
    /// One row per target; row `i` holds the `width` points before it.
    pub fn inputs(&self) -> &Array2<f64> {
        &self.inputs
    }

    pub fn targets(&self) -> &Array1<f64> {
        &self.targets
    }

    pub fn width(&self) -> usize {
        self.inputs.ncols()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Reshape a series into `(data[t-n_in..t], data[t])` pairs.
///
/// Positions without a full history are dropped, so the set has
/// `data.len() - n_in` rows (none if the series is not longer than `n_in`).
pub fn series_to_supervised(data: &[f64], n_in: usize) -> SupervisedSet {
    let rows = data.len().saturating_sub(n_in);
    let inputs = Array2::from_shape_fn((rows, n_in), |(r, c)| data[r + c]);
    let targets = Array1::from_iter(data.iter().skip(n_in).copied());
    SupervisedSet { inputs, targets }
}

/// Predictions and final history of one walk-forward run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForward {
    pub predictions: Vec<f64>,
    /// Training series followed by every test value.
    pub history: Vec<f64>,
    pub result: EvaluationResult,
}

/// Which bundled model an evaluation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Convnet,
    Persistence,
}

/// Everything a repeated evaluation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub protocol: String,
    pub model: ModelKind,
    pub config: ForecastConfigParams,
    pub train_len: usize,
    pub test_len: usize,
    pub results: Vec<EvaluationResult>,
    pub summary: EvaluationSummary,
}

impl EvaluationReport {
    pub fn new(
        model: ModelKind,
        config: &ForecastConfig,
        train_len: usize,
        test_len: usize,
        results: Vec<EvaluationResult>,
    ) -> AnalyticsResult<Self> {
        let summary = summarize(&results)?;
        Ok(Self {
            protocol: WALK_FORWARD_PROTOCOL.to_string(),
            model,
            config: config.params(),
            train_len,
            test_len,
            results,
            summary,
        })
    }
}

/// Root mean squared error and mean absolute error; both zero when empty.
pub fn score(actual: &[f64], predicted: &[f64]) -> EvaluationResult {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return EvaluationResult { rmse: 0.0, mae: 0.0 };
    }
    let (sq, abs) = actual
        .iter()
        .zip(predicted)
        .fold((0.0, 0.0), |(sq, abs), (a, p)| {
            let e = a - p;
            (sq + e * e, abs + e.abs())
        });
    EvaluationResult {
        rmse: (sq / n as f64).sqrt(),
        mae: abs / n as f64,
    }
}

/// Fit once on `train`, then predict each `test` point one step ahead,
/// feeding back the true value after every prediction.
pub fn walk_forward<F>(
    train: &[f64],
    test: &[f64],
    config: &ForecastConfig,
    model: &mut F,
) -> AnalyticsResult<WalkForward>
where
    F: Forecaster + ?Sized,
{
    if let Some(pos) = train.iter().chain(test).position(|v| !v.is_finite()) {
        return Err(AnalyticsError::non_finite(format!(
            "input value at position {} is not finite",
            pos
        ))
        .with_operation("walk_forward"));
    }

    let n_in = config.input_width();
    let supervised = series_to_supervised(train, n_in);
    if supervised.is_empty() {
        return Err(AnalyticsError::insufficient_data(format!(
            "training series has {} points, need more than {}",
            train.len(),
            n_in
        ))
        .with_operation("walk_forward"));
    }
    model.fit(&supervised, config)?;

    let mut history = Vec::with_capacity(train.len() + test.len());
    history.extend_from_slice(train);
    let mut predictions = Vec::with_capacity(test.len());

    for &actual in test {
        let window = &history[history.len() - n_in..];
        let yhat = model.predict(window)?;
        if !yhat.is_finite() {
            return Err(AnalyticsError::non_finite(format!(
                "{} predicted {} at test step {}",
                model.name(),
                yhat,
                predictions.len()
            ))
            .with_operation("walk_forward"));
        }
        predictions.push(yhat);
        history.push(actual);
    }

    let result = score(test, &predictions);
    debug!("> RMSE: {:.3} \t MAE: {:.3}", result.rmse, result.mae);
    Ok(WalkForward {
        predictions,
        history,
        result,
    })
}

/// Scores of one walk-forward run.
pub fn evaluate<F>(
    train: &[f64],
    test: &[f64],
    config: &ForecastConfig,
    model: &mut F,
) -> AnalyticsResult<EvaluationResult>
where
    F: Forecaster + ?Sized,
{
    walk_forward(train, test, config, model).map(|wf| wf.result)
}

/// `repeats` independent runs, each with a fresh model from `factory`.
///
/// Results are in run order. The first failing run aborts the whole call.
pub fn repeat_evaluate<M>(
    train: &[f64],
    test: &[f64],
    config: &ForecastConfig,
    repeats: usize,
    factory: &M,
) -> AnalyticsResult<Vec<EvaluationResult>>
where
    M: ForecasterFactory + ?Sized,
{
    repeat_evaluate_with(train, test, config, repeats, factory, |_, _| {})
}

/// [`repeat_evaluate`] calling `on_run(run, result)` after each run.
pub fn repeat_evaluate_with<M, C>(
    train: &[f64],
    test: &[f64],
    config: &ForecastConfig,
    repeats: usize,
    factory: &M,
    mut on_run: C,
) -> AnalyticsResult<Vec<EvaluationResult>>
where
    M: ForecasterFactory + ?Sized,
    C: FnMut(usize, &EvaluationResult),
{
    check_repeats(repeats)?;
    let mut results = Vec::with_capacity(repeats);
    for run in 0..repeats {
        let mut model = factory.create(run);
        let result = evaluate(train, test, config, &mut model)
            .map_err(|e| AnalyticsError::run_failed(run, e))?;
        on_run(run, &result);
        results.push(result);
    }
    info!("Completed {} walk-forward runs", repeats);
    Ok(results)
}

/// [`repeat_evaluate`] with runs spread over the rayon pool.
///
/// Results keep run order; when several runs fail, the lowest run index is
/// reported.
pub fn repeat_evaluate_parallel<M>(
    train: &[f64],
    test: &[f64],
    config: &ForecastConfig,
    repeats: usize,
    factory: &M,
) -> AnalyticsResult<Vec<EvaluationResult>>
where
    M: ForecasterFactory + ?Sized,
{
    check_repeats(repeats)?;
    let outcomes: Vec<AnalyticsResult<EvaluationResult>> = (0..repeats)
        .into_par_iter()
        .map(|run| {
            let mut model = factory.create(run);
            evaluate(train, test, config, &mut model)
                .map_err(|e| AnalyticsError::run_failed(run, e))
        })
        .collect();
    let results = outcomes.into_iter().collect::<AnalyticsResult<Vec<_>>>()?;
    info!("Completed {} walk-forward runs in parallel", repeats);
    Ok(results)
}

fn check_repeats(repeats: usize) -> AnalyticsResult<()> {
    if repeats == 0 {
        return Err(AnalyticsError::invalid_config("repeats must be at least 1")
            .with_operation("repeat_evaluate"));
    }
    Ok(())
}

/// Mean and population standard deviation of RMSE and MAE.
pub fn summarize(results: &[EvaluationResult]) -> AnalyticsResult<EvaluationSummary> {
    if results.is_empty() {
        return Err(AnalyticsError::insufficient_data("no evaluation results to summarize"));
    }
    let (mean_rmse, std_rmse) = mean_std(results.iter().map(|r| r.rmse));
    let (mean_mae, std_mae) = mean_std(results.iter().map(|r| r.mae));
    Ok(EvaluationSummary {
        runs: results.len(),
        mean_rmse,
        std_rmse,
        mean_mae,
        std_mae,
    })
}

fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
#[path = "forecast_tests.rs"]
mod forecast_tests;
