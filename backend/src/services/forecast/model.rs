//! Forecaster traits and the persistence baseline.

use super::SupervisedSet;
use crate::models::ForecastConfig;
use crate::services::error::{AnalyticsError, AnalyticsResult};

/// A one-step-ahead model.
///
/// `fit` is called once per walk-forward run on the supervised pairs built
/// from the training series. `predict` receives exactly the last
/// `config.input_width()` points of the history.
pub trait Forecaster: Send {
    fn fit(&mut self, train: &SupervisedSet, config: &ForecastConfig) -> AnalyticsResult<()>;

    fn predict(&self, window: &[f64]) -> AnalyticsResult<f64>;

    fn name(&self) -> &'static str;
}

/// Builds a fresh model for each run of a repeated evaluation.
///
/// Any `Fn(usize) -> M` closure qualifies; the argument is the zero-based
/// run index, handy for deriving per-run seeds.
pub trait ForecasterFactory: Sync {
    type Model: Forecaster;

    fn create(&self, run: usize) -> Self::Model;
}

impl<F, M> ForecasterFactory for F
where
    F: Fn(usize) -> M + Sync,
    M: Forecaster,
{
    type Model = M;

    fn create(&self, run: usize) -> M {
        self(run)
    }
}

/// Predicts the last observed value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistenceForecaster {
    fitted: bool,
}

impl PersistenceForecaster {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Forecaster for PersistenceForecaster {
    fn fit(&mut self, train: &SupervisedSet, _config: &ForecastConfig) -> AnalyticsResult<()> {
        if train.is_empty() {
            return Err(AnalyticsError::insufficient_data("no training pairs"));
        }
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, window: &[f64]) -> AnalyticsResult<f64> {
        if !self.fitted {
            return Err(AnalyticsError::invalid_config("predict called before fit"));
        }
        window
            .last()
            .copied()
            .ok_or_else(|| AnalyticsError::insufficient_data("empty input window"))
    }

    fn name(&self) -> &'static str {
        "persistence"
    }
}
