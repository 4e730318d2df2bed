//! Background forecast evaluation.
//!
//! Repeated walk-forward evaluations take seconds to minutes, so the HTTP
//! layer validates a request into an [`EvaluationPlan`], registers a job and
//! spawns [`run_evaluation`]. Progress goes to the job tracker, where clients
//! follow it over SSE; the finished [`EvaluationReport`] becomes the job
//! result.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::error::{AnalyticsError, AnalyticsResult};
use super::forecast::{
    repeat_evaluate_parallel, repeat_evaluate_with, ConvNetFactory, EvaluationReport,
    ForecasterFactory, ModelKind, PersistenceForecaster,
};
use super::job_tracker::{JobTracker, LogLevel};
use crate::config::ForecastSettings;
use crate::db::repository::DataStore;
use crate::db::services as db_services;
use crate::models::{
    EvaluationResult, ForecastConfig, ForecastConfigParams, Granularity, SeriesMetric, StationId,
    StationTimeSeries, TimeRange,
};

/// Job kind recorded in the tracker.
pub const EVALUATION_JOB: &str = "evaluation";

/// What a client asks to evaluate. Unset fields fall back to configured defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub station_id: StationId,
    #[serde(default = "default_metric")]
    pub metric: SeriesMetric,
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    /// Trailing points held out as the test set.
    pub test_size: usize,
    #[serde(default)]
    pub repeats: Option<usize>,
    #[serde(default)]
    pub parallel: Option<bool>,
    #[serde(default)]
    pub model: ModelKind,
    #[serde(default)]
    pub config: Option<ForecastConfigParams>,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_metric() -> SeriesMetric {
    SeriesMetric::NetFlow
}

/// A validated request.
#[derive(Debug, Clone)]
pub struct EvaluationPlan {
    pub station_id: StationId,
    pub metric: SeriesMetric,
    pub granularity: Granularity,
    pub range: Option<TimeRange>,
    pub test_size: usize,
    pub repeats: usize,
    pub parallel: bool,
    pub model: ModelKind,
    pub config: ForecastConfig,
    pub seed: Option<u64>,
}

impl EvaluationRequest {
    /// Validate against `defaults`; every error is an `InvalidConfig`.
    pub fn plan(&self, defaults: &ForecastSettings) -> AnalyticsResult<EvaluationPlan> {
        let config = match self.config {
            Some(params) => ForecastConfig::try_from(params)?,
            None => defaults.model_config()?,
        };
        let repeats = self.repeats.unwrap_or(defaults.repeats);
        if repeats == 0 {
            return Err(AnalyticsError::invalid_config("repeats must be at least 1"));
        }
        let range = match (self.start, self.end) {
            (None, None) => None,
            (start, end) => Some(TimeRange::new(
                start.unwrap_or(NaiveDateTime::MIN),
                end.unwrap_or(NaiveDateTime::MAX),
            )?),
        };

        Ok(EvaluationPlan {
            station_id: self.station_id,
            metric: self.metric,
            granularity: self.granularity,
            range,
            test_size: self.test_size,
            repeats,
            parallel: self.parallel.unwrap_or(defaults.parallel),
            model: self.model,
            config,
            seed: self.seed.or(defaults.seed),
        })
    }
}

/// Split off the trailing `test_size` values. The series must be complete
/// and leave a non-empty training part.
pub fn split_train_test(
    series: &StationTimeSeries,
    test_size: usize,
) -> AnalyticsResult<(Vec<f64>, Vec<f64>)> {
    let mut values = series.complete_values().ok_or_else(|| {
        AnalyticsError::insufficient_data(format!(
            "series has {} missing values",
            series.missing_count()
        ))
    })?;
    if test_size >= values.len() {
        return Err(AnalyticsError::insufficient_data(format!(
            "test_size {} leaves no training data in a series of {} points",
            test_size,
            values.len()
        )));
    }
    let test = values.split_off(values.len() - test_size);
    Ok((values, test))
}

/// Run the plan's repeats on `series`, calling `on_run` after each
/// sequential run.
pub fn evaluate_series<C>(
    plan: &EvaluationPlan,
    series: &StationTimeSeries,
    on_run: C,
) -> AnalyticsResult<EvaluationReport>
where
    C: FnMut(usize, &EvaluationResult),
{
    let (train, test) = split_train_test(series, plan.test_size)?;
    let results = match plan.model {
        ModelKind::Convnet => run_repeats(plan, &train, &test, &ConvNetFactory::new(plan.seed), on_run)?,
        ModelKind::Persistence => run_repeats(
            plan,
            &train,
            &test,
            &|_run: usize| PersistenceForecaster::new(),
            on_run,
        )?,
    };
    EvaluationReport::new(plan.model, &plan.config, train.len(), test.len(), results)
}

fn run_repeats<M, C>(
    plan: &EvaluationPlan,
    train: &[f64],
    test: &[f64],
    factory: &M,
    on_run: C,
) -> AnalyticsResult<Vec<EvaluationResult>>
where
    M: ForecasterFactory,
    C: FnMut(usize, &EvaluationResult),
{
    if plan.parallel {
        repeat_evaluate_parallel(train, test, &plan.config, plan.repeats, factory)
    } else {
        repeat_evaluate_with(train, test, &plan.config, plan.repeats, factory, on_run)
    }
}

/// Evaluate a plan in the background, reporting progress to `tracker`.
///
/// Designed to be spawned as a task. On failure the job is marked failed
/// with the error text, which is also returned.
pub async fn run_evaluation(
    job_id: String,
    tracker: JobTracker,
    repo: Arc<dyn DataStore>,
    plan: EvaluationPlan,
) -> Result<EvaluationReport, String> {
    tracker.log(
        &job_id,
        LogLevel::Info,
        format!(
            "Starting {:?} evaluation for station {} ({} at {}, {} repeats)",
            plan.model, plan.station_id, plan.metric, plan.granularity, plan.repeats
        ),
    );

    // Step 1: build the series
    tracker.log(&job_id, LogLevel::Info, "Extracting series...");
    let series = match db_services::station_series(
        repo.as_ref(),
        plan.station_id,
        plan.metric,
        plan.granularity,
        plan.range,
    )
    .await
    {
        Ok(series) => {
            tracker.log(
                &job_id,
                LogLevel::Success,
                format!("✓ Extracted {} points", series.len()),
            );
            series
        }
        Err(e) => {
            let msg = format!("Failed to extract series: {}", e);
            tracker.fail_job(&job_id, &msg);
            return Err(msg);
        }
    };

    // Step 2: walk-forward runs
    tracker.log(
        &job_id,
        LogLevel::Info,
        format!(
            "Running walk-forward validation (holding out {} points)...",
            plan.test_size
        ),
    );
    let outcome = tokio::task::spawn_blocking({
        let tracker = tracker.clone();
        let job_id = job_id.clone();
        let plan = plan.clone();
        move || {
            evaluate_series(&plan, &series, |run, result| {
                tracker.log(
                    &job_id,
                    LogLevel::Info,
                    format!(
                        "> run {}/{}: RMSE {:.3} \t MAE {:.3}",
                        run + 1,
                        plan.repeats,
                        result.rmse,
                        result.mae
                    ),
                );
            })
        }
    })
    .await;

    let report = match outcome {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            let msg = format!("Evaluation failed: {}", e);
            tracker.fail_job(&job_id, &msg);
            return Err(msg);
        }
        Err(e) => {
            let msg = format!("Evaluation task panic: {}", e);
            tracker.fail_job(&job_id, &msg);
            return Err(msg);
        }
    };

    let summary = report.summary;
    if summary.runs > 1 {
        tracker.log(
            &job_id,
            LogLevel::Info,
            format!(
                "{:?}: {:.3} RMSE (+/- {:.3}), {:.3} MAE (+/- {:.3})",
                report.model, summary.mean_rmse, summary.std_rmse, summary.mean_mae, summary.std_mae
            ),
        );
    }

    match serde_json::to_value(&report) {
        Ok(value) => {
            tracker.log(
                &job_id,
                LogLevel::Success,
                format!("✅ Evaluation complete ({} runs)", summary.runs),
            );
            tracker.complete_job(&job_id, Some(value));
            Ok(report)
        }
        Err(e) => {
            let msg = format!("Failed to serialize report: {}", e);
            tracker.fail_job(&job_id, &msg);
            Err(msg)
        }
    }
}
