use super::*;
use std::sync::Mutex;

fn tiny_config() -> ForecastConfig {
    // sequence_length 1, step_length 2: two points of history per prediction.
    ForecastConfig::new(1, 2, 2, 1, 4, 2, 4).unwrap()
}

fn small_convnet_config() -> ForecastConfig {
    ForecastConfig::new(2, 3, 4, 2, 8, 5, 4).unwrap()
}

fn seasonal(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 10.0 + 3.0 * ((i % 6) as f64) - 0.1 * (i / 6) as f64)
        .collect()
}

/// Records every window it is asked to predict from.
#[derive(Default)]
struct Recorder {
    windows: Mutex<Vec<Vec<f64>>>,
    fitted_rows: usize,
}

impl Forecaster for Recorder {
    fn fit(&mut self, train: &SupervisedSet, _config: &ForecastConfig) -> AnalyticsResult<()> {
        self.fitted_rows = train.len();
        Ok(())
    }

    fn predict(&self, window: &[f64]) -> AnalyticsResult<f64> {
        self.windows.lock().unwrap().push(window.to_vec());
        Ok(0.0)
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Fails to fit on a chosen run.
struct FailOn {
    fail: bool,
}

impl Forecaster for FailOn {
    fn fit(&mut self, _train: &SupervisedSet, _config: &ForecastConfig) -> AnalyticsResult<()> {
        if self.fail {
            Err(AnalyticsError::insufficient_data("planned failure"))
        } else {
            Ok(())
        }
    }

    fn predict(&self, window: &[f64]) -> AnalyticsResult<f64> {
        Ok(window[window.len() - 1])
    }

    fn name(&self) -> &'static str {
        "fail_on"
    }
}

#[test]
fn test_series_to_supervised_drops_incomplete_windows() {
    let set = series_to_supervised(&[1.0, 2.0, 3.0, 4.0, 5.0], 2);
    assert_eq!(set.len(), 3);
    assert_eq!(set.width(), 2);
    assert_eq!(set.inputs().row(0).to_vec(), vec![1.0, 2.0]);
    assert_eq!(set.targets().to_vec(), vec![3.0, 4.0, 5.0]);

    assert!(series_to_supervised(&[1.0, 2.0], 2).is_empty());
}

#[test]
fn test_walk_forward_feeds_back_true_values() {
    let train: Vec<f64> = (1..=10).map(f64::from).collect();
    let test = [11.0, 12.0];
    let mut model = Recorder::default();

    let wf = walk_forward(&train, &test, &tiny_config(), &mut model).unwrap();
    assert_eq!(wf.predictions.len(), 2);
    assert_eq!(wf.history.len(), 12);
    assert_eq!(wf.history[10..], [11.0, 12.0]);
    assert_eq!(model.fitted_rows, 8);

    let windows = model.windows.lock().unwrap();
    assert_eq!(windows[0], vec![9.0, 10.0]);
    // The second window ends with the true 11, not the prediction 0.
    assert_eq!(windows[1], vec![10.0, 11.0]);
}

#[test]
fn test_persistence_scores() {
    let train: Vec<f64> = (1..=10).map(f64::from).collect();
    let mut model = PersistenceForecaster::new();
    let wf = walk_forward(&train, &[11.0, 12.0], &tiny_config(), &mut model).unwrap();
    assert_eq!(wf.predictions, vec![10.0, 11.0]);
    assert!((wf.result.rmse - 1.0).abs() < 1e-12);
    assert!((wf.result.mae - 1.0).abs() < 1e-12);
}

#[test]
fn test_empty_test_scores_zero() {
    let train: Vec<f64> = (1..=10).map(f64::from).collect();
    let mut model = PersistenceForecaster::new();
    let wf = walk_forward(&train, &[], &tiny_config(), &mut model).unwrap();
    assert!(wf.predictions.is_empty());
    assert_eq!(wf.history.len(), 10);
    assert_eq!(wf.result, EvaluationResult { rmse: 0.0, mae: 0.0 });
}

#[test]
fn test_short_train_rejected() {
    let mut model = PersistenceForecaster::new();
    let err = walk_forward(&[1.0, 2.0], &[3.0], &tiny_config(), &mut model).unwrap_err();
    assert!(matches!(err, AnalyticsError::InsufficientData { .. }));
}

#[test]
fn test_non_finite_input_rejected() {
    let mut model = PersistenceForecaster::new();
    let train = [1.0, 2.0, f64::NAN, 4.0];
    let err = walk_forward(&train, &[5.0], &tiny_config(), &mut model).unwrap_err();
    assert!(matches!(err, AnalyticsError::NonFinite { .. }));
}

#[test]
fn test_repeat_evaluate_returns_every_run_in_order() {
    let train = seasonal(40);
    let test = seasonal(46)[40..].to_vec();
    let results = repeat_evaluate(&train, &test, &tiny_config(), 5, &|_run: usize| {
        PersistenceForecaster::new()
    })
    .unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_repeat_evaluate_reports_failing_run() {
    let train = seasonal(20);
    let factory = |run: usize| FailOn { fail: run >= 2 };

    let err = repeat_evaluate(&train, &[1.0], &tiny_config(), 4, &factory).unwrap_err();
    match err {
        AnalyticsError::RunFailed { run, source } => {
            assert_eq!(run, 2);
            assert!(matches!(*source, AnalyticsError::InsufficientData { .. }));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let err = repeat_evaluate_parallel(&train, &[1.0], &tiny_config(), 4, &factory).unwrap_err();
    assert!(matches!(err, AnalyticsError::RunFailed { run: 2, .. }));
}

#[test]
fn test_zero_repeats_rejected() {
    let factory = |_: usize| PersistenceForecaster::new();
    let err = repeat_evaluate(&[1.0; 10], &[1.0], &tiny_config(), 0, &factory).unwrap_err();
    assert!(matches!(err, AnalyticsError::InvalidConfig { .. }));
}

#[test]
fn test_on_run_sees_each_result() {
    let factory = |_: usize| PersistenceForecaster::new();
    let mut seen = Vec::new();
    repeat_evaluate_with(&seasonal(20), &[1.0, 2.0], &tiny_config(), 3, &factory, |run, _| {
        seen.push(run)
    })
    .unwrap();
    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn test_parallel_matches_sequential_for_seeded_convnet() {
    let train = seasonal(60);
    let test = seasonal(66)[60..].to_vec();
    let config = small_convnet_config();
    let factory = ConvNetFactory::new(Some(7));

    let sequential = repeat_evaluate(&train, &test, &config, 3, &factory).unwrap();
    let parallel = repeat_evaluate_parallel(&train, &test, &config, 3, &factory).unwrap();
    assert_eq!(sequential, parallel);
}

#[test]
fn test_convnet_is_reproducible_and_finite() {
    let train = seasonal(60);
    let test = seasonal(66)[60..].to_vec();
    let config = small_convnet_config();

    let mut a = ConvNetForecaster::new(Some(42));
    let mut b = ConvNetForecaster::new(Some(42));
    let wa = walk_forward(&train, &test, &config, &mut a).unwrap();
    let wb = walk_forward(&train, &test, &config, &mut b).unwrap();
    assert_eq!(wa.predictions, wb.predictions);
    assert!(wa.predictions.iter().all(|p| p.is_finite()));
    assert_eq!(wa.history.len(), 66);
}

#[test]
fn test_convnet_rejects_predict_before_fit() {
    let model = ConvNetForecaster::new(Some(1));
    assert!(model.predict(&[1.0; 6]).is_err());
}

#[test]
fn test_summarize_uses_population_std() {
    let results = [
        EvaluationResult { rmse: 1.0, mae: 2.0 },
        EvaluationResult { rmse: 3.0, mae: 2.0 },
    ];
    let summary = summarize(&results).unwrap();
    assert_eq!(summary.runs, 2);
    assert_eq!(summary.mean_rmse, 2.0);
    assert_eq!(summary.std_rmse, 1.0);
    assert_eq!(summary.std_mae, 0.0);
    assert!(summarize(&[]).is_err());
}

#[test]
fn test_report_carries_protocol() {
    let results = vec![EvaluationResult { rmse: 1.0, mae: 0.5 }];
    let report =
        EvaluationReport::new(ModelKind::Persistence, &tiny_config(), 10, 2, results).unwrap();
    assert_eq!(report.protocol, WALK_FORWARD_PROTOCOL);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["protocol"], "one_step_ahead_ground_truth_feedback");
    assert_eq!(json["model"], "persistence");
}
