//! Forecast hyperparameters and evaluation scores.

use serde::{Deserialize, Serialize};

use crate::services::error::{AnalyticsError, AnalyticsResult};

/// Evaluation protocol tag attached to every report.
///
/// Each test point is predicted one step ahead and the TRUE observation (not
/// the prediction) is appended to the history before the next step.
pub const WALK_FORWARD_PROTOCOL: &str = "one_step_ahead_ground_truth_feedback";

/// Upper bound on `sequence_length * step_length`.
pub const MAX_INPUT_WIDTH: usize = 1 << 16;

/// Upper bound on the dense layer's weight count (flattened features times
/// `node_count`).
pub const MAX_DENSE_WEIGHTS: usize = 1 << 24;

/// Model hyperparameters. Validated at construction and immutable afterwards.
///
/// The model input window is `sequence_length` subsequences of `step_length`
/// points each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ForecastConfigParams")]
pub struct ForecastConfig {
    sequence_length: usize,
    step_length: usize,
    filter_count: usize,
    kernel_size: usize,
    node_count: usize,
    epoch_count: usize,
    batch_size: usize,
}

/// Unvalidated hyperparameters, as they arrive from config files and requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastConfigParams {
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,
    #[serde(default = "default_step_length")]
    pub step_length: usize,
    #[serde(default = "default_filter_count")]
    pub filter_count: usize,
    #[serde(default = "default_kernel_size")]
    pub kernel_size: usize,
    #[serde(default = "default_node_count")]
    pub node_count: usize,
    #[serde(default = "default_epoch_count")]
    pub epoch_count: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_sequence_length() -> usize {
    4
}

fn default_step_length() -> usize {
    6
}

fn default_filter_count() -> usize {
    64
}

fn default_kernel_size() -> usize {
    3
}

fn default_node_count() -> usize {
    100
}

fn default_epoch_count() -> usize {
    20
}

fn default_batch_size() -> usize {
    100
}

impl Default for ForecastConfigParams {
    fn default() -> Self {
        Self {
            sequence_length: default_sequence_length(),
            step_length: default_step_length(),
            filter_count: default_filter_count(),
            kernel_size: default_kernel_size(),
            node_count: default_node_count(),
            epoch_count: default_epoch_count(),
            batch_size: default_batch_size(),
        }
    }
}

impl ForecastConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence_length: usize,
        step_length: usize,
        filter_count: usize,
        kernel_size: usize,
        node_count: usize,
        epoch_count: usize,
        batch_size: usize,
    ) -> AnalyticsResult<Self> {
        ForecastConfigParams {
            sequence_length,
            step_length,
            filter_count,
            kernel_size,
            node_count,
            epoch_count,
            batch_size,
        }
        .try_into()
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn step_length(&self) -> usize {
        self.step_length
    }

    pub fn filter_count(&self) -> usize {
        self.filter_count
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn epoch_count(&self) -> usize {
        self.epoch_count
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Points of history the model reads per prediction.
    pub fn input_width(&self) -> usize {
        self.sequence_length * self.step_length
    }

    pub fn params(&self) -> ForecastConfigParams {
        ForecastConfigParams {
            sequence_length: self.sequence_length,
            step_length: self.step_length,
            filter_count: self.filter_count,
            kernel_size: self.kernel_size,
            node_count: self.node_count,
            epoch_count: self.epoch_count,
            batch_size: self.batch_size,
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        let p = ForecastConfigParams::default();
        Self {
            sequence_length: p.sequence_length,
            step_length: p.step_length,
            filter_count: p.filter_count,
            kernel_size: p.kernel_size,
            node_count: p.node_count,
            epoch_count: p.epoch_count,
            batch_size: p.batch_size,
        }
    }
}

impl TryFrom<ForecastConfigParams> for ForecastConfig {
    type Error = AnalyticsError;

    fn try_from(p: ForecastConfigParams) -> Result<Self, Self::Error> {
        let fields = [
            ("sequence_length", p.sequence_length),
            ("step_length", p.step_length),
            ("filter_count", p.filter_count),
            ("kernel_size", p.kernel_size),
            ("node_count", p.node_count),
            ("epoch_count", p.epoch_count),
            ("batch_size", p.batch_size),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| *v == 0) {
            return Err(AnalyticsError::invalid_config(format!(
                "{} must be at least 1",
                name
            )));
        }
        if p.kernel_size > p.step_length {
            return Err(AnalyticsError::invalid_config(format!(
                "kernel_size {} exceeds step_length {}",
                p.kernel_size, p.step_length
            )));
        }
        match p.sequence_length.checked_mul(p.step_length) {
            Some(width) if width <= MAX_INPUT_WIDTH => {}
            _ => {
                return Err(AnalyticsError::invalid_config(format!(
                    "sequence_length * step_length exceeds {}",
                    MAX_INPUT_WIDTH
                )))
            }
        }
        // kernel_size <= step_length, so the conv output length cannot underflow.
        let dense_weights = p
            .sequence_length
            .checked_mul(p.filter_count)
            .and_then(|n| n.checked_mul(p.step_length + 1 - p.kernel_size))
            .and_then(|n| n.checked_mul(p.node_count));
        match dense_weights {
            Some(n) if n <= MAX_DENSE_WEIGHTS => {}
            _ => {
                return Err(AnalyticsError::invalid_config(format!(
                    "dense layer would hold more than {} weights; reduce filter_count or node_count",
                    MAX_DENSE_WEIGHTS
                )))
            }
        }
        Ok(Self {
            sequence_length: p.sequence_length,
            step_length: p.step_length,
            filter_count: p.filter_count,
            kernel_size: p.kernel_size,
            node_count: p.node_count,
            epoch_count: p.epoch_count,
            batch_size: p.batch_size,
        })
    }
}

/// Error scores of one walk-forward run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub rmse: f64,
    pub mae: f64,
}

/// Mean and population standard deviation of repeated runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub runs: usize,
    pub mean_rmse: f64,
    pub std_rmse: f64,
    pub mean_mae: f64,
    pub std_mae: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = ForecastConfig::default();
        assert!(ForecastConfig::try_from(cfg.params()).is_ok());
        assert_eq!(cfg.input_width(), 24);
    }

    #[test]
    fn test_zero_fields_rejected() {
        let err = ForecastConfig::new(1, 2, 1, 1, 1, 0, 1).unwrap_err();
        assert!(err.to_string().contains("epoch_count"));
    }

    #[test]
    fn test_kernel_wider_than_step_rejected() {
        assert!(ForecastConfig::new(2, 2, 4, 3, 8, 1, 1).is_err());
        assert!(ForecastConfig::new(2, 3, 4, 3, 8, 1, 1).is_ok());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ForecastConfig =
            serde_json::from_str(r#"{"sequence_length": 1, "step_length": 2, "kernel_size": 1}"#)
                .unwrap();
        assert_eq!(ok.input_width(), 2);
        assert_eq!(ok.node_count(), 100);

        let bad = serde_json::from_str::<ForecastConfig>(r#"{"step_length": 0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_overflowing_input_width_rejected() {
        let err = ForecastConfig::new(usize::MAX / 2 + 1, 2, 1, 1, 1, 1, 1).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidConfig { .. }));
        assert!(ForecastConfig::new(MAX_INPUT_WIDTH + 1, 1, 1, 1, 1, 1, 1).is_err());
    }

    #[test]
    fn test_oversized_dense_layer_rejected() {
        let err = ForecastConfig::new(4, 6, 64, 3, 1_000_000_000_000, 1, 1).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidConfig { .. }));
        assert!(ForecastConfig::new(4, 6, usize::MAX / 8, 3, 1, 1, 1).is_err());
        // 4 * 64 * 4 * 100 weights for the defaults.
        assert!(ForecastConfig::new(4, 6, 64, 3, 100, 1, 1).is_ok());
    }
}
