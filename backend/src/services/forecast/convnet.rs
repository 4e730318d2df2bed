//! Small convolutional forecaster.
//!
//! The input window is split into `sequence_length` subsequences of
//! `step_length` points. One shared 1-D convolution (`filter_count` filters of
//! width `kernel_size`, ReLU) runs over every subsequence; the flattened
//! feature maps feed a dense ReLU layer of `node_count` units and a linear
//! output unit. Training minimises MSE with Adam over shuffled mini-batches.
//! Inputs and targets are standardised with the training mean and std.

use log::debug;
use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayViewD, ArrayViewMutD, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::model::{Forecaster, ForecasterFactory};
use super::SupervisedSet;
use crate::models::ForecastConfig;
use crate::services::error::{AnalyticsError, AnalyticsResult};

const LEARNING_RATE: f64 = 1e-3;
const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;

/// Convolution → dense → linear network trained by Adam.
pub struct ConvNetForecaster {
    rng: StdRng,
    state: Option<Trained>,
}

struct Trained {
    shape: Shape,
    weights: Weights,
    mean: f64,
    scale: f64,
}

#[derive(Debug, Clone, Copy)]
struct Shape {
    sequences: usize,
    steps: usize,
    filters: usize,
    kernel: usize,
    hidden: usize,
}

impl Shape {
    fn from_config(config: &ForecastConfig) -> Self {
        Self {
            sequences: config.sequence_length(),
            steps: config.step_length(),
            filters: config.filter_count(),
            kernel: config.kernel_size(),
            hidden: config.node_count(),
        }
    }

    fn conv_len(&self) -> usize {
        self.steps + 1 - self.kernel
    }

    fn flat_len(&self) -> usize {
        self.sequences * self.filters * self.conv_len()
    }

    fn input_width(&self) -> usize {
        self.sequences * self.steps
    }
}

#[derive(Debug, Clone)]
struct Weights {
    conv_w: Array2<f64>,
    conv_b: Array1<f64>,
    dense_w: Array2<f64>,
    dense_b: Array1<f64>,
    out_w: Array1<f64>,
    out_b: Array1<f64>,
}

struct Activations {
    conv_pre: Array3<f64>,
    flat: Array1<f64>,
    hidden_pre: Array1<f64>,
    hidden: Array1<f64>,
    output: f64,
}

impl Weights {
    /// Glorot-uniform weights, zero biases.
    fn init(shape: &Shape, rng: &mut StdRng) -> Self {
        let mut glorot = |rows: usize, cols: usize, fan_in: usize, fan_out: usize| {
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            Array2::from_shape_fn((rows, cols), |_| rng.random_range(-limit..limit))
        };
        let conv_w = glorot(shape.filters, shape.kernel, shape.kernel, shape.kernel * shape.filters);
        let dense_w = glorot(shape.hidden, shape.flat_len(), shape.flat_len(), shape.hidden);
        let out_w = glorot(1, shape.hidden, shape.hidden, 1).row(0).to_owned();
        Self {
            conv_w,
            conv_b: Array1::zeros(shape.filters),
            dense_w,
            dense_b: Array1::zeros(shape.hidden),
            out_w,
            out_b: Array1::zeros(1),
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            conv_w: Array2::zeros(self.conv_w.raw_dim()),
            conv_b: Array1::zeros(self.conv_b.raw_dim()),
            dense_w: Array2::zeros(self.dense_w.raw_dim()),
            dense_b: Array1::zeros(self.dense_b.raw_dim()),
            out_w: Array1::zeros(self.out_w.raw_dim()),
            out_b: Array1::zeros(self.out_b.raw_dim()),
        }
    }

    fn parts(&self) -> [ArrayViewD<'_, f64>; 6] {
        [
            self.conv_w.view().into_dyn(),
            self.conv_b.view().into_dyn(),
            self.dense_w.view().into_dyn(),
            self.dense_b.view().into_dyn(),
            self.out_w.view().into_dyn(),
            self.out_b.view().into_dyn(),
        ]
    }

    fn parts_mut(&mut self) -> [ArrayViewMutD<'_, f64>; 6] {
        [
            self.conv_w.view_mut().into_dyn(),
            self.conv_b.view_mut().into_dyn(),
            self.dense_w.view_mut().into_dyn(),
            self.dense_b.view_mut().into_dyn(),
            self.out_w.view_mut().into_dyn(),
            self.out_b.view_mut().into_dyn(),
        ]
    }

    fn forward(&self, shape: &Shape, x: ArrayView1<'_, f64>) -> Activations {
        let conv_len = shape.conv_len();
        let mut conv_pre = Array3::zeros((shape.sequences, shape.filters, conv_len));
        for seq in 0..shape.sequences {
            for f in 0..shape.filters {
                let kernel = self.conv_w.row(f);
                for l in 0..conv_len {
                    let start = seq * shape.steps + l;
                    let window = x.slice(s![start..start + shape.kernel]);
                    conv_pre[[seq, f, l]] = self.conv_b[f] + kernel.dot(&window);
                }
            }
        }

        let flat: Array1<f64> = conv_pre.iter().map(|v| relu(*v)).collect();
        let hidden_pre = self.dense_w.dot(&flat) + &self.dense_b;
        let hidden = hidden_pre.mapv(relu);
        let output = self.out_w.dot(&hidden) + self.out_b[0];

        Activations {
            conv_pre,
            flat,
            hidden_pre,
            hidden,
            output,
        }
    }

    /// Accumulate the gradient of one sample into `grads`; `d_out` is
    /// ∂loss/∂output.
    fn backward(
        &self,
        shape: &Shape,
        x: ArrayView1<'_, f64>,
        act: &Activations,
        d_out: f64,
        grads: &mut Weights,
    ) {
        grads.out_w.scaled_add(d_out, &act.hidden);
        grads.out_b[0] += d_out;

        let d_hidden = &self.out_w * d_out * act.hidden_pre.mapv(relu_grad);
        let outer = d_hidden
            .view()
            .insert_axis(Axis(1))
            .dot(&act.flat.view().insert_axis(Axis(0)));
        grads.dense_w += &outer;
        grads.dense_b += &d_hidden;

        let d_flat = self.dense_w.t().dot(&d_hidden);
        let conv_len = shape.conv_len();
        for seq in 0..shape.sequences {
            for f in 0..shape.filters {
                for l in 0..conv_len {
                    if act.conv_pre[[seq, f, l]] <= 0.0 {
                        continue;
                    }
                    let g = d_flat[(seq * shape.filters + f) * conv_len + l];
                    grads.conv_b[f] += g;
                    let start = seq * shape.steps + l;
                    for k in 0..shape.kernel {
                        grads.conv_w[[f, k]] += g * x[start + k];
                    }
                }
            }
        }
    }
}

struct Adam {
    m: Weights,
    v: Weights,
    t: i32,
}

impl Adam {
    fn new(like: &Weights) -> Self {
        Self {
            m: like.zeros_like(),
            v: like.zeros_like(),
            t: 0,
        }
    }

    fn step(&mut self, weights: &mut Weights, grads: &Weights) {
        self.t += 1;
        let bias1 = 1.0 - BETA1.powi(self.t);
        let bias2 = 1.0 - BETA2.powi(self.t);
        let params = weights.parts_mut();
        let g = grads.parts();
        let m = self.m.parts_mut();
        let v = self.v.parts_mut();
        for (((p, g), m), v) in params.into_iter().zip(g).zip(m).zip(v) {
            Zip::from(p)
                .and(g)
                .and(m)
                .and(v)
                .for_each(|p, &g, m, v| {
                    *m = BETA1 * *m + (1.0 - BETA1) * g;
                    *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    *p -= LEARNING_RATE * m_hat / (v_hat.sqrt() + EPSILON);
                });
        }
    }
}

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

fn relu_grad(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

impl ConvNetForecaster {
    /// A model seeded from `seed`, or from the OS when `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng, state: None }
    }

    /// Mean training loss (standardised units) after the last epoch, for logging.
    fn epoch_loss(weights: &Weights, shape: &Shape, inputs: &Array2<f64>, targets: &Array1<f64>) -> f64 {
        let total: f64 = inputs
            .outer_iter()
            .zip(targets.iter())
            .map(|(x, t)| (weights.forward(shape, x).output - t).powi(2))
            .sum();
        total / targets.len().max(1) as f64
    }
}

impl Forecaster for ConvNetForecaster {
    fn fit(&mut self, train: &SupervisedSet, config: &ForecastConfig) -> AnalyticsResult<()> {
        let shape = Shape::from_config(config);
        if train.is_empty() {
            return Err(AnalyticsError::insufficient_data("no training pairs"));
        }
        if train.width() != shape.input_width() {
            return Err(AnalyticsError::invalid_config(format!(
                "training windows have {} points, model expects {}",
                train.width(),
                shape.input_width()
            )));
        }

        let all: Vec<f64> = train.targets().iter().chain(train.inputs().iter()).copied().collect();
        let mean = all.iter().sum::<f64>() / all.len() as f64;
        let var = all.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / all.len() as f64;
        let scale = if var.sqrt() > f64::EPSILON { var.sqrt() } else { 1.0 };

        let inputs = train.inputs().mapv(|v| (v - mean) / scale);
        let targets = train.targets().mapv(|v| (v - mean) / scale);

        let mut weights = Weights::init(&shape, &mut self.rng);
        let mut adam = Adam::new(&weights);
        let mut order: Vec<usize> = (0..targets.len()).collect();

        for epoch in 0..config.epoch_count() {
            order.shuffle(&mut self.rng);
            for batch in order.chunks(config.batch_size()) {
                let mut grads = weights.zeros_like();
                let scale_grad = 2.0 / batch.len() as f64;
                for &i in batch {
                    let x = inputs.row(i);
                    let act = weights.forward(&shape, x);
                    let d_out = scale_grad * (act.output - targets[i]);
                    weights.backward(&shape, x, &act, d_out, &mut grads);
                }
                adam.step(&mut weights, &grads);
            }
            if log::log_enabled!(log::Level::Debug) {
                debug!(
                    "convnet epoch {}: loss {:.5}",
                    epoch + 1,
                    Self::epoch_loss(&weights, &shape, &inputs, &targets)
                );
            }
        }

        self.state = Some(Trained {
            shape,
            weights,
            mean,
            scale,
        });
        Ok(())
    }

    fn predict(&self, window: &[f64]) -> AnalyticsResult<f64> {
        let trained = self
            .state
            .as_ref()
            .ok_or_else(|| AnalyticsError::invalid_config("predict called before fit"))?;
        if window.len() != trained.shape.input_width() {
            return Err(AnalyticsError::invalid_config(format!(
                "input window has {} points, model expects {}",
                window.len(),
                trained.shape.input_width()
            )));
        }
        let x: Array1<f64> = window
            .iter()
            .map(|v| (v - trained.mean) / trained.scale)
            .collect();
        let out = trained.weights.forward(&trained.shape, x.view()).output;
        Ok(out * trained.scale + trained.mean)
    }

    fn name(&self) -> &'static str {
        "convnet"
    }
}

/// Seeds run `i` with `seed + i` so repeated runs differ but stay reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvNetFactory {
    pub seed: Option<u64>,
}

impl ConvNetFactory {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }
}

impl ForecasterFactory for ConvNetFactory {
    type Model = ConvNetForecaster;

    fn create(&self, run: usize) -> ConvNetForecaster {
        ConvNetForecaster::new(self.seed.map(|s| s.wrapping_add(run as u64)))
    }
}
