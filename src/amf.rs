//! # Adaptive Matrix Factorization (AMF)
//!
//! Confidence-weighted SGD for QoS prediction. Each observed entry r_ij is
//! modelled as sigmoid(U_i·S_j + p_i + q_j); every user and service carries a
//! confidence weight that tracks its recent relative error, and the SGD step
//! for an observation is split between the user and the service side in
//! proportion to those weights.

/*
 * File: /src/amf.rs
 * Created Date: Friday, October 16th 2026
 * Author: Zihan
 * -----
 * Last Modified: Saturday, 17th October 2026
 * Modified By: Zihan Wu <wzh4464@gmail.com>
 * -----
 * HISTORY:
 * Date      		By   	Comments
 * ----------		------	---------------------------------------------------------
 * 2026-10-16		Zihan	AMF solver with explicit stopping state machine
 */

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut1, ArrayViewMut2};
use ndarray_rand::rand::seq::SliceRandom;
use ndarray_rand::rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AmfError;
use crate::factors::{AmfFactors, FactorsMut};
use crate::loss::loss;
use crate::matrix;
use crate::numeric::{grad_sigmoid, sigmoid};
use crate::predict::{predict_into, PredictMode};
use crate::samples::{extract_samples, Sample};
use crate::timestamp;

/// Epochs that always run before the convergence threshold may stop the fit
pub const MIN_ITER: usize = 30;

/// Loss value before the first epoch completes
const INITIAL_LOSS: f64 = 1e10;

/// Which confidence weight scales the service-bias gradient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BiasWeighting {
    /// q_j is scaled by the service weight w_j, mirroring the factor updates
    #[default]
    Symmetric,
    /// q_j is scaled by the user weight w_i, the historical AMF update
    UserWeighted,
}

/// What the confidence weights are smoothed toward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfidenceTarget {
    /// Relative error capped to [0, 1]; every weight stays in (0, 1]
    #[default]
    Clamped,
    /// Raw relative error |pred - r| / r, as in the historical AMF update.
    /// Weights may grow above 1 when |pred - r| > r.
    Raw,
}

/// AMF hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmfConfig {
    /// Latent dimension
    pub dim: usize,
    /// L2 regularization
    pub lmda: f64,
    /// Hard epoch budget
    pub max_iter: usize,
    /// Normalized loss at or below which the fit may stop (after `MIN_ITER`)
    pub converge_threshold: f64,
    /// Learning rate
    pub eta: f64,
    /// Confidence smoothing factor
    pub beta: f64,
    /// Log one line per epoch with the current loss
    pub debug_mode: bool,
    pub bias_weighting: BiasWeighting,
    #[serde(default)]
    pub confidence_target: ConfidenceTarget,
}

impl Default for AmfConfig {
    fn default() -> Self {
        Self {
            dim: 10,
            lmda: 0.0001,
            max_iter: 300,
            converge_threshold: 0.006,
            eta: 0.8,
            beta: 0.3,
            debug_mode: false,
            bias_weighting: BiasWeighting::Symmetric,
            confidence_target: ConfidenceTarget::Clamped,
        }
    }
}

impl AmfConfig {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ..Default::default()
        }
    }

    pub fn lmda(mut self, lmda: f64) -> Self {
        self.lmda = lmda;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn converge_threshold(mut self, threshold: f64) -> Self {
        self.converge_threshold = threshold;
        self
    }

    pub fn eta(mut self, eta: f64) -> Self {
        self.eta = eta;
        self
    }

    pub fn beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub fn debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    pub fn bias_weighting(mut self, bias_weighting: BiasWeighting) -> Self {
        self.bias_weighting = bias_weighting;
        self
    }

    pub fn confidence_target(mut self, confidence_target: ConfidenceTarget) -> Self {
        self.confidence_target = confidence_target;
        self
    }

    /// Reject scalars outside the ranges the update rule is defined for
    pub fn validate(&self) -> Result<(), AmfError> {
        if self.dim == 0 {
            return Err(AmfError::InvalidConfig("dim must be >= 1".to_string()));
        }
        if !(self.lmda.is_finite() && self.lmda >= 0.0) {
            return Err(AmfError::InvalidConfig(format!(
                "lmda must be finite and >= 0, got {}",
                self.lmda
            )));
        }
        if !(self.eta.is_finite() && self.eta > 0.0) {
            return Err(AmfError::InvalidConfig(format!(
                "eta must be finite and > 0, got {}",
                self.eta
            )));
        }
        // beta <= 1 keeps 1 - beta * w strictly positive, so weights stay in (0, 1]
        if !(self.beta > 0.0 && self.beta <= 1.0) {
            return Err(AmfError::InvalidConfig(format!(
                "beta must be in (0, 1], got {}",
                self.beta
            )));
        }
        if self.converge_threshold.is_nan() {
            return Err(AmfError::InvalidConfig(
                "converge_threshold must not be NaN".to_string(),
            ));
        }
        Ok(())
    }
}

/// Optimizer state between epochs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitState {
    Running,
    Converged,
    MaxIterReached,
    /// Final full-matrix prediction written
    Done,
}

impl FitState {
    /// State after `epoch` completed epochs with normalized loss `loss`.
    /// Convergence is checked before the epoch budget.
    pub fn after_epoch(epoch: usize, loss: f64, config: &AmfConfig) -> FitState {
        if loss <= config.converge_threshold && epoch >= MIN_ITER {
            FitState::Converged
        } else if epoch >= config.max_iter {
            FitState::MaxIterReached
        } else {
            FitState::Running
        }
    }
}

/// Why a fit stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Converged,
    MaxIterReached,
    /// The training matrix had no observed entry; no epoch ran
    NoSamples,
}

/// Summary of a finished fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub epochs: usize,
    pub num_samples: usize,
    /// Normalized loss after the last epoch
    pub final_loss: Option<f64>,
    pub stop_reason: StopReason,
    pub loss_history: Vec<f64>,
    pub mean_user_confidence: f64,
    pub mean_service_confidence: f64,
    pub duration: Duration,
}

/// Per-user and per-service confidence, each starting at 1.0
#[derive(Debug, Clone)]
struct ConfidenceWeights {
    eu: Array1<f64>,
    es: Array1<f64>,
}

impl ConfidenceWeights {
    fn new(num_user: usize, num_service: usize) -> Self {
        Self {
            eu: Array1::ones(num_user),
            es: Array1::ones(num_service),
        }
    }

    /// (w_i, w_j): the user's and the service's share of the joint confidence
    #[inline]
    fn shares(&self, user: usize, service: usize) -> (f64, f64) {
        let total = self.eu[user] + self.es[service];
        (self.eu[user] / total, self.es[service] / total)
    }

    /// Exponential smoothing toward the fresh relative error. With
    /// `ConfidenceTarget::Clamped` the target is capped to [0, 1], which keeps
    /// every weight inside (0, 1]; `Raw` uses the error as is.
    #[inline]
    fn update(
        &mut self,
        user: usize,
        service: usize,
        shares: (f64, f64),
        error: f64,
        beta: f64,
        mode: ConfidenceTarget,
    ) {
        let target = match mode {
            ConfidenceTarget::Clamped => error.clamp(0.0, 1.0),
            ConfidenceTarget::Raw => error,
        };
        let (wi, wj) = shares;
        self.eu[user] = beta * wi * target + (1.0 - beta * wi) * self.eu[user];
        self.es[service] = beta * wj * target + (1.0 - beta * wj) * self.es[service];
    }

    fn means(&self) -> (f64, f64) {
        (
            self.eu.mean().unwrap_or(1.0),
            self.es.mean().unwrap_or(1.0),
        )
    }
}

/// AMF solver; one instance can fit any number of matrices
#[derive(Debug, Clone)]
pub struct AmfSolver {
    config: AmfConfig,
}

impl AmfSolver {
    pub fn new(config: AmfConfig) -> Result<Self, AmfError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AmfConfig {
        &self.config
    }

    /// Fit `factors` to `observed` in place and write the full prediction
    /// matrix into `prediction`.
    ///
    /// `factors` must already be initialized by the caller. The RNG drives the
    /// per-epoch shuffle only; a seeded RNG makes the fit reproducible.
    pub fn fit<R: Rng + ?Sized>(
        &self,
        observed: ArrayView2<f64>,
        mut factors: FactorsMut,
        mut prediction: ArrayViewMut2<f64>,
        rng: &mut R,
    ) -> Result<FitReport, AmfError> {
        let start = Instant::now();
        let (num_user, num_service) = observed.dim();
        if num_user == 0 || num_service == 0 {
            return Err(AmfError::InvalidConfig(format!(
                "observed matrix must be non-empty, got {}x{}",
                num_user, num_service
            )));
        }
        factors.check_shapes(num_user, num_service)?;
        if factors.u.ncols() != self.config.dim {
            return Err(AmfError::ShapeMismatch {
                what: "U",
                expected: (num_user, self.config.dim),
                actual: factors.u.dim(),
            });
        }
        if prediction.dim() != (num_user, num_service) {
            return Err(AmfError::ShapeMismatch {
                what: "prediction",
                expected: (num_user, num_service),
                actual: prediction.dim(),
            });
        }

        let mut samples = extract_samples(observed);
        let num_samples = samples.len();
        let mut weights = ConfidenceWeights::new(num_user, num_service);

        if samples.is_empty() {
            warn!(
                "No observed entries in {}x{} matrix, skipping optimization",
                num_user, num_service
            );
            predict_into(PredictMode::Full, observed, factors.view(), prediction.view_mut());
            return Ok(FitReport {
                epochs: 0,
                num_samples,
                final_loss: None,
                stop_reason: StopReason::NoSamples,
                loss_history: Vec::new(),
                mean_user_confidence: 1.0,
                mean_service_confidence: 1.0,
                duration: start.elapsed(),
            });
        }

        info!(
            "Starting AMF fit: {}x{} matrix, {} samples, dim = {}",
            num_user, num_service, num_samples, self.config.dim
        );

        let mut epoch = 0;
        let mut loss_value = INITIAL_LOSS;
        let mut loss_history = Vec::new();
        let mut state = FitState::after_epoch(epoch, loss_value, &self.config);
        let mut stop_reason = None;

        loop {
            match state {
                FitState::Running => {}
                FitState::Converged | FitState::MaxIterReached => {
                    predict_into(PredictMode::Full, observed, factors.view(), prediction.view_mut());
                    stop_reason = Some(if state == FitState::Converged {
                        StopReason::Converged
                    } else {
                        StopReason::MaxIterReached
                    });
                    debug!("{:?} -> {:?}", state, FitState::Done);
                    state = FitState::Done;
                    continue;
                }
                FitState::Done => break,
            }

            samples.shuffle(rng);
            for sample in &samples {
                self.step(sample, &mut factors, &mut weights);
            }

            predict_into(
                PredictMode::ObservedOnly,
                observed,
                factors.view(),
                prediction.view_mut(),
            );
            loss_value = loss(
                factors.view(),
                observed,
                prediction.view(),
                self.config.lmda,
            ) / num_samples as f64;
            loss_history.push(loss_value);

            if self.config.debug_mode {
                info!("{}: iter = {}, lossValue = {:.6}", timestamp(), epoch, loss_value);
            } else {
                debug!("iter = {}, lossValue = {:.6}", epoch, loss_value);
            }

            epoch += 1;
            state = FitState::after_epoch(epoch, loss_value, &self.config);
        }

        let stop_reason = stop_reason.unwrap_or(StopReason::MaxIterReached);
        let (mean_user_confidence, mean_service_confidence) = weights.means();
        let duration = start.elapsed();
        info!(
            "AMF fit {:?} after {} epochs ({:?}), loss = {:.6}",
            stop_reason, epoch, duration, loss_value
        );

        Ok(FitReport {
            epochs: epoch,
            num_samples,
            final_loss: (epoch > 0).then_some(loss_value),
            stop_reason,
            loss_history,
            mean_user_confidence,
            mean_service_confidence,
            duration,
        })
    }

    /// Fit owned factors and return a freshly allocated prediction matrix
    pub fn fit_predict<R: Rng + ?Sized>(
        &self,
        observed: ArrayView2<f64>,
        factors: &mut AmfFactors,
        rng: &mut R,
    ) -> Result<(Array2<f64>, FitReport), AmfError> {
        let mut prediction = Array2::zeros(observed.dim());
        let report = self.fit(observed, factors.views_mut(), prediction.view_mut(), rng)?;
        Ok((prediction, report))
    }

    /// One confidence-weighted SGD step on a single observation
    fn step(&self, sample: &Sample, factors: &mut FactorsMut, weights: &mut ConfidenceWeights) {
        let Sample {
            user: i,
            service: j,
            value: r,
        } = *sample;
        let AmfConfig {
            lmda, eta, beta, ..
        } = self.config;

        let qos = factors.view().score(i, j);
        let pred = sigmoid(qos);
        let eij = (pred - r).abs() / r;

        let shares = weights.shares(i, j);
        weights.update(i, j, shares, eij, beta, self.config.confidence_target);
        let (wi, wj) = shares;

        let err = (pred - r) * grad_sigmoid(qos);

        // both gradients use the pre-step values of U_i and S_j
        ndarray::Zip::from(factors.u.row_mut(i))
            .and(factors.s.row_mut(j))
            .for_each(|uk, sk| {
                let grad_u = wi * err * *sk + lmda * *uk;
                let grad_s = wj * err * *uk + lmda * *sk;
                *uk -= eta * grad_u;
                *sk -= eta * grad_s;
            });

        let wq = match self.config.bias_weighting {
            BiasWeighting::Symmetric => wj,
            BiasWeighting::UserWeighted => wi,
        };
        let grad_p = wi * err + lmda * factors.p[i];
        let grad_q = wq * err + lmda * factors.q[j];
        factors.p[i] -= eta * grad_p;
        factors.q[j] -= eta * grad_q;
    }
}

fn flat_mismatch(what: &'static str, rows: usize, cols: usize, len: usize) -> AmfError {
    AmfError::ShapeMismatch {
        what,
        expected: (rows, cols),
        actual: (len, 1),
    }
}

/// Flat-buffer entry point.
///
/// Every buffer is row-major and caller-owned: `observed` and `prediction` are
/// `num_user x num_service`, `u` is `num_user x dim`, `s` is
/// `num_service x dim`, `p` and `q` have one entry per user / service. The
/// factors are updated in place and `prediction` is fully overwritten.
#[allow(clippy::too_many_arguments)]
pub fn fit_flat<R: Rng + ?Sized>(
    observed: &[f64],
    num_user: usize,
    num_service: usize,
    config: &AmfConfig,
    u: &mut [f64],
    s: &mut [f64],
    p: &mut [f64],
    q: &mut [f64],
    prediction: &mut [f64],
    rng: &mut R,
) -> Result<FitReport, AmfError> {
    let solver = AmfSolver::new(config.clone())?;
    let dim = config.dim;

    let (observed_len, u_len, s_len, pred_len) = (observed.len(), u.len(), s.len(), prediction.len());
    let observed = matrix::view(observed, num_user, num_service)
        .ok_or_else(|| flat_mismatch("observed", num_user, num_service, observed_len))?;
    let u = matrix::view_mut(u, num_user, dim)
        .ok_or_else(|| flat_mismatch("U", num_user, dim, u_len))?;
    let s = matrix::view_mut(s, num_service, dim)
        .ok_or_else(|| flat_mismatch("S", num_service, dim, s_len))?;
    let prediction = matrix::view_mut(prediction, num_user, num_service)
        .ok_or_else(|| flat_mismatch("prediction", num_user, num_service, pred_len))?;

    let factors = FactorsMut {
        u,
        s,
        p: ArrayViewMut1::from(p),
        q: ArrayViewMut1::from(q),
    };
    solver.fit(observed, factors, prediction, rng)
}
