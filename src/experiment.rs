//! Density-split experiments around the AMF solver.
//!
//! A round hides part of the observed QoS entries, fits AMF on the rest and
//! scores the hidden entries. Rounds are independent: each one owns its
//! buffers and a RNG seeded from `seed + round`, so they can run on the rayon
//! pool without sharing state.

use std::time::{Duration, Instant};

use log::info;
use ndarray::{Array2, ArrayView2};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::seq::SliceRandom;
use ndarray_rand::rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::amf::{AmfConfig, AmfSolver, FitReport};
use crate::error::AmfError;
use crate::factors::AmfFactors;
use crate::matrix::Matrix;
use crate::metrics::{evaluate, Metrics};
use crate::samples::is_observed;
use crate::timestamp;

/// Experiment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub amf: AmfConfig,
    /// Fraction of observed entries kept for training
    pub density: f64,
    pub rounds: usize,
    /// Base seed; `None` draws one from the OS
    pub seed: Option<u64>,
    pub parallel: bool,
    /// Normalized values are mapped into [floor, 1 - floor]
    pub normalize_floor: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            amf: AmfConfig::default(),
            density: 0.1,
            rounds: 10,
            seed: None,
            parallel: true,
            normalize_floor: 0.01,
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), AmfError> {
        self.amf.validate()?;
        if !valid_density(self.density) {
            return Err(AmfError::InvalidDensity(self.density));
        }
        if self.rounds == 0 {
            return Err(AmfError::InvalidConfig("rounds must be >= 1".to_string()));
        }
        if !(self.normalize_floor > 0.0 && self.normalize_floor < 0.5) {
            return Err(AmfError::InvalidConfig(format!(
                "normalize_floor must be in (0, 0.5), got {}",
                self.normalize_floor
            )));
        }
        Ok(())
    }
}

/// Training share must leave something to evaluate on
fn valid_density(density: f64) -> bool {
    density > 0.0 && density < 1.0
}

/// Keep a random `density` share of the observed entries for training.
/// Returns `(train, test)`; every observed entry lands in exactly one of them
/// and `test` keeps at least one entry whenever anything is observed.
pub fn remove_entries<R: Rng + ?Sized>(
    matrix: &Matrix<f64>,
    density: f64,
    rng: &mut R,
) -> Result<(Matrix<f64>, Matrix<f64>), AmfError> {
    if !valid_density(density) {
        return Err(AmfError::InvalidDensity(density));
    }

    let mut observed: Vec<(usize, usize)> = matrix
        .data
        .indexed_iter()
        .filter(|(_, &v)| is_observed(v))
        .map(|(idx, _)| idx)
        .collect();
    observed.shuffle(rng);
    let num_train = ((observed.len() as f64 * density).round() as usize)
        .min(observed.len().saturating_sub(1));

    let mut train = Matrix::zeros(matrix.rows, matrix.cols);
    let mut test = Matrix::zeros(matrix.rows, matrix.cols);
    for (k, &idx) in observed.iter().enumerate() {
        if k < num_train {
            train[idx] = matrix[idx];
        } else {
            test[idx] = matrix[idx];
        }
    }
    Ok((train, test))
}

/// Linear min-max scaling of observed QoS values into [floor, 1 - floor]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub min: f64,
    pub max: f64,
    pub floor: f64,
}

impl Normalizer {
    /// Range of the observed cells of `matrix`; `None` if nothing is observed
    pub fn fit(matrix: ArrayView2<f64>, floor: f64) -> Option<Self> {
        let (min, max) = matrix
            .iter()
            .filter(|&&v| is_observed(v))
            .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        Some(Self { min, max, floor })
    }

    fn span(&self) -> f64 {
        1.0 - 2.0 * self.floor
    }

    pub fn scale(&self, v: f64) -> f64 {
        if self.max > self.min {
            self.floor + self.span() * (v - self.min) / (self.max - self.min)
        } else {
            0.5
        }
    }

    pub fn unscale(&self, v: f64) -> f64 {
        if self.max > self.min {
            self.min + (v - self.floor) / self.span() * (self.max - self.min)
        } else {
            self.min
        }
    }

    /// Scale observed cells; missing cells stay at the 0.0 sentinel
    pub fn transform(&self, matrix: ArrayView2<f64>) -> Array2<f64> {
        matrix.mapv(|v| if is_observed(v) { self.scale(v) } else { 0.0 })
    }

    /// Map a (dense) prediction matrix back to the original value range
    pub fn inverse(&self, matrix: ArrayView2<f64>) -> Array2<f64> {
        matrix.mapv(|v| self.unscale(v))
    }
}

/// Outcome of one round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: usize,
    pub seed: u64,
    pub metrics: Metrics,
    pub report: FitReport,
}

/// Outcome of all rounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub rounds: Vec<RoundResult>,
    pub mean: Metrics,
    pub std_dev: Metrics,
    pub total_duration: Duration,
}

impl ExperimentResult {
    pub fn summary(&self) -> String {
        let mut summary = format!("{} rounds in {:?}", self.rounds.len(), self.total_duration);
        let (mean, std) = (self.mean.to_array(), self.std_dev.to_array());
        for (k, name) in Metrics::NAMES.iter().enumerate() {
            summary.push_str(&format!("\n  {}: {:.4} (+/- {:.4})", name, mean[k], std[k]));
        }
        summary
    }
}

/// Split, normalize, fit and evaluate once
pub fn run_round(
    matrix: &Matrix<f64>,
    config: &ExperimentConfig,
    round: usize,
    seed: u64,
) -> Result<RoundResult, AmfError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (train, test) = remove_entries(matrix, config.density, &mut rng)?;
    let normalizer = Normalizer::fit(train.view(), config.normalize_floor).ok_or_else(|| {
        AmfError::Experiment(format!("round {}: training split is empty", round))
    })?;
    let train = normalizer.transform(train.view());

    let solver = AmfSolver::new(config.amf.clone())?;
    let mut factors = AmfFactors::random(matrix.rows, matrix.cols, config.amf.dim, &mut rng);
    let (prediction, report) = solver.fit_predict(train.view(), &mut factors, &mut rng)?;
    let prediction = normalizer.inverse(prediction.view());

    let metrics = evaluate(test.view(), prediction.view())?;
    info!(
        "[method: AMF] [{}] round {} (density {:.2}): MAE = {:.4}, RMSE = {:.4}, {} epochs",
        timestamp(),
        round,
        config.density,
        metrics.mae,
        metrics.rmse,
        report.epochs
    );
    Ok(RoundResult {
        round,
        seed,
        metrics,
        report,
    })
}

/// Run `config.rounds` independent rounds and aggregate their metrics
pub fn run_experiment(
    matrix: &Matrix<f64>,
    config: &ExperimentConfig,
) -> Result<ExperimentResult, AmfError> {
    config.validate()?;
    let start = Instant::now();
    let base_seed = config
        .seed
        .unwrap_or_else(|| StdRng::from_entropy().gen::<u64>());
    info!(
        "[method: AMF] [{}] {}x{} matrix, density {:.2}, {} rounds, seed {}",
        timestamp(),
        matrix.rows,
        matrix.cols,
        config.density,
        config.rounds,
        base_seed
    );

    let seeds: Vec<(usize, u64)> = (0..config.rounds)
        .map(|round| (round, base_seed.wrapping_add(round as u64)))
        .collect();
    let rounds: Vec<RoundResult> = if config.parallel {
        seeds
            .par_iter()
            .map(|&(round, seed)| run_round(matrix, config, round, seed))
            .collect::<Result<_, _>>()?
    } else {
        seeds
            .iter()
            .map(|&(round, seed)| run_round(matrix, config, round, seed))
            .collect::<Result<_, _>>()?
    };

    let (mean, std_dev) = aggregate(&rounds);
    let result = ExperimentResult {
        rounds,
        mean,
        std_dev,
        total_duration: start.elapsed(),
    };
    info!("[method: AMF] [{}] {}", timestamp(), result.summary());
    Ok(result)
}

/// Per-metric mean and sample standard deviation (0 for a single round)
fn aggregate(rounds: &[RoundResult]) -> (Metrics, Metrics) {
    let mut mean = [0.0; 5];
    let mut std_dev = [0.0; 5];
    for k in 0..5 {
        let values: Vec<f64> = rounds.iter().map(|r| r.metrics.to_array()[k]).collect();
        mean[k] = values.iter().mean();
        if values.len() > 1 {
            std_dev[k] = values.iter().std_dev();
        }
    }
    (Metrics::from_array(mean), Metrics::from_array(std_dev))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_low_rank_qos;
    use ndarray::array;

    #[test]
    fn test_remove_entries_partitions_observed() {
        let mut rng = StdRng::seed_from_u64(4);
        let data = array![[0.5, 0.0, 1.2], [2.0, 0.3, 0.0], [0.0, 0.9, 4.0]];
        let matrix = Matrix::new(data.clone());
        let (train, test) = remove_entries(&matrix, 0.5, &mut rng).unwrap();

        let train_count = train.data.iter().filter(|&&v| is_observed(v)).count();
        let test_count = test.data.iter().filter(|&&v| is_observed(v)).count();
        // 7 observed entries, round(3.5) = 4 kept
        assert_eq!(train_count, 4);
        assert_eq!(test_count, 3);
        for ((i, j), &v) in data.indexed_iter() {
            assert_eq!(train[(i, j)] + test[(i, j)], v);
            assert!(train[(i, j)] == 0.0 || test[(i, j)] == 0.0);
        }
    }

    #[test]
    fn test_remove_entries_rejects_bad_density() {
        let matrix: Matrix<f64> = Matrix::zeros(2, 2);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            remove_entries(&matrix, 0.0, &mut rng).err(),
            Some(AmfError::InvalidDensity(0.0))
        );
        assert!(remove_entries(&matrix, 1.5, &mut rng).is_err());
        assert_eq!(
            remove_entries(&matrix, 1.0, &mut rng).err(),
            Some(AmfError::InvalidDensity(1.0))
        );
    }

    #[test]
    fn test_remove_entries_keeps_a_test_entry() {
        let matrix = Matrix::new(Array2::from_elem((3, 3), 0.4));
        let mut rng = StdRng::seed_from_u64(6);
        // round(9 * 0.99) = 9 would leave nothing to evaluate
        let (train, test) = remove_entries(&matrix, 0.99, &mut rng).unwrap();
        assert_eq!(train.data.iter().filter(|&&v| is_observed(v)).count(), 8);
        assert_eq!(test.data.iter().filter(|&&v| is_observed(v)).count(), 1);
    }

    #[test]
    fn test_full_density_rejected_before_any_round() {
        let mut rng = StdRng::seed_from_u64(10);
        let matrix = Matrix::new(make_low_rank_qos(8, 8, 2, &mut rng));
        let config = ExperimentConfig {
            amf: AmfConfig::new(2).max_iter(35),
            density: 1.0,
            rounds: 2,
            seed: Some(3),
            parallel: false,
            normalize_floor: 0.01,
        };
        assert_eq!(config.validate(), Err(AmfError::InvalidDensity(1.0)));
        assert_eq!(
            run_experiment(&matrix, &config).err(),
            Some(AmfError::InvalidDensity(1.0))
        );

        let dense = ExperimentConfig {
            density: 0.99,
            ..config
        };
        let result = run_experiment(&matrix, &dense).unwrap();
        assert_eq!(result.rounds.len(), 2);
    }

    #[test]
    fn test_normalizer_round_trip() {
        let data = array![[2.0, 0.0], [4.0, 10.0]];
        let norm = Normalizer::fit(data.view(), 0.05).unwrap();
        assert_eq!((norm.min, norm.max), (2.0, 10.0));
        let scaled = norm.transform(data.view());
        assert!((scaled[(0, 0)] - 0.05).abs() < 1e-12);
        assert!((scaled[(1, 1)] - 0.95).abs() < 1e-12);
        assert_eq!(scaled[(0, 1)], 0.0);
        assert!((norm.unscale(scaled[(1, 0)]) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalizer_degenerate_range() {
        let data = array![[3.0, 3.0]];
        let norm = Normalizer::fit(data.view(), 0.01).unwrap();
        assert_eq!(norm.scale(3.0), 0.5);
        assert_eq!(norm.unscale(0.7), 3.0);
        assert!(Normalizer::fit(array![[0.0]].view(), 0.01).is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(ExperimentConfig::default().validate().is_ok());
        let bad_density = ExperimentConfig {
            density: 0.0,
            ..Default::default()
        };
        assert_eq!(bad_density.validate(), Err(AmfError::InvalidDensity(0.0)));
        let no_rounds = ExperimentConfig {
            rounds: 0,
            ..Default::default()
        };
        assert!(no_rounds.validate().is_err());
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let mut rng = StdRng::seed_from_u64(8);
        let matrix = Matrix::new(make_low_rank_qos(12, 10, 2, &mut rng));
        let config = ExperimentConfig {
            amf: AmfConfig::new(2).max_iter(40).eta(0.3),
            density: 0.6,
            rounds: 3,
            seed: Some(100),
            parallel: true,
            normalize_floor: 0.01,
        };
        let parallel = run_experiment(&matrix, &config).unwrap();
        let sequential = run_experiment(
            &matrix,
            &ExperimentConfig {
                parallel: false,
                ..config.clone()
            },
        )
        .unwrap();

        assert_eq!(parallel.rounds.len(), 3);
        for (a, b) in parallel.rounds.iter().zip(&sequential.rounds) {
            assert_eq!(a.seed, b.seed);
            assert_eq!(a.metrics, b.metrics);
        }
        assert_eq!(parallel.mean, sequential.mean);
        assert!(parallel.summary().contains("NPRE"));
    }

    #[test]
    fn test_single_round_has_zero_spread() {
        let mut rng = StdRng::seed_from_u64(9);
        let matrix = Matrix::new(make_low_rank_qos(8, 8, 2, &mut rng));
        let config = ExperimentConfig {
            amf: AmfConfig::new(2).max_iter(35),
            density: 0.5,
            rounds: 1,
            seed: Some(1),
            parallel: false,
            normalize_floor: 0.01,
        };
        let result = run_experiment(&matrix, &config).unwrap();
        assert_eq!(result.std_dev.to_array(), [0.0; 5]);
        assert_eq!(result.mean, result.rounds[0].metrics);
    }
}
