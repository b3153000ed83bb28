//! Accuracy metrics for QoS prediction.
//!
//! - MAE: mean absolute error
//! - NMAE: MAE divided by the mean of the true values
//! - RMSE: root mean squared error
//! - MRE: median of |pred - r| / r
//! - NPRE: 90th percentile of |pred - r| / r

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};

use crate::error::AmfError;
use crate::samples::is_observed;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mae: f64,
    pub nmae: f64,
    pub rmse: f64,
    pub mre: f64,
    pub npre: f64,
}

impl Metrics {
    pub const NAMES: [&'static str; 5] = ["MAE", "NMAE", "RMSE", "MRE", "NPRE"];

    pub fn to_array(&self) -> [f64; 5] {
        [self.mae, self.nmae, self.rmse, self.mre, self.npre]
    }

    pub fn from_array(values: [f64; 5]) -> Self {
        Self {
            mae: values[0],
            nmae: values[1],
            rmse: values[2],
            mre: values[3],
            npre: values[4],
        }
    }
}

/// Score `predicted` against every observed cell of `test`.
pub fn evaluate(test: ArrayView2<f64>, predicted: ArrayView2<f64>) -> Result<Metrics, AmfError> {
    if test.dim() != predicted.dim() {
        return Err(AmfError::ShapeMismatch {
            what: "predicted",
            expected: test.dim(),
            actual: predicted.dim(),
        });
    }

    let pairs: Vec<(f64, f64)> = test
        .iter()
        .zip(predicted.iter())
        .filter(|(&r, _)| is_observed(r))
        .map(|(&r, &pred)| (r, pred))
        .collect();
    if pairs.is_empty() {
        return Err(AmfError::EmptyEvaluation);
    }

    let n = pairs.len() as f64;
    let abs_sum: f64 = pairs.iter().map(|(r, pred)| (pred - r).abs()).sum();
    let sq_sum: f64 = pairs.iter().map(|(r, pred)| (pred - r).powi(2)).sum();
    let true_mean = pairs.iter().map(|(r, _)| r).sum::<f64>() / n;

    let mae = abs_sum / n;
    let relative: Vec<f64> = pairs
        .iter()
        .map(|(r, pred)| (pred - r).abs() / r)
        .collect();
    let mut relative = Data::new(relative);

    Ok(Metrics {
        mae,
        nmae: mae / true_mean,
        rmse: (sq_sum / n).sqrt(),
        mre: relative.quantile(0.5),
        npre: relative.percentile(90),
    })
}
