/**
 * File: /src/lib.rs
 * Created Date: Monday, January 22nd 2024
 * Author: Zihan
 * -----
 * Last Modified: Saturday, 17th October 2026 10:21:07 am
 * Modified By: the developer formerly known as Zihan at <wzh4464@gmail.com>
 * -----
 * HISTORY:
 * Date      		By   	Comments
 * ----------		------	---------------------------------------------------------
 * 2026-10-16		Zihan	Switched the crate over to AMF QoS prediction
 */
pub mod amf;
pub mod error;
pub mod experiment;
pub mod factors;
pub mod loss;
pub mod matrix;
pub mod metrics;
pub mod numeric;
pub mod predict;
pub mod samples;

#[cfg(test)]
pub(crate) mod test_utils;

use chrono::Local;

pub use amf::{fit_flat, AmfConfig, AmfSolver, BiasWeighting, ConfidenceTarget, FitReport, FitState, StopReason};
pub use error::AmfError;
pub use experiment::{run_experiment, ExperimentConfig, ExperimentResult};
pub use factors::AmfFactors;
pub use matrix::Matrix;
pub use metrics::Metrics;
pub use predict::PredictMode;

/// Local wall-clock time for log lines, e.g. `2026-10-17 10:21:07`
pub(crate) fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
