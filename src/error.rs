/*
 * File: /src/error.rs
 * Created Date: Friday, October 16th 2026
 * Author: Zihan
 * -----
 * Last Modified: Friday, 16th October 2026
 * Modified By: Zihan Wu <wzh4464@gmail.com>
 * -----
 * HISTORY:
 * Date      		By   	Comments
 * ----------		------	---------------------------------------------------------
 * 2026-10-16		Zihan	Error type for the AMF solver and experiment helpers
 */

use std::error::Error;
use std::fmt;

/// Errors that can occur while fitting or evaluating an AMF model
#[derive(Debug, Clone, PartialEq)]
pub enum AmfError {
    /// A configuration scalar is out of its valid range
    InvalidConfig(String),
    /// A buffer or array does not have the shape implied by the dimensions
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// Training density outside (0, 1)
    InvalidDensity(f64),
    /// No entry qualifies for evaluation
    EmptyEvaluation,
    /// A multi-round experiment failed
    Experiment(String),
}

impl fmt::Display for AmfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AmfError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            AmfError::ShapeMismatch {
                what,
                expected,
                actual,
            } => write!(
                f,
                "Shape mismatch for {}: expected {}x{}, got {}x{}",
                what, expected.0, expected.1, actual.0, actual.1
            ),
            AmfError::InvalidDensity(d) => {
                write!(f, "Invalid density {} (must be in (0, 1))", d)
            }
            AmfError::EmptyEvaluation => write!(f, "No entries available for evaluation"),
            AmfError::Experiment(msg) => write!(f, "Experiment error: {}", msg),
        }
    }
}

impl Error for AmfError {}

impl From<String> for AmfError {
    fn from(msg: String) -> Self {
        AmfError::Experiment(msg)
    }
}
