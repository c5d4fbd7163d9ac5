//! Breakpoint threshold policies
//!
//! Each policy maps a sequence of adjacent-sentence distances and a tuning
//! amount to the indices after which a chunk boundary is inserted. A distance
//! only becomes a breakpoint when it is strictly greater than the threshold.

use crate::error::{Result, SemchunkError};
use serde::{Deserialize, Serialize};

/// Policy used to turn a distance sequence into breakpoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "amount", rename_all = "snake_case")]
pub enum BreakpointThreshold {
    /// Cut where distance exceeds the given percentile (0-100)
    Percentile(f64),
    /// Cut where distance exceeds mean + k * standard deviation
    StandardDeviation(f64),
    /// Cut where distance exceeds Q3 + k * IQR
    Interquartile(f64),
    /// Cut where the distance gradient exceeds the given percentile (0-100)
    Gradient(f64),
}

/// Threshold kinds without an amount, used for parsing user input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    Percentile,
    StandardDeviation,
    Interquartile,
    Gradient,
}

impl Default for BreakpointThreshold {
    fn default() -> Self {
        BreakpointThreshold::Percentile(95.0)
    }
}

impl BreakpointThreshold {
    /// Build a policy of the given kind, falling back to its default amount
    pub fn from_kind(kind: ThresholdKind, amount: Option<f64>) -> Self {
        match kind {
            ThresholdKind::Percentile => Self::Percentile(amount.unwrap_or(95.0)),
            ThresholdKind::StandardDeviation => Self::StandardDeviation(amount.unwrap_or(3.0)),
            ThresholdKind::Interquartile => Self::Interquartile(amount.unwrap_or(1.5)),
            ThresholdKind::Gradient => Self::Gradient(amount.unwrap_or(95.0)),
        }
    }

    /// Kind of this policy
    pub fn kind(&self) -> ThresholdKind {
        match self {
            Self::Percentile(_) => ThresholdKind::Percentile,
            Self::StandardDeviation(_) => ThresholdKind::StandardDeviation,
            Self::Interquartile(_) => ThresholdKind::Interquartile,
            Self::Gradient(_) => ThresholdKind::Gradient,
        }
    }

    /// Tuning amount of this policy
    pub fn amount(&self) -> f64 {
        match *self {
            Self::Percentile(p)
            | Self::StandardDeviation(p)
            | Self::Interquartile(p)
            | Self::Gradient(p) => p,
        }
    }

    /// Check that the amount is within the valid range for the policy
    pub fn validate(&self) -> Result<()> {
        let amount = self.amount();
        if !amount.is_finite() {
            return Err(SemchunkError::Config(format!(
                "{:?} amount must be finite, got {}",
                self.kind(),
                amount
            )));
        }

        match self {
            Self::Percentile(p) | Self::Gradient(p) if !(0.0..=100.0).contains(p) => {
                Err(SemchunkError::Config(format!(
                    "percentile must be within [0, 100], got {}",
                    p
                )))
            }
            Self::StandardDeviation(k) | Self::Interquartile(k) if *k < 0.0 => Err(
                SemchunkError::Config(format!("multiplier must be non-negative, got {}", k)),
            ),
            _ => Ok(()),
        }
    }

    /// Threshold value the distances are compared against.
    ///
    /// For [`BreakpointThreshold::Gradient`] the value applies to the gradient
    /// sequence, not the raw distances.
    pub fn threshold(&self, distances: &[f32]) -> Option<f64> {
        if distances.is_empty() {
            return None;
        }
        let values: Vec<f64> = distances.iter().map(|&d| d as f64).collect();

        let value = match *self {
            Self::Percentile(p) => percentile(&values, p),
            Self::StandardDeviation(k) => {
                let (mean, std_dev) = mean_std_dev(&values);
                mean + k * std_dev
            }
            Self::Interquartile(k) => {
                let q1 = percentile(&values, 25.0);
                let q3 = percentile(&values, 75.0);
                q3 + k * (q3 - q1)
            }
            Self::Gradient(p) => percentile(&gradient(&values), p),
        };
        Some(value)
    }

    /// Detect breakpoint indices in a distance sequence.
    ///
    /// Returned indices are strictly increasing and lie within
    /// `[0, distances.len() - 1]`. A constant sequence never yields a
    /// breakpoint.
    pub fn detect(&self, distances: &[f32]) -> Vec<usize> {
        if is_constant(distances) {
            return Vec::new();
        }
        let Some(threshold) = self.threshold(distances) else {
            return Vec::new();
        };

        let values: Vec<f64> = distances.iter().map(|&d| d as f64).collect();
        let values = match self {
            Self::Gradient(_) => gradient(&values),
            _ => values,
        };

        values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > threshold)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Percentile with linear interpolation between closest ranks
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Mean and population standard deviation
fn mean_std_dev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Central differences in the interior, one-sided differences at the edges
fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return values.to_vec();
    }
    (0..n)
        .map(|i| {
            if i == 0 {
                values[1] - values[0]
            } else if i == n - 1 {
                values[n - 1] - values[n - 2]
            } else {
                (values[i + 1] - values[i - 1]) / 2.0
            }
        })
        .collect()
}

fn is_constant(distances: &[f32]) -> bool {
    match distances.first() {
        Some(first) => distances.iter().all(|d| d == first),
        None => true,
    }
}
