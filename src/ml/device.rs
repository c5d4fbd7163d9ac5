//! Compute device selection for local inference
//!
//! CUDA and Metal are only usable when the matching cargo feature is enabled;
//! otherwise candle reports them as unavailable and CPU is used.

use crate::error::{Result, SemchunkError};
use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device types supported for ML inference
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// CPU inference
    #[default]
    Cpu,
    /// CUDA GPU inference
    Cuda(usize),
    /// Metal GPU inference (macOS)
    Metal,
}

impl DeviceType {
    /// Pick the best device compiled into this build
    pub fn best_available() -> Self {
        if candle_core::utils::cuda_is_available() {
            DeviceType::Cuda(0)
        } else if candle_core::utils::metal_is_available() {
            DeviceType::Metal
        } else {
            DeviceType::Cpu
        }
    }

    /// Create the candle device
    pub fn to_device(self) -> Result<Device> {
        let device = match self {
            DeviceType::Cpu => Device::Cpu,
            DeviceType::Cuda(ordinal) => Device::new_cuda(ordinal).map_err(|e| {
                SemchunkError::MachineLearning(format!("CUDA device {} unavailable: {}", ordinal, e))
            })?,
            DeviceType::Metal => Device::new_metal(0).map_err(|e| {
                SemchunkError::MachineLearning(format!("Metal device unavailable: {}", e))
            })?,
        };
        log::debug!("Created device {}", self);
        Ok(device)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Cpu => write!(f, "cpu"),
            DeviceType::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
            DeviceType::Metal => write!(f, "metal"),
        }
    }
}

impl FromStr for DeviceType {
    type Err = SemchunkError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "cpu" => Ok(DeviceType::Cpu),
            "metal" | "mps" => Ok(DeviceType::Metal),
            "cuda" | "gpu" => Ok(DeviceType::Cuda(0)),
            "auto" => Ok(DeviceType::best_available()),
            other => match other.strip_prefix("cuda:") {
                Some(ordinal) => ordinal.parse().map(DeviceType::Cuda).map_err(|_| {
                    SemchunkError::Config(format!("Invalid CUDA ordinal: {}", ordinal))
                }),
                None => Err(SemchunkError::Config(format!("Unknown device: {}", other))),
            },
        }
    }
}
