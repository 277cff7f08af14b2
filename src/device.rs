//! # Inference Device Selection
//!
//! Picks the compute device (CPU/GPU) for model inference, with fallback to
//! CPU when the requested accelerator is unavailable.

use candle_core::Device;
use tracing::{info, warn};

/// Device preference from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePreference {
    /// Pick the best available device
    Auto,
    /// Force CPU
    Cpu,
    /// CUDA GPU, falling back to CPU if unavailable
    Cuda,
    /// Metal GPU, falling back to CPU if unavailable
    Metal,
}

impl Default for DevicePreference {
    fn default() -> Self {
        DevicePreference::Auto
    }
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "automatic" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" => Ok(DevicePreference::Metal),
            _ => Err(format!("Unknown device preference: {}", s)),
        }
    }
}

/// Resolve a preference into a concrete device.
pub fn select_device(preference: DevicePreference) -> Device {
    match preference {
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Cuda => Device::new_cuda(0).unwrap_or_else(|e| {
            warn!("CUDA requested but unavailable ({}), using CPU", e);
            Device::Cpu
        }),
        DevicePreference::Metal => Device::new_metal(0).unwrap_or_else(|e| {
            warn!("Metal requested but unavailable ({}), using CPU", e);
            Device::Cpu
        }),
        DevicePreference::Auto => {
            if let Ok(device) = Device::new_cuda(0) {
                info!("Using CUDA device for inference");
                return device;
            }
            if let Ok(device) = Device::new_metal(0) {
                info!("Using Metal device for inference");
                return device;
            }
            info!("Using CPU for inference");
            Device::Cpu
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_parsing() {
        assert_eq!("cpu".parse::<DevicePreference>(), Ok(DevicePreference::Cpu));
        assert_eq!("GPU".parse::<DevicePreference>(), Ok(DevicePreference::Cuda));
        assert_eq!(
            "auto".parse::<DevicePreference>(),
            Ok(DevicePreference::Auto)
        );
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_cpu_preference_is_cpu() {
        assert!(matches!(select_device(DevicePreference::Cpu), Device::Cpu));
    }
}
