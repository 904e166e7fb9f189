//! Resource value objects with compile-time unit safety

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Memory size value object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MemorySize(u64); // bytes

impl MemorySize {
    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Create from megabytes
    #[must_use]
    pub const fn from_mb(mb: u64) -> Self {
        Self(mb.saturating_mul(1024).saturating_mul(1024))
    }

    /// Get value in bytes
    #[must_use]
    pub const fn as_bytes(self) -> u64 {
        self.0
    }

    /// Get value in megabytes
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_mb(self) -> f64 {
        self.0 as f64 / (1024.0 * 1024.0)
    }

    /// Get value in gigabytes
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_gb(self) -> f64 {
        self.0 as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const GB: u64 = 1024 * 1024 * 1024;
        const MB: u64 = 1024 * 1024;

        if self.0 >= GB {
            write!(f, "{:.2} GB", self.as_gb())
        } else if self.0 >= MB {
            write!(f, "{:.2} MB", self.as_mb())
        } else {
            write!(f, "{} bytes", self.0)
        }
    }
}

/// Relative CPU weight in the cgroup v2 range `1..=10000`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CpuWeight(u64);

impl CpuWeight {
    /// Smallest accepted weight
    pub const MIN: u64 = 1;
    /// Largest accepted weight
    pub const MAX: u64 = 10_000;
    /// Kernel default weight
    pub const DEFAULT: Self = Self(100);

    /// Create a weight, rejecting values outside `1..=10000`
    ///
    /// # Errors
    /// Returns [`Error::ResourceGroupFailed`] for out of range values
    pub fn new(weight: u64) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&weight) {
            return Err(Error::resource_group(format!(
                "CPU weight must be within {}..={}, got {weight}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(weight))
    }

    /// Raw weight
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Limits requested for the isolated process tree
///
/// Values are kept exactly as supplied and only checked by [`Self::validate`],
/// so out of range input reaches the resource limiter and is rejected there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory ceiling in bytes
    pub memory_max: Option<i64>,
    /// Relative CPU weight
    pub cpu_weight: Option<u64>,
}

impl ResourceLimits {
    /// Memory ceiling applied when none is requested
    pub const DEFAULT_MEMORY: MemorySize = MemorySize::from_mb(512);

    /// Limits without any ceiling
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            memory_max: None,
            cpu_weight: None,
        }
    }

    /// Set the memory ceiling in bytes
    #[must_use]
    pub const fn with_memory_bytes(mut self, bytes: i64) -> Self {
        self.memory_max = Some(bytes);
        self
    }

    /// Set the memory ceiling in megabytes
    #[must_use]
    pub const fn with_memory_mb(self, mb: i64) -> Self {
        self.with_memory_bytes(mb.saturating_mul(1024 * 1024))
    }

    /// Set the CPU weight
    #[must_use]
    pub const fn with_cpu_weight(mut self, weight: u64) -> Self {
        self.cpu_weight = Some(weight);
        self
    }

    /// Check every requested value
    ///
    /// # Errors
    /// Returns [`Error::ResourceGroupFailed`] if the memory ceiling is zero or
    /// negative, or the CPU weight is out of range
    pub fn validate(&self) -> Result<()> {
        self.memory_ceiling()?;
        self.weight()?;
        Ok(())
    }

    /// Validated memory ceiling
    ///
    /// # Errors
    /// Returns [`Error::ResourceGroupFailed`] if the ceiling is not positive
    pub fn memory_ceiling(&self) -> Result<Option<MemorySize>> {
        match self.memory_max {
            None => Ok(None),
            Some(bytes) if bytes <= 0 => Err(Error::resource_group(format!(
                "Memory ceiling must be positive, got {bytes}"
            ))),
            Some(bytes) => Ok(Some(MemorySize::from_bytes(bytes.unsigned_abs()))),
        }
    }

    /// Validated CPU weight
    ///
    /// # Errors
    /// Returns [`Error::ResourceGroupFailed`] if the weight is out of range
    pub fn weight(&self) -> Result<Option<CpuWeight>> {
        self.cpu_weight.map(CpuWeight::new).transpose()
    }
}

impl Default for ResourceLimits {
    #[allow(clippy::cast_possible_wrap)]
    fn default() -> Self {
        Self {
            memory_max: Some(Self::DEFAULT_MEMORY.as_bytes() as i64),
            cpu_weight: None,
        }
    }
}
