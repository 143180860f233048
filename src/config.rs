// SPDX-License-Identifier: MIT

//! Configuration surface for the quantities the original firmware hardcoded: the host
//! clock speed used by the co-processor speed command, and the reset debounce window.

use core::fmt;

/// Tunable quantities a [`crate::TubeUla`] needs but the wire protocol does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TubeConfig {
    /// Host (ARM) clock speed in Hz, used to convert a co-processor speed-command
    /// argument into a throttle divisor. The original firmware hardcoded this to
    /// 133 MHz (`arm_speed = 133` in `tube-client.c`, expressed there in MHz).
    pub arm_speed_hz: u32,
    /// Number of consecutive inactive samples [`crate::debounce::ResetDebounce`] requires
    /// before treating nRST as released. The original busy-waited for 10,000 iterations
    /// of a tight polling loop (`DEBOUNCE_TIME` in `tube-ula.c`); this is the same count,
    /// reinterpreted as "samples" since this crate does not own the polling loop.
    pub debounce_samples: u32,
}

impl TubeConfig {
    /// Reproduces the original firmware's constants.
    pub const fn original_defaults() -> Self {
        Self {
            arm_speed_hz: 133_000_000,
            debounce_samples: 10_000,
        }
    }

    /// Validate the configuration, catching the one constructor-time mistake this crate
    /// can detect: an `arm_speed_hz` of zero would make the speed-command division
    /// meaningless (every nonzero argument would throttle to 0 Hz).
    pub fn validate(self) -> Result<Self, TubeError> {
        if self.arm_speed_hz == 0 {
            return Err(TubeError::ZeroClockSpeed);
        }
        Ok(self)
    }
}

impl Default for TubeConfig {
    fn default() -> Self {
        Self::original_defaults()
    }
}

/// Programmer-facing misconfiguration this crate can detect at construction time.
///
/// The Tube ULA wire protocol itself has no recoverable error conditions (every bit
/// pattern maps to a defined effect); this type exists purely for embedder ergonomics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TubeError {
    /// [`TubeConfig::arm_speed_hz`] was zero.
    ZeroClockSpeed,
}

impl fmt::Display for TubeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TubeError::ZeroClockSpeed => {
                write!(f, "TubeConfig::arm_speed_hz must be nonzero")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TubeError {}
