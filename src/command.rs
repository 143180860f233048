// SPDX-License-Identifier: MIT

//! The side-channel command port: a two-register protocol (selector at address 2,
//! argument at address 4) the host uses to reconfigure the emulator without touching the
//! channel registers, plus the one-byte co-processor selector at address 6.
//!
//! Grounded in `tube-client.c`/`tube-ula.c`'s `copro_command_excute` and the `copro`
//! global it mutates.

/// Set co-processor speed. Argument 0 disables throttling.
const CMD_SET_SPEED: u8 = 0;
/// Request a full co-processor reset on next swap.
const CMD_REQUEST_RESET: u8 = 1;

/// Bit smuggled into the co-processor selector to request a full reset on next swap
/// (`copro | 128` in the original).
pub const COPRO_FULL_RESET_BIT: u8 = 1 << 7;

/// State backing the command port and the co-processor selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandPort {
    /// Last command selector latched via a write to address 2.
    command: u8,
    /// Computed throttle: ticks of the host clock per emulated co-processor cycle, or
    /// `None` when throttling is disabled (matches `copro_speed == 0` in the original).
    speed_divisor: Option<u32>,
    /// Active co-processor selector, written via address 6. Bit 7 signals "full reset on
    /// swap" to the outer shell.
    copro: u8,
}

impl CommandPort {
    pub const fn new() -> Self {
        Self {
            command: 0,
            speed_divisor: None,
            copro: 0,
        }
    }

    /// Latch a command selector (host write to address 2).
    pub fn set_command(&mut self, value: u8) {
        self.command = value;
    }

    /// Dispatch the latched command with `arg` (host write to address 4). Returns the
    /// newly computed speed divisor so the caller can log it; `None` means "no change"
    /// either because the command was unrecognized or because it doesn't affect speed.
    pub fn execute(&mut self, arg: u8, arm_speed_hz: u32) -> Option<Option<u32>> {
        match self.command {
            CMD_SET_SPEED => {
                self.speed_divisor = if arg == 0 {
                    None
                } else {
                    Some(arm_speed_hz / (arg as u32 * (1_000_000 / 256)))
                };
                Some(self.speed_divisor)
            }
            CMD_REQUEST_RESET => {
                self.copro |= COPRO_FULL_RESET_BIT;
                None
            }
            _ => None,
        }
    }

    pub const fn speed_divisor(&self) -> Option<u32> {
        self.speed_divisor
    }

    /// Host write to address 6: select the active co-processor.
    pub fn set_copro_selector(&mut self, value: u8) {
        self.copro = value;
    }

    pub const fn copro_selector(&self) -> u8 {
        self.copro
    }

    pub const fn full_reset_requested(&self) -> bool {
        self.copro & COPRO_FULL_RESET_BIT != 0
    }

    /// The outer shell calls this after handling a full-reset request.
    pub fn clear_full_reset_request(&mut self) {
        self.copro &= !COPRO_FULL_RESET_BIT;
    }

    pub fn reset(&mut self) {
        // A soft reset of the ULA does not touch the command port or the active
        // co-processor selector in the original firmware (`tube_reset` never writes
        // `copro` or `copro_command`), so nothing happens here; kept as an explicit
        // no-op entry point for symmetry with the other components' `reset`.
    }
}
