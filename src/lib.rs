// SPDX-License-Identifier: MIT

//! Protocol core for the Acorn Tube ULA: an 8-byte host-visible register file, four
//! asymmetric host/parasite FIFO channels, and the interrupt/configuration word derived
//! from them.
//!
//! This crate owns none of the bus wiring, interrupt controller, or co-processor CPU
//! emulation around it — it is the part of a Tube emulator that is pure state-machine
//! logic, meant to be driven by a bus front-end calling [`TubeUla::bus_event`] (or the
//! finer-grained [`TubeUla::host_read`]/[`TubeUla::host_write`]) on the host side and
//! [`TubeUla::parasite_read`]/[`TubeUla::parasite_write`] on the parasite side.
//!
//! No dynamic allocation, no blocking, no panics on any reachable input: every register
//! offset and command byte has a defined effect.
#![no_std]

#[cfg(any(feature = "std", test))]
extern crate std;

mod command;
mod config;
mod control;
mod debounce;
mod irq;
mod regfile;
mod ring;
mod tube;

pub use command::{CommandPort, COPRO_FULL_RESET_BIT};
pub use config::{TubeConfig, TubeError};
pub use debounce::ResetDebounce;
pub use irq::{CriticalSection, IrqFlags, NullCriticalSection, NullGuard};
pub use regfile::{CapturingSink, RegisterSink, DISABLED_FILL, REGISTER_COUNT};
pub use ring::{Ring24, CAPACITY as R1_FIFO_DEPTH};
pub use tube::TubeUla;
