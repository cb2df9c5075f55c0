//! `vendos-kernel` – Dispense-cycle state machines
//!
//! The pure control core of a dispensing controller. It performs no I/O;
//! the runtime feeds it raw switch samples and queue directives, and maps
//! its transitions onto the HAL.
//!
//! # Modules
//!
//! - [`debounce`] – [`Debouncer`][debounce::Debouncer]: turns noisy raw
//!   switch samples into at most one stable
//!   [`SwitchEdge`][debounce::SwitchEdge] per settled transition.
//! - [`dispense`] – [`DispenseBank`][dispense::DispenseBank]: the per-motor
//!   Idle/Running state machine that starts a motor on a directive (or a
//!   manual press), stops it on a stable release, and reports exactly one
//!   completed cycle per dispense.

pub mod debounce;
pub mod dispense;

pub use debounce::{Debouncer, SwitchEdge};
pub use dispense::{CycleEvent, DispenseBank};
