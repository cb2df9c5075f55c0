//! `vendos-hal` – Physical I/O abstraction
//!
//! The only crate that knows how to touch hardware. Everything above it
//! talks to two trait seams and a registry:
//!
//! - [`motor`] – [`MotorDrive`][motor::MotorDrive]: drive a dispense motor
//!   or solenoid to an on/off level.
//! - [`switch`] – [`SwitchSense`][switch::SwitchSense]: read the raw level
//!   of the confirmation microswitch for one slot.
//! - [`registry`] – [`SlotRegistry`][registry::SlotRegistry]: owns the
//!   registered drivers and routes per-motor I/O by motor id.
//! - [`sim`] – simulated drivers and the [`SimCabinet`][sim::SimCabinet]
//!   builder so the full stack runs in headless tests and CI without a
//!   cabinet attached.

pub mod motor;
pub mod registry;
pub mod sim;
pub mod switch;

pub use motor::MotorDrive;
pub use registry::SlotRegistry;
pub use sim::{SimCabinet, SimMotor, SimSwitch, SlotHandle};
pub use switch::SwitchSense;

use thiserror::Error;

/// Errors that can arise from hardware access.
#[derive(Error, Debug)]
pub enum HalError {
    #[error("no driver registered for motor {motor_id}")]
    NotRegistered { motor_id: u32 },
    #[error("I/O fault on motor {motor_id}: {details}")]
    Io { motor_id: u32, details: String },
}
