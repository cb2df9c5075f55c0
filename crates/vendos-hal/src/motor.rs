//! Generic `MotorDrive` trait for dispense motors, solenoids, and any other
//! discrete on/off actuator that releases product.
//!
//! Drivers implement this trait and register themselves with a
//! [`SlotRegistry`][crate::registry::SlotRegistry].  The control loop only
//! ever talks to the trait, so GPIO, relay-board, and simulated drivers can
//! be swapped without touching the dispense logic.

use crate::HalError;

/// A discrete on/off dispense actuator for one slot.
///
/// The level is latched by the hardware: once set, the actuator holds it
/// regardless of how often (or rarely) the control loop runs.
pub trait MotorDrive: Send + Sync {
    /// The slot this driver actuates.
    fn motor_id(&self) -> u32;

    /// Drive the actuator to `on` (`true` = energised / spinning,
    /// `false` = de-energised / stopped).
    ///
    /// # Errors
    ///
    /// Returns [`HalError::Io`] if the level cannot be applied.
    fn set_level(&mut self, on: bool) -> Result<(), HalError>;

    /// Return the most recently commanded level (`true` = energised).
    fn level(&self) -> bool;
}
