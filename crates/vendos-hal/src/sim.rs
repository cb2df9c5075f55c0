//! In-process simulated cabinet for CI and headless testing.
//!
//! [`SimCabinet`] builds a [`SlotRegistry`] populated with stub drivers whose
//! levels live in shared atomic cells.  Each built slot hands back a
//! [`SlotHandle`] so a test (or the demo loop) can flip the switch level and
//! observe the commanded motor level from outside the registry, exactly the
//! way a physical switch and motor sit outside the controller.
//!
//! # Example
//!
//! ```rust
//! use vendos_hal::sim::SimCabinet;
//!
//! let (mut registry, handles) = SimCabinet::new().with_slot(1).build();
//!
//! registry.energise(1).expect("sim motor must succeed");
//! assert!(handles[0].motor_level());
//!
//! handles[0].set_switch(true);
//! assert!(registry.read_switch(1).unwrap());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::HalError;
use crate::motor::MotorDrive;
use crate::registry::SlotRegistry;
use crate::switch::SwitchSense;

// ────────────────────────────────────────────────────────────────────────────
// Stub motor
// ────────────────────────────────────────────────────────────────────────────

/// A simulated dispense motor that records the most recently commanded level
/// in a shared cell.  Always succeeds.
pub struct SimMotor {
    motor_id: u32,
    level: Arc<AtomicBool>,
}

impl SimMotor {
    /// Create a simulated motor whose level is visible through `level`.
    pub fn new(motor_id: u32, level: Arc<AtomicBool>) -> Box<Self> {
        Box::new(Self { motor_id, level })
    }
}

impl MotorDrive for SimMotor {
    fn motor_id(&self) -> u32 {
        self.motor_id
    }

    fn set_level(&mut self, on: bool) -> Result<(), HalError> {
        self.level.store(on, Ordering::Release);
        Ok(())
    }

    fn level(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub switch
// ────────────────────────────────────────────────────────────────────────────

/// A simulated confirmation switch whose raw level is driven from a shared
/// cell.  Always succeeds.
pub struct SimSwitch {
    motor_id: u32,
    level: Arc<AtomicBool>,
}

impl SimSwitch {
    /// Create a simulated switch read from `level`.
    pub fn new(motor_id: u32, level: Arc<AtomicBool>) -> Box<Self> {
        Box::new(Self { motor_id, level })
    }
}

impl SwitchSense for SimSwitch {
    fn motor_id(&self) -> u32 {
        self.motor_id
    }

    fn level(&self) -> Result<bool, HalError> {
        Ok(self.level.load(Ordering::Acquire))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SlotHandle
// ────────────────────────────────────────────────────────────────────────────

/// External side of one simulated slot: drive the switch, watch the motor.
#[derive(Clone)]
pub struct SlotHandle {
    motor_id: u32,
    motor_level: Arc<AtomicBool>,
    switch_level: Arc<AtomicBool>,
}

impl SlotHandle {
    /// The slot this handle controls.
    pub fn motor_id(&self) -> u32 {
        self.motor_id
    }

    /// The level most recently commanded on the slot's motor.
    pub fn motor_level(&self) -> bool {
        self.motor_level.load(Ordering::Acquire)
    }

    /// Set the raw level the slot's switch will report.
    pub fn set_switch(&self, on: bool) {
        self.switch_level.store(on, Ordering::Release);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimCabinet builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder that constructs a [`SlotRegistry`] pre-populated with simulated
/// drivers, one motor/switch pair per requested slot.
#[derive(Default)]
pub struct SimCabinet {
    slots: Vec<u32>,
}

impl SimCabinet {
    /// Create an empty cabinet builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a simulated slot with the given motor id.
    pub fn with_slot(mut self, motor_id: u32) -> Self {
        self.slots.push(motor_id);
        self
    }

    /// Add simulated slots with motor ids `1..=count`.
    pub fn with_slots(mut self, count: u32) -> Self {
        self.slots.extend(1..=count);
        self
    }

    /// Build the registry and the external handles, in slot insertion order.
    pub fn build(self) -> (SlotRegistry, Vec<SlotHandle>) {
        let mut registry = SlotRegistry::new();
        let mut handles = Vec::with_capacity(self.slots.len());
        for motor_id in self.slots {
            let motor_level = Arc::new(AtomicBool::new(false));
            let switch_level = Arc::new(AtomicBool::new(false));
            registry.register_motor(SimMotor::new(motor_id, Arc::clone(&motor_level)));
            registry.register_switch(SimSwitch::new(motor_id, Arc::clone(&switch_level)));
            handles.push(SlotHandle {
                motor_id,
                motor_level,
                switch_level,
            });
        }
        (registry, handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_motor_level_is_visible_through_handle() {
        let (mut registry, handles) = SimCabinet::new().with_slot(1).build();
        assert!(!handles[0].motor_level());

        registry.energise(1).unwrap();
        assert!(handles[0].motor_level());

        registry.de_energise(1).unwrap();
        assert!(!handles[0].motor_level());
    }

    #[test]
    fn sim_switch_follows_handle() {
        let (registry, handles) = SimCabinet::new().with_slot(2).build();
        assert!(!registry.read_switch(2).unwrap());

        handles[0].set_switch(true);
        assert!(registry.read_switch(2).unwrap());
    }

    #[test]
    fn with_slots_builds_sequential_ids() {
        let (registry, handles) = SimCabinet::new().with_slots(3).build();
        let mut ids = registry.slot_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(handles.len(), 3);
        assert_eq!(handles[2].motor_id(), 3);
    }

    #[test]
    fn slots_are_independent() {
        let (mut registry, handles) = SimCabinet::new().with_slots(2).build();
        registry.energise(1).unwrap();
        assert!(handles[0].motor_level());
        assert!(!handles[1].motor_level());
    }
}
