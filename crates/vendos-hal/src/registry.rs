//! [`SlotRegistry`] – central driver registry and per-motor I/O router.
//!
//! The registry stores the [`MotorDrive`] and [`SwitchSense`] driver for
//! every populated slot.  The control loop addresses slots by motor id;
//! the registry resolves the driver and applies the call, so the loop never
//! holds a direct driver reference.

use std::collections::HashMap;

use tracing::debug;

use crate::HalError;
use crate::motor::MotorDrive;
use crate::switch::SwitchSense;

/// Central hardware driver registry for one cabinet.
///
/// Construct with [`SlotRegistry::new`], register a motor and switch driver
/// per populated slot, then route I/O through [`energise`][Self::energise],
/// [`de_energise`][Self::de_energise], and [`read_switch`][Self::read_switch].
#[derive(Default)]
pub struct SlotRegistry {
    motors: HashMap<u32, Box<dyn MotorDrive>>,
    switches: HashMap<u32, Box<dyn SwitchSense>>,
}

impl SlotRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a motor driver.  Any previously registered driver for the
    /// same slot is replaced.
    pub fn register_motor(&mut self, motor: Box<dyn MotorDrive>) {
        self.motors.insert(motor.motor_id(), motor);
    }

    /// Register a switch driver.  Any previously registered driver for the
    /// same slot is replaced.
    pub fn register_switch(&mut self, switch: Box<dyn SwitchSense>) {
        self.switches.insert(switch.motor_id(), switch);
    }

    /// Motor ids with both a motor and a switch driver registered, in no
    /// particular order.  Only these slots can run a full dispense cycle.
    pub fn slot_ids(&self) -> Vec<u32> {
        self.motors
            .keys()
            .filter(|id| self.switches.contains_key(id))
            .copied()
            .collect()
    }

    /// Drive the slot's actuator to the energised level.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::NotRegistered`] when no motor driver exists for
    /// `motor_id`, or the underlying driver fault.
    pub fn energise(&mut self, motor_id: u32) -> Result<(), HalError> {
        debug!(motor_id, "energising motor");
        self.set_level(motor_id, true)
    }

    /// Drive the slot's actuator to the de-energised level.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::NotRegistered`] when no motor driver exists for
    /// `motor_id`, or the underlying driver fault.
    pub fn de_energise(&mut self, motor_id: u32) -> Result<(), HalError> {
        debug!(motor_id, "de-energising motor");
        self.set_level(motor_id, false)
    }

    /// Return the most recently commanded level for the slot's motor.
    pub fn motor_level(&self, motor_id: u32) -> Result<bool, HalError> {
        self.motors
            .get(&motor_id)
            .map(|m| m.level())
            .ok_or(HalError::NotRegistered { motor_id })
    }

    /// Read the raw level of the slot's confirmation switch.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::NotRegistered`] when no switch driver exists for
    /// `motor_id`, or the underlying driver fault.
    pub fn read_switch(&self, motor_id: u32) -> Result<bool, HalError> {
        match self.switches.get(&motor_id) {
            Some(sw) => sw.level(),
            None => Err(HalError::NotRegistered { motor_id }),
        }
    }

    fn set_level(&mut self, motor_id: u32, on: bool) -> Result<(), HalError> {
        match self.motors.get_mut(&motor_id) {
            Some(motor) => motor.set_level(on),
            None => Err(HalError::NotRegistered { motor_id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockMotor {
        motor_id: u32,
        level: bool,
    }
    impl MockMotor {
        fn boxed(motor_id: u32) -> Box<Self> {
            Box::new(Self {
                motor_id,
                level: false,
            })
        }
    }
    impl MotorDrive for MockMotor {
        fn motor_id(&self) -> u32 {
            self.motor_id
        }
        fn set_level(&mut self, on: bool) -> Result<(), HalError> {
            self.level = on;
            Ok(())
        }
        fn level(&self) -> bool {
            self.level
        }
    }

    struct MockSwitch {
        motor_id: u32,
        level: bool,
    }
    impl SwitchSense for MockSwitch {
        fn motor_id(&self) -> u32 {
            self.motor_id
        }
        fn level(&self) -> Result<bool, HalError> {
            Ok(self.level)
        }
    }

    #[test]
    fn energise_and_de_energise_set_motor_level() {
        let mut registry = SlotRegistry::new();
        registry.register_motor(MockMotor::boxed(1));

        registry.energise(1).unwrap();
        assert!(registry.motor_level(1).unwrap());

        registry.de_energise(1).unwrap();
        assert!(!registry.motor_level(1).unwrap());
    }

    #[test]
    fn read_switch_returns_driver_level() {
        let mut registry = SlotRegistry::new();
        registry.register_switch(Box::new(MockSwitch {
            motor_id: 2,
            level: true,
        }));
        assert!(registry.read_switch(2).unwrap());
    }

    #[test]
    fn missing_motor_returns_not_registered() {
        let mut registry = SlotRegistry::new();
        let result = registry.energise(9);
        assert!(matches!(
            result,
            Err(HalError::NotRegistered { motor_id: 9 })
        ));
    }

    #[test]
    fn missing_switch_returns_not_registered() {
        let registry = SlotRegistry::new();
        let result = registry.read_switch(9);
        assert!(matches!(result, Err(HalError::NotRegistered { .. })));
    }

    #[test]
    fn slot_ids_requires_both_drivers() {
        let mut registry = SlotRegistry::new();
        registry.register_motor(MockMotor::boxed(1));
        registry.register_motor(MockMotor::boxed(2));
        registry.register_switch(Box::new(MockSwitch {
            motor_id: 2,
            level: false,
        }));

        let ids = registry.slot_ids();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn re_registering_motor_replaces_old_driver() {
        let mut registry = SlotRegistry::new();
        registry.register_motor(MockMotor::boxed(3));
        registry.energise(3).unwrap();
        assert!(registry.motor_level(3).unwrap());

        // Fresh driver for the same slot starts de-energised.
        registry.register_motor(MockMotor::boxed(3));
        assert!(!registry.motor_level(3).unwrap());
    }
}
