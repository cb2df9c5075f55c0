//! Generic `SwitchSense` trait for the confirmation microswitch of one slot.
//!
//! The raw level returned here is electrically noisy around transitions;
//! consumers must run it through a debounce filter before acting on it.

use crate::HalError;

/// Raw digital input for one slot's dispense-confirmation switch.
pub trait SwitchSense: Send + Sync {
    /// The slot this switch belongs to.
    fn motor_id(&self) -> u32;

    /// Read the current raw level (`true` = contact closed / active).
    ///
    /// # Errors
    ///
    /// Returns [`HalError::Io`] if the input cannot be read.
    fn level(&self) -> Result<bool, HalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn mock_switch_reads_level() {
        let sw = MockSwitch {
            motor_id: 7,
            level: true,
        };
        assert_eq!(sw.motor_id(), 7);
        assert!(sw.level().unwrap());
    }
}
