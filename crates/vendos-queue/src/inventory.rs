//! [`Inventory`] – stock collaborator consumed by the command queue.
//!
//! The catalog itself (products, prices, administration) lives outside this
//! system; the queue only needs to ask whether a slot can vend and to record
//! one unit sold when a dispense is confirmed.  [`MemoryInventory`] is the
//! in-process implementation used by tests and the demo server.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::warn;

/// Stock interface for one fleet of vending machines, keyed by
/// `(unit_id, motor_id)` slot.
pub trait Inventory: Send + Sync {
    /// `true` when the slot has at least one unit left to vend.
    fn has_stock(&self, unit_id: &str, motor_id: u32) -> bool;

    /// Record one unit sold from the slot.  Called exactly once per
    /// acknowledged dispense.
    fn decrement(&self, unit_id: &str, motor_id: u32);
}

/// In-memory slot → stock map.
#[derive(Default)]
pub struct MemoryInventory {
    stock: Mutex<HashMap<(String, u32), u32>>,
}

impl MemoryInventory {
    /// Create an empty inventory; every slot reads as out of stock until
    /// seeded with [`set_stock`][Self::set_stock].
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seeding for tests and demo wiring.
    pub fn with_stock(self, unit_id: &str, motor_id: u32, quantity: u32) -> Self {
        self.set_stock(unit_id, motor_id, quantity);
        self
    }

    /// Set the remaining stock for a slot.
    pub fn set_stock(&self, unit_id: &str, motor_id: u32, quantity: u32) {
        self.lock()
            .insert((unit_id.to_string(), motor_id), quantity);
    }

    /// Remaining stock for a slot; unknown slots read as zero.
    pub fn stock_of(&self, unit_id: &str, motor_id: u32) -> u32 {
        self.lock()
            .get(&(unit_id.to_string(), motor_id))
            .copied()
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, u32), u32>> {
        self.stock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inventory for MemoryInventory {
    fn has_stock(&self, unit_id: &str, motor_id: u32) -> bool {
        self.stock_of(unit_id, motor_id) > 0
    }

    fn decrement(&self, unit_id: &str, motor_id: u32) {
        let mut stock = self.lock();
        match stock.get_mut(&(unit_id.to_string(), motor_id)) {
            Some(qty) if *qty > 0 => *qty -= 1,
            _ => {
                // A confirmed dispense from a slot we believed empty means
                // the catalog and the cabinet have drifted apart.
                warn!(unit_id, motor_id, "dispense confirmed for empty slot");
            }
        }
    }
}
