//! `vendos-queue` – Vend-command queue
//!
//! The server-side state machine that tracks every purchase from creation
//! through payment confirmation, dispatch, and acknowledgment.
//!
//! # Modules
//!
//! - [`store`] – [`CommandStore`][store::CommandStore]: SQLite-backed
//!   lifecycle store implementing create / confirm_payment / next_directive
//!   / acknowledge / sweep_expired with compare-and-set transitions.
//! - [`inventory`] – [`Inventory`][inventory::Inventory]: the stock
//!   collaborator decremented on every successful acknowledgment, plus an
//!   in-memory implementation for tests and the demo server.
//! - [`stale`] – the pure staleness predicate shared by the periodic sweep
//!   and the lazy per-slot check at creation.

pub mod inventory;
pub mod stale;
pub mod store;

pub use inventory::{Inventory, MemoryInventory};
pub use stale::{DEFAULT_PAYMENT_TIMEOUT, is_stale};
pub use store::{AckOutcome, CommandStore, QueueError};
