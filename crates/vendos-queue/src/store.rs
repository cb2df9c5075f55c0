//! [`CommandStore`] – SQLite-backed vend-command lifecycle store.
//!
//! Tracks every purchase through the forward-only state machine
//! `AwaitingPayment → {Pending → Dispatched → Acknowledged} | Expired` and
//! enforces the one-non-terminal-command-per-slot rule at creation.
//!
//! # Storage layout
//!
//! A single SQLite table `vend_commands`:
//!
//! | column          | type    | description                                  |
//! |-----------------|---------|----------------------------------------------|
//! | id              | TEXT    | UUID v4 primary key                          |
//! | unit_id         | TEXT    | Machine the command targets                  |
//! | motor_id        | INTEGER | Dispensing slot within the machine           |
//! | state           | TEXT    | One of the [`CommandState`] string forms     |
//! | created_at      | TEXT    | RFC-3339 creation timestamp (UTC)            |
//! | acknowledged_at | TEXT    | RFC-3339 ack timestamp (NULL until acked)    |
//!
//! # Concurrency
//!
//! The connection sits behind a `Mutex`, and every state transition is a
//! conditional `UPDATE … WHERE state = ?`.  Payment callbacks, controller
//! polls, acks, and the staleness sweep can therefore race freely: a
//! transition either applies from its expected predecessor state or applies
//! not at all.  No cross-command locking exists: slot uniqueness is
//! enforced once, at [`create`][CommandStore::create].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vendos_types::{AckStatus, CommandState, Directive, DirectiveAction, VendCommand};

use crate::inventory::Inventory;
use crate::stale::{DEFAULT_PAYMENT_TIMEOUT, is_stale};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from command queue operations.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("SQLite error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("active command already exists for unit {unit_id} motor {motor_id}")]
    Conflict { unit_id: String, motor_id: u32 },
    #[error("command {id} is {state}, expected awaiting_payment")]
    InvalidState { id: String, state: CommandState },
}

// ─────────────────────────────────────────────────────────────────────────────
// AckOutcome
// ─────────────────────────────────────────────────────────────────────────────

/// What an [`acknowledge`][CommandStore::acknowledge] call actually did.
///
/// Both outcomes are reported to the controller as accepted: a stale or
/// duplicate ack must never surface an error, or ack retries would storm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// A dispatched command was finalized and inventory decremented.
    Applied,
    /// No matching dispatched command (duplicate, late, or manual-press
    /// cycle), or a failure status.  No state changed.
    Ignored,
}

// ─────────────────────────────────────────────────────────────────────────────
// CommandStore
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed command queue shared by all HTTP handlers and the sweeper.
pub struct CommandStore {
    conn: Mutex<Connection>,
    inventory: Arc<dyn Inventory>,
    payment_timeout: Duration,
}

impl CommandStore {
    /// Open (or create) a persistent store at `path`.
    pub fn open(path: &str, inventory: Arc<dyn Inventory>) -> Result<Self, QueueError> {
        Self::from_conn(Connection::open(path)?, inventory)
    }

    /// Open a temporary in-memory store (useful for testing).
    pub fn open_in_memory(inventory: Arc<dyn Inventory>) -> Result<Self, QueueError> {
        Self::from_conn(Connection::open_in_memory()?, inventory)
    }

    fn from_conn(conn: Connection, inventory: Arc<dyn Inventory>) -> Result<Self, QueueError> {
        let store = Self {
            conn: Mutex::new(conn),
            inventory,
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Override how long a command may wait for payment (builder-style).
    pub fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = timeout;
        self
    }

    /// The configured awaiting-payment staleness threshold.
    pub fn payment_timeout(&self) -> Duration {
        self.payment_timeout
    }

    fn init_schema(&self) -> Result<(), QueueError> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS vend_commands (
                id              TEXT    NOT NULL PRIMARY KEY,
                unit_id         TEXT    NOT NULL,
                motor_id        INTEGER NOT NULL,
                state           TEXT    NOT NULL DEFAULT 'awaiting_payment',
                created_at      TEXT    NOT NULL,
                acknowledged_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_vend_commands_slot
                ON vend_commands (unit_id, motor_id, state);",
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a command for `(unit_id, motor_id)` in `AwaitingPayment` and
    /// return its id.
    ///
    /// A stale `AwaitingPayment` command occupying the slot is expired first
    /// (the lazy half of the staleness sweep), so an abandoned purchase can
    /// never wedge a slot past the payment timeout.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Conflict`] when a non-terminal command still
    /// occupies the slot.
    pub fn create(
        &self,
        unit_id: &str,
        motor_id: u32,
        now: DateTime<Utc>,
    ) -> Result<String, QueueError> {
        let conn = self.conn();

        // Lazy sweep of this slot, same predicate as the periodic pass.
        let stale: Option<(String, String)> = conn
            .query_row(
                "SELECT id, created_at FROM vend_commands
                 WHERE unit_id = ?1 AND motor_id = ?2 AND state = 'awaiting_payment'",
                params![unit_id, motor_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if let Some((id, created_at)) = stale {
            let created_at = parse_ts(&created_at)?;
            if is_stale(created_at, now, self.payment_timeout) {
                let n = conn.execute(
                    "UPDATE vend_commands SET state = 'expired'
                     WHERE id = ?1 AND state = 'awaiting_payment'",
                    params![id],
                )?;
                if n == 1 {
                    info!(command_id = %id, unit_id, motor_id, "expired stale command at create");
                }
            }
        }

        let occupied: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vend_commands
             WHERE unit_id = ?1 AND motor_id = ?2
               AND state IN ('created', 'awaiting_payment', 'pending', 'dispatched')",
            params![unit_id, motor_id],
            |row| row.get(0),
        )?;
        if occupied > 0 {
            return Err(QueueError::Conflict {
                unit_id: unit_id.to_string(),
                motor_id,
            });
        }

        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO vend_commands (id, unit_id, motor_id, state, created_at, acknowledged_at)
             VALUES (?1, ?2, ?3, 'awaiting_payment', ?4, NULL)",
            params![id, unit_id, motor_id, fmt_ts(now)],
        )?;
        info!(command_id = %id, unit_id, motor_id, "command created, awaiting payment");
        Ok(id)
    }

    /// Record the external payment confirmation for `id`, making the command
    /// eligible for dispatch.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotFound`] for an unknown id, or
    /// [`QueueError::InvalidState`] when the command is past
    /// `AwaitingPayment` (including already expired).
    pub fn confirm_payment(&self, id: &str) -> Result<(), QueueError> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE vend_commands SET state = 'pending'
             WHERE id = ?1 AND state = 'awaiting_payment'",
            params![id],
        )?;
        if n == 1 {
            info!(command_id = %id, "payment confirmed, command pending dispatch");
            return Ok(());
        }
        // The compare-and-set missed: report why.
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM vend_commands WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match state {
            None => Err(QueueError::NotFound(id.to_string())),
            Some(s) => Err(QueueError::InvalidState {
                id: id.to_string(),
                state: parse_state(&s)?,
            }),
        }
    }

    /// The directive the polling controller for `unit_id` should see, if any.
    ///
    /// An already-dispatched command is redelivered unchanged until it is
    /// acknowledged (at-least-once delivery); otherwise the unit's oldest
    /// pending command is promoted to `Dispatched` and returned.  One
    /// command is in flight per unit at a time.
    pub fn next_directive(&self, unit_id: &str) -> Result<Option<Directive>, QueueError> {
        let conn = self.conn();

        let dispatched: Option<u32> = conn
            .query_row(
                "SELECT motor_id FROM vend_commands
                 WHERE unit_id = ?1 AND state = 'dispatched'
                 ORDER BY created_at ASC LIMIT 1",
                params![unit_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(motor_id) = dispatched {
            debug!(unit_id, motor_id, "redelivering dispatched directive");
            return Ok(Some(Directive {
                motor_id,
                action: DirectiveAction::Start,
            }));
        }

        let pending: Option<(String, u32)> = conn
            .query_row(
                "SELECT id, motor_id FROM vend_commands
                 WHERE unit_id = ?1 AND state = 'pending'
                 ORDER BY created_at ASC LIMIT 1",
                params![unit_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((id, motor_id)) = pending else {
            return Ok(None);
        };
        let n = conn.execute(
            "UPDATE vend_commands SET state = 'dispatched'
             WHERE id = ?1 AND state = 'pending'",
            params![id],
        )?;
        if n == 1 {
            info!(command_id = %id, unit_id, motor_id, "command dispatched to controller");
            Ok(Some(Directive {
                motor_id,
                action: DirectiveAction::Start,
            }))
        } else {
            // Raced with another transition; the next poll will resolve it.
            Ok(None)
        }
    }

    /// Apply a controller acknowledgment for `(unit_id, motor_id)`.
    ///
    /// A success against the slot's dispatched command finalizes it, stamps
    /// `acknowledged_at`, and decrements the inventory collaborator.  An ack
    /// with no matching dispatched command is a duplicate or a late arrival
    /// and is accepted as a no-op; a failure status is logged and leaves the
    /// command dispatched for manual intervention.
    pub fn acknowledge(
        &self,
        unit_id: &str,
        motor_id: u32,
        status: AckStatus,
        now: DateTime<Utc>,
    ) -> Result<AckOutcome, QueueError> {
        let applied = {
            let conn = self.conn();
            let dispatched: Option<String> = conn
                .query_row(
                    "SELECT id FROM vend_commands
                     WHERE unit_id = ?1 AND motor_id = ?2 AND state = 'dispatched'
                     ORDER BY created_at ASC LIMIT 1",
                    params![unit_id, motor_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(id) = dispatched else {
                debug!(unit_id, motor_id, "stale acknowledgment; accepting as no-op");
                return Ok(AckOutcome::Ignored);
            };
            match status {
                AckStatus::Failure => {
                    warn!(command_id = %id, unit_id, motor_id,
                        "controller reported dispense failure; command left dispatched");
                    return Ok(AckOutcome::Ignored);
                }
                AckStatus::Success => {
                    let n = conn.execute(
                        "UPDATE vend_commands
                         SET state = 'acknowledged', acknowledged_at = ?1
                         WHERE id = ?2 AND state = 'dispatched'",
                        params![fmt_ts(now), id],
                    )?;
                    if n == 1 {
                        info!(command_id = %id, unit_id, motor_id, "dispense acknowledged");
                        true
                    } else {
                        false
                    }
                }
            }
        };

        if applied {
            // Inventory is called outside the connection lock; exactly once
            // per command because the compare-and-set above can only fire
            // once per dispatched → acknowledged transition.
            self.inventory.decrement(unit_id, motor_id);
            Ok(AckOutcome::Applied)
        } else {
            Ok(AckOutcome::Ignored)
        }
    }

    /// Expire every `AwaitingPayment` command older than `threshold` as of
    /// `now`.  Returns how many commands were expired.
    pub fn sweep_expired(
        &self,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> Result<usize, QueueError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, created_at FROM vend_commands WHERE state = 'awaiting_payment'",
        )?;
        let waiting: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        let mut expired = 0;
        for (id, created_at) in waiting {
            if !is_stale(parse_ts(&created_at)?, now, threshold) {
                continue;
            }
            expired += conn.execute(
                "UPDATE vend_commands SET state = 'expired'
                 WHERE id = ?1 AND state = 'awaiting_payment'",
                params![id],
            )?;
        }
        if expired > 0 {
            info!(expired, "staleness sweep expired unpaid commands");
        }
        Ok(expired)
    }

    /// Fetch a single command by id.
    pub fn get(&self, id: &str) -> Result<VendCommand, QueueError> {
        self.conn()
            .query_row(
                "SELECT id, unit_id, motor_id, state, created_at, acknowledged_at
                 FROM vend_commands WHERE id = ?1",
                params![id],
                row_to_command,
            )
            .optional()?
            .ok_or_else(|| QueueError::NotFound(id.to_string()))
    }

    /// All commands for a unit, oldest first.
    pub fn list_for_unit(&self, unit_id: &str) -> Result<Vec<VendCommand>, QueueError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, unit_id, motor_id, state, created_at, acknowledged_at
             FROM vend_commands WHERE unit_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![unit_id], row_to_command)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(QueueError::from)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row / timestamp helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed-width RFC-3339 (microseconds, `Z` suffix) so that lexicographic
/// `ORDER BY created_at` is chronological.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, QueueError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            QueueError::Storage(rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))
        })
}

fn parse_state(raw: &str) -> Result<CommandState, QueueError> {
    CommandState::parse(raw).ok_or_else(|| {
        QueueError::Storage(rusqlite::Error::InvalidColumnType(
            3,
            raw.to_string(),
            rusqlite::types::Type::Text,
        ))
    })
}

fn row_to_command(row: &rusqlite::Row<'_>) -> rusqlite::Result<VendCommand> {
    let id: String = row.get(0)?;
    let unit_id: String = row.get(1)?;
    let motor_id: u32 = row.get(2)?;
    let state_str: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let acknowledged_at: Option<String> = row.get(5)?;

    let state = CommandState::parse(&state_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(3, state_str, rusqlite::types::Type::Text)
    })?;
    let parse = |idx: usize, raw: &str| {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    };
    Ok(VendCommand {
        id,
        unit_id,
        motor_id,
        state,
        created_at: parse(4, &created_at)?,
        acknowledged_at: acknowledged_at
            .as_deref()
            .map(|raw| parse(5, raw))
            .transpose()?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
