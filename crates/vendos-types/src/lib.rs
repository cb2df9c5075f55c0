use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`VendCommand`].
///
/// Transitions are strictly forward:
/// `Created → AwaitingPayment → {Pending → Dispatched → Acknowledged} | Expired`.
/// `Acknowledged` and `Expired` are terminal; `Expired` is reachable only
/// from `AwaitingPayment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    /// The purchase has been initiated but not yet persisted as payable.
    /// Transient: a stored command is always at least `AwaitingPayment`.
    Created,
    /// Waiting for the external payment collaborator to confirm.
    AwaitingPayment,
    /// Payment confirmed; eligible for dispatch to the controller.
    Pending,
    /// Delivered to the controller at least once; redelivered until acked.
    Dispatched,
    /// The controller confirmed a physically completed dispense.
    Acknowledged,
    /// Payment never arrived within the staleness threshold.
    Expired,
}

impl CommandState {
    /// Stable string form used for storage and wire payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandState::Created => "created",
            CommandState::AwaitingPayment => "awaiting_payment",
            CommandState::Pending => "pending",
            CommandState::Dispatched => "dispatched",
            CommandState::Acknowledged => "acknowledged",
            CommandState::Expired => "expired",
        }
    }

    /// Parse the storage string form. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(CommandState::Created),
            "awaiting_payment" => Some(CommandState::AwaitingPayment),
            "pending" => Some(CommandState::Pending),
            "dispatched" => Some(CommandState::Dispatched),
            "acknowledged" => Some(CommandState::Acknowledged),
            "expired" => Some(CommandState::Expired),
            _ => None,
        }
    }

    /// `true` for the immutable terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandState::Acknowledged | CommandState::Expired)
    }
}

impl std::fmt::Display for CommandState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single purchase attempt against one dispensing slot.
///
/// At most one command per `(unit_id, motor_id)` pair may be in a
/// non-terminal state at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendCommand {
    /// UUID v4, assigned by the queue at creation.
    pub id: String,
    /// The physical vending machine this command targets.
    pub unit_id: String,
    /// The dispensing slot / actuator within the unit.
    pub motor_id: u32,
    pub state: CommandState,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, when a success acknowledgment is applied.
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// The only action the queue can currently instruct a controller to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveAction {
    Start,
}

/// An instruction from the queue telling a controller to start one motor.
///
/// Carries no command identifier: the controller cannot distinguish two
/// commands aimed at the same slot, and relies on the queue's
/// one-command-per-slot rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub motor_id: u32,
    pub action: DirectiveAction,
}

/// Wire shape of a `get_command` response.
///
/// The absent-directive case is `{"motor_id": null, "action": null}` rather
/// than an empty body, matching what the deployed controller firmware
/// expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveResponse {
    pub motor_id: Option<u32>,
    pub action: Option<DirectiveAction>,
}

impl DirectiveResponse {
    /// Build the empty/absent-directive response.
    pub fn none() -> Self {
        Self {
            motor_id: None,
            action: None,
        }
    }

    /// Recover the directive, if one was present.
    pub fn directive(&self) -> Option<Directive> {
        match (self.motor_id, self.action) {
            (Some(motor_id), Some(action)) => Some(Directive { motor_id, action }),
            _ => None,
        }
    }
}

impl From<Option<Directive>> for DirectiveResponse {
    fn from(d: Option<Directive>) -> Self {
        match d {
            Some(d) => Self {
                motor_id: Some(d.motor_id),
                action: Some(d.action),
            },
            None => Self::none(),
        }
    }
}

/// Outcome reported by a controller for one dispense cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Failure,
}

/// Controller-to-queue acknowledgment of a completed dispense cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckRequest {
    pub unit_id: String,
    pub motor_id: u32,
    pub status: AckStatus,
}
