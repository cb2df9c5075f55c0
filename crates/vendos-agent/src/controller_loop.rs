//! [`ControllerLoop`] – the cooperative control loop of one dispensing unit.
//!
//! Each tick, in order:
//!
//! 1. **Switches** – sample every confirmation switch through its
//!    [`Debouncer`] and feed committed edges into the [`DispenseBank`].
//! 2. **Fallback** – run the maximum-run check for motors whose switch
//!    never reported a release.
//! 3. **Transport** – when the poll interval has elapsed, flush pending
//!    acknowledgments and then poll for a directive.  Both exchanges are
//!    awaited inline, so one request is in flight at a time and switch
//!    servicing defers while it is outstanding, bounded by the request
//!    timeout.  The actuator level is latched in hardware, so a deferred
//!    tick never changes the physical motor state.
//!
//! Transport failures are logged and absorbed: a failed poll is simply
//! retried at the next interval, and a failed acknowledgment stays in a
//! bounded pending buffer until the queue accepts it.  The queue treats
//! duplicate acknowledgments as no-ops, so retrying is always safe.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use vendos_hal::SlotRegistry;
use vendos_kernel::{CycleEvent, Debouncer, DispenseBank};
use vendos_types::{AckStatus, DirectiveAction};

use crate::poll_client::{PollClient, TransportError};

/// Cap on buffered unacknowledged cycles during a queue outage.  When the
/// buffer is full the oldest ack is dropped: the queue's stale-ack no-op
/// rule means a dropped ack leaves one command stuck dispatched, which is
/// the documented manual-intervention case.
const MAX_PENDING_ACKS: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`ControllerLoop`].
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Base URL of the command queue.
    pub base_url: String,
    /// This unit's identity towards the queue.
    pub unit_id: String,
    /// Control-loop tick period.
    pub tick_period: Duration,
    /// How often to exchange with the queue.
    pub poll_interval: Duration,
    /// Bound on every poll/ack request.
    pub request_timeout: Duration,
    /// Switch settle window.
    pub debounce_window: Duration,
    /// Optional forced-stop duration for motors whose switch never
    /// reports a release.
    pub max_run: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            unit_id: "v1".to_string(),
            tick_period: Duration::from_millis(10),
            poll_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(5),
            debounce_window: Duration::from_millis(50),
            max_run: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ControllerLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns every subsystem of one unit: the HAL registry, the per-channel
/// debouncers, the dispense state machine, and the poll client.  Call
/// [`tick`][Self::tick] from a timer loop, or hand the whole loop to
/// [`run`][Self::run].
pub struct ControllerLoop {
    client: PollClient,
    registry: SlotRegistry,
    bank: DispenseBank,
    debouncers: HashMap<u32, Debouncer>,
    pending_acks: VecDeque<(u32, AckStatus)>,
    last_poll: Option<Instant>,
    tick_period: Duration,
    poll_interval: Duration,
}

impl ControllerLoop {
    /// Build the loop over an already-populated [`SlotRegistry`].
    ///
    /// Every slot with both a motor and a switch driver gets a debounce
    /// channel (seeded from the switch's current level) and an `Idle`
    /// entry in the dispense bank.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the HTTP client cannot be built.
    pub fn new(config: ControllerConfig, registry: SlotRegistry) -> Result<Self, TransportError> {
        let client = PollClient::new(&config.base_url, &config.unit_id, config.request_timeout)?;

        let now = Instant::now();
        let mut bank = DispenseBank::new(config.max_run);
        let mut debouncers = HashMap::new();
        for motor_id in registry.slot_ids() {
            bank.register(motor_id);
            let initial = match registry.read_switch(motor_id) {
                Ok(level) => level,
                Err(e) => {
                    warn!(motor_id, error = %e, "switch unreadable at startup; assuming open");
                    false
                }
            };
            debouncers.insert(
                motor_id,
                Debouncer::new(config.debounce_window, initial, now),
            );
        }

        Ok(Self {
            client,
            registry,
            bank,
            debouncers,
            pending_acks: VecDeque::new(),
            last_poll: None,
            tick_period: config.tick_period,
            poll_interval: config.poll_interval,
        })
    }

    /// `true` while the motor is in a dispense cycle.
    pub fn is_motor_running(&self, motor_id: u32) -> bool {
        self.bank.is_running(motor_id)
    }

    /// Number of completed cycles whose acknowledgment has not yet been
    /// accepted by the queue.
    pub fn pending_acks(&self) -> usize {
        self.pending_acks.len()
    }

    /// Advance the controller by one tick.
    pub async fn tick(&mut self, now: Instant) {
        // ── 1. Switch servicing ───────────────────────────────────────────────
        for (&motor_id, debouncer) in &mut self.debouncers {
            let raw = match self.registry.read_switch(motor_id) {
                Ok(level) => level,
                Err(e) => {
                    warn!(motor_id, error = %e, "switch read failed; skipping channel");
                    continue;
                }
            };
            if let Some(edge) = debouncer.sample(raw, now) {
                if let Some(event) = self.bank.handle_edge(motor_id, edge, now) {
                    Self::apply_event(
                        &mut self.registry,
                        &mut self.pending_acks,
                        event,
                    );
                }
            }
        }

        // ── 2. Max-run fallback ───────────────────────────────────────────────
        for event in self.bank.check_max_run(now) {
            Self::apply_event(&mut self.registry, &mut self.pending_acks, event);
        }

        // ── 3. Transport ──────────────────────────────────────────────────────
        if self.poll_due(now) {
            self.last_poll = Some(now);
            self.flush_acks().await;
            self.poll_directive(now).await;
        }
    }

    /// Drive the loop until `shutdown` is raised.
    pub async fn run(mut self, shutdown: Arc<AtomicBool>) {
        info!(unit_id = %self.client.unit_id(), "controller loop starting");
        let mut ticker = tokio::time::interval(self.tick_period);
        // A blocking exchange defers ticks; do not burst to catch up.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while !shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;
            self.tick(Instant::now()).await;
        }
        info!("controller loop stopped");
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    fn poll_due(&self, now: Instant) -> bool {
        self.last_poll
            .is_none_or(|t| now.duration_since(t) >= self.poll_interval)
    }

    /// Map a dispense-bank transition onto the HAL and the ack buffer.
    fn apply_event(
        registry: &mut SlotRegistry,
        pending_acks: &mut VecDeque<(u32, AckStatus)>,
        event: CycleEvent,
    ) {
        match event {
            CycleEvent::Started { motor_id } => {
                if let Err(e) = registry.energise(motor_id) {
                    warn!(motor_id, error = %e, "failed to energise motor");
                }
            }
            CycleEvent::Completed { motor_id } => {
                if let Err(e) = registry.de_energise(motor_id) {
                    warn!(motor_id, error = %e, "failed to de-energise motor");
                }
                if pending_acks.len() >= MAX_PENDING_ACKS {
                    let dropped = pending_acks.pop_front();
                    warn!(?dropped, "ack buffer full; dropping oldest acknowledgment");
                }
                pending_acks.push_back((motor_id, AckStatus::Success));
            }
        }
    }

    /// Send buffered acknowledgments in completion order, stopping at the
    /// first failure.  Failed acks stay buffered for the next interval.
    async fn flush_acks(&mut self) {
        while let Some(&(motor_id, status)) = self.pending_acks.front() {
            match self.client.acknowledge(motor_id, status).await {
                Ok(()) => {
                    self.pending_acks.pop_front();
                }
                Err(e) => {
                    warn!(motor_id, error = %e, "acknowledgment failed; will retry next interval");
                    break;
                }
            }
        }
    }

    async fn poll_directive(&mut self, now: Instant) {
        match self.client.next_directive().await {
            Ok(Some(directive)) => match directive.action {
                DirectiveAction::Start => {
                    if let Some(event) = self.bank.handle_directive(directive.motor_id, now) {
                        Self::apply_event(&mut self.registry, &mut self.pending_acks, event);
                    }
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "poll failed; retrying next interval");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
