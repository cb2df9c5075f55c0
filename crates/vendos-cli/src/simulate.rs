//! Simulated cam follower for the demo cabinet.
//!
//! On a physical machine the dispense motor rotates a cam that presses the
//! confirmation microswitch and releases it again after one full turn.
//! This task reproduces that coupling for [`SimCabinet`][vendos_hal::SimCabinet]
//! slots: whenever a motor is energised its switch is pressed, and after a
//! simulated rotation it is released, which is what stops the motor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use vendos_hal::sim::SlotHandle;

/// How long the simulated cam holds the switch before releasing.
const ROTATION_TIME: Duration = Duration::from_millis(400);

/// Spawn the cam-follower task over the cabinet's slot handles.
///
/// Runs until `shutdown` is raised.
pub fn spawn_cam_follower(
    handles: Vec<SlotHandle>,
    shutdown: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut pressed_since: Vec<Option<Instant>> = vec![None; handles.len()];
        let mut ticker = tokio::time::interval(Duration::from_millis(25));
        while !shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;
            for (slot, handle) in handles.iter().enumerate() {
                if handle.motor_level() {
                    match pressed_since[slot] {
                        None => {
                            handle.set_switch(true);
                            pressed_since[slot] = Some(Instant::now());
                        }
                        Some(t) if t.elapsed() >= ROTATION_TIME => {
                            // Cam lobe past the switch: release, which lets
                            // the controller stop the motor.
                            handle.set_switch(false);
                        }
                        Some(_) => {}
                    }
                } else {
                    handle.set_switch(false);
                    pressed_since[slot] = None;
                }
            }
        }
    })
}
