//! Background session monitor
//!
//! The max_time rule is evaluated lazily on action arrival, but a stalled
//! agent never sends another action; this task wakes every second and
//! terminates sessions whose time budget has elapsed. Under the
//! auto_expire policy it also sweeps old rendered frames once a minute.

use std::sync::Arc;
use std::time::Duration;

use panowalk_core::CleanupPolicy;

use crate::cleanup;
use crate::engine::SessionEngine;

const TICK: Duration = Duration::from_secs(1);
const SWEEP_EVERY_TICKS: u64 = 60;

/// Run the monitor loop forever. Spawn this once at startup.
pub async fn run_monitor(engine: Arc<SessionEngine>) {
    let mut interval = tokio::time::interval(TICK);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    loop {
        interval.tick().await;
        ticks += 1;

        let reaped = engine.reap_expired();
        if reaped > 0 {
            tracing::info!(reaped, "terminated stalled sessions past their time budget");
        }

        if engine.settings().temp_image_cleanup_policy == CleanupPolicy::AutoExpire
            && ticks % SWEEP_EVERY_TICKS == 0
        {
            let max_age = Duration::from_secs(engine.settings().temp_image_expire_hours * 3600);
            match cleanup::sweep_expired(&engine.settings().temp_images_dir(), max_age) {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "expired temp images swept"),
                Err(error) => tracing::warn!(%error, "temp image sweep failed"),
            }
        }
    }
}
