//! 1 Hz countdown driver for running occurrence timers.
//!
//! Every device with an active child view runs its own ticker; concurrent
//! decrements across devices converge through the engine's per-collection
//! last-writer-wins policy, the same tolerance the rest of the document has.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;

use weekplan_core::timer::tick_second;

use crate::engine::SyncEngine;
use crate::patch::DocumentPatch;

/// Aborts the ticker task when dropped, tying the interval's lifetime to the
/// view (or session) that owns the guard.
#[derive(Debug)]
pub struct TickerGuard {
    handle: JoinHandle<()>,
}

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn the per-second countdown task for `engine`.
///
/// Each tick decrements running timers and auto-completes the occurrence of
/// any timer that reaches zero; idle ticks produce no save at all.
pub fn spawn_timer_ticker(engine: Arc<SyncEngine>) -> TickerGuard {
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await; // the first tick fires immediately; skip it
        loop {
            interval.tick().await;
            let snapshot = engine.get_snapshot();
            if let Some((timers, completions)) = tick_second(&snapshot.timers, &snapshot.completions)
            {
                engine.save(
                    DocumentPatch::new()
                        .with_timers(timers)
                        .with_completions(completions),
                );
            }
        }
    });
    debug!("[HouseholdSync] Timer ticker started");
    TickerGuard { handle }
}
