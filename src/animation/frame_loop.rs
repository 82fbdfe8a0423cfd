use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::engine::SharedWalkEngine;

/// Ticks the engine at its configured frame rate until cancelled
///
/// Late frames are skipped rather than bunched, so a stalled runtime never
/// replays a burst of stale positions. The frame rate is re-read after every
/// frame and the timer is rebuilt when it changes.
pub async fn run_frame_loop(engine: SharedWalkEngine, cancel: CancellationToken) {
    let mut frame_rate = engine.lock().await.settings().frame_rate.max(1);
    let mut frames = frame_timer(frame_rate, Instant::now());

    info!(frame_rate, "Frame loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            now = frames.tick() => {
                let (active, configured) = {
                    let mut engine = engine.lock().await;
                    (engine.tick(now), engine.settings().frame_rate.max(1))
                };
                if active > 0 {
                    debug!(active, "Frame");
                }
                if configured != frame_rate {
                    info!(from = frame_rate, to = configured, "Frame rate changed");
                    frame_rate = configured;
                    frames = frame_timer(frame_rate, now + frame_period(frame_rate));
                }
            }
        }
    }

    info!("Frame loop stopped");
}

fn frame_period(frame_rate: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1)))
}

fn frame_timer(frame_rate: u32, first: Instant) -> Interval {
    let mut frames = interval_at(first, frame_period(frame_rate));
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    frames
}
