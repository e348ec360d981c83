//! Periodic run loop
//!
//! Runs the pipeline immediately at startup, then on a fixed interval. Runs
//! are strictly sequential; a tick that fires while a run is still in flight
//! is absorbed by the ticker's delay behavior. The shutdown watch channel
//! cancels in-flight network operations and stops the loop.

use crate::error::AppError;
use crate::pipeline::{Pipeline, RunOutcome};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, instrument, warn};

#[instrument(skip(pipeline, shutdown), fields(poll_secs = poll_interval.as_secs()))]
pub async fn run(pipeline: Pipeline, poll_interval: Duration, mut shutdown: watch::Receiver<bool>) {
    info!("Starting scheduler");

    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut iteration_count = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Shutdown requested; stopping scheduler");
                    return;
                }
                continue;
            }
        }

        iteration_count += 1;
        let started = std::time::Instant::now();
        info!(iteration = iteration_count, "Scheduler: starting run");

        match pipeline.run_once().await {
            Ok(RunOutcome::Completed) => {
                info!(
                    iteration = iteration_count,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Scheduler: run completed"
                );
            }
            Ok(RunOutcome::Skipped) => {
                info!(
                    iteration = iteration_count,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Scheduler: no new data"
                );
            }
            Err(AppError::Cancelled) => {
                info!(iteration = iteration_count, "Scheduler: run cancelled");
                return;
            }
            Err(e) => {
                // transient upstream failures resolve on the next tick
                error!(
                    iteration = iteration_count,
                    error = %e,
                    "Scheduler: run failed"
                );
            }
        }

        if *shutdown.borrow() {
            warn!("Shutdown requested during run; stopping scheduler");
            return;
        }
    }
}
