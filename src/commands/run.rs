use crate::config::AppConfig;
use crate::error::Result;
use crate::pipeline::{Pipeline, RunOutcome};
use crate::worker;
use tokio::sync::watch;
use tracing::info;

/// Run the pipeline once or on the configured interval. Ctrl-c flips the
/// shutdown channel, which cancels in-flight fetches and stops the loop.
pub async fn run(config: AppConfig, once: bool, dry_run: bool) -> Result<()> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received ctrl-c; shutting down");
            let _ = tx.send(true);
        }
    });

    let pipeline = Pipeline::new(config.clone(), dry_run, rx.clone())?;

    if once {
        match pipeline.run_once().await? {
            RunOutcome::Completed => info!("Run completed"),
            RunOutcome::Skipped => info!("No new data"),
        }
        return Ok(());
    }

    worker::run_scheduler(pipeline, config.poll_interval(), rx).await;
    Ok(())
}
