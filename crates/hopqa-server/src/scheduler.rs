//! Periodic centrality refresh.

use std::sync::Arc;
use std::time::Duration;

use hopqa_core::Error;
use tracing::{debug, error, info};

use crate::state::AppState;

/// Spawn the refresh loop if `centrality_refresh_secs` is configured.
pub fn start_centrality_refresh(state: Arc<AppState>) {
    let Some(secs) = state.config.engine.centrality_refresh_secs.filter(|s| *s > 0) else {
        debug!("Periodic centrality refresh disabled");
        return;
    };

    tokio::spawn(async move {
        info!("Centrality refresh every {}s", secs);
        let mut ticker = tokio::time::interval(Duration::from_secs(secs));
        loop {
            ticker.tick().await;
            match state.refresh_centrality(None).await {
                Ok(report) => info!(
                    "Scheduled centrality refresh wrote {} scores in {}ms",
                    report.scores_written, report.duration_ms
                ),
                Err(Error::GraphEmpty(_)) => debug!("Skipping centrality refresh: graph is empty"),
                Err(e) => error!("Scheduled centrality refresh failed: {}", e),
            }
        }
    });
}
