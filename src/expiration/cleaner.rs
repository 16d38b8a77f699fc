use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::AppState;

/// Start the background task that drops refresh credentials past their expiry
pub fn start_expiration_cleaner(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.tokens.cleanup_interval_seconds);

    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;
            run_cleanup(&state).await;
        }
    })
}

pub(crate) async fn run_cleanup(state: &AppState) -> usize {
    debug!("Running expiration cleanup");

    let db = state.db.clone();
    let result =
        tokio::task::spawn_blocking(move || db.delete_expired_credentials(Utc::now())).await;

    match result {
        Ok(Ok(count)) => {
            if count > 0 {
                debug!(refresh_tokens_cleaned = count, "Expired refresh tokens cleaned");
            }
            count
        }
        Ok(Err(e)) => {
            error!(error = %e, "Failed to clean up expired refresh tokens");
            0
        }
        Err(e) => {
            error!(error = %e, "Expiration cleanup task panicked");
            0
        }
    }
}
