use std::sync::Arc;

use tokio::time::{Duration, interval};
use tracing::{debug, error, info};

use crate::metrics::{DUPLICATE_ENTRIES, RATE_LIMIT_ENTRIES};
use crate::state::AppState;

/// Drop expired windows from both limiters. Returns how many were removed.
pub fn sweep_once(state: &AppState) -> usize {
    let mut removed = 0;
    for (name, result) in [
        ("contact", state.contact.limiter().sweep()),
        ("api", state.api_limiter.sweep()),
    ] {
        match result {
            Ok(n) => removed += n,
            Err(e) => error!(limiter = name, error = %e, "rate limit sweep failed"),
        }
    }

    RATE_LIMIT_ENTRIES.set(state.tracked_windows() as i64);
    DUPLICATE_ENTRIES.set(state.contact.duplicates().len() as i64);
    removed
}

// Sweeper loop - runs every `every` until the runtime shuts down
pub async fn sweeper(state: Arc<AppState>, every: Duration) {
    let mut interval = interval(every);

    info!(interval = ?every, "rate limit sweeper started");

    loop {
        interval.tick().await;

        let removed = sweep_once(&state);
        if removed > 0 {
            debug!(removed, live = state.tracked_windows(), "swept expired rate limit windows");
        }
    }
}
