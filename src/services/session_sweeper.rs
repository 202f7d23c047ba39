use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::state::SharedState;

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically close sessions that stopped talking to the server. Never returns.
pub async fn run(state: SharedState) {
    let max_idle = state.config().session_idle();
    let mut ticker = interval(sweep_interval(max_idle));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let removed = state.sweep_idle(max_idle).await;
        if removed > 0 {
            info!(
                removed,
                remaining = state.session_count(),
                "closed idle sessions"
            );
        } else {
            debug!(sessions = state.session_count(), "no idle sessions");
        }
    }
}

fn sweep_interval(max_idle: Duration) -> Duration {
    (max_idle / 2).clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL)
}
