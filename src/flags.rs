use std::time::Duration;

use sqlx::{PgPool, Row};
use tokio::sync::watch;

pub const CHALLENGES_FLAG: &str = "challenges";

/// One-shot read of the challenges flag. A missing row and a failed query
/// both leave the feature on; the flag only ever turns it off explicitly.
pub async fn challenges_enabled(pool: &PgPool) -> bool {
    flag_enabled(pool, CHALLENGES_FLAG).await
}

async fn flag_enabled(pool: &PgPool, name: &str) -> bool {
    let row = sqlx::query("SELECT enabled FROM classtrack.feature_flags WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await;

    match row {
        Ok(Some(row)) => row.get("enabled"),
        Ok(None) => true,
        Err(e) => {
            log::warn!("feature flag {name} read failed, defaulting to enabled: {e}");
            true
        }
    }
}

/// Subscribe to challenges-flag changes. The receiver starts at the current
/// value; a background task re-reads the flag every `period` and publishes
/// only when the value changed, stopping once every receiver is gone.
pub async fn subscribe_challenges(pool: PgPool, period: Duration) -> watch::Receiver<bool> {
    let initial = challenges_enabled(&pool).await;
    let (tx, rx) = watch::channel(initial);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately and the initial value is already out.
        interval.tick().await;
        loop {
            interval.tick().await;
            if tx.is_closed() {
                break;
            }
            let enabled = challenges_enabled(&pool).await;
            tx.send_if_modified(|current| {
                if *current != enabled {
                    *current = enabled;
                    true
                } else {
                    false
                }
            });
        }
    });

    rx
}
