use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::ratelimit::CleanupHandle;
use crate::services::ClickDispatcher;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 单个任务超时时间（秒）
const TASK_TIMEOUT_SECS: u64 = 10;

/// Wait for Ctrl+C (or SIGTERM on unix).
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut term = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                wait_for_ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = wait_for_ctrl_c() => {}
            _ = term.recv() => info!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(
            "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
            e
        ),
    }
}

/// Stop background work: the bucket cleanup timer, then the click queue.
pub async fn perform_shutdown(cleanup: Option<CleanupHandle>, clicks: &ClickDispatcher) {
    let result = timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), async {
        if let Some(cleanup) = cleanup {
            match timeout(Duration::from_secs(TASK_TIMEOUT_SECS), cleanup.shutdown()).await {
                Ok(()) => info!("Rate limiter cleanup task stopped"),
                Err(_) => error!(
                    "Rate limiter cleanup task did not stop within {} seconds",
                    TASK_TIMEOUT_SECS
                ),
            }
        }

        if clicks
            .shutdown(Duration::from_secs(TASK_TIMEOUT_SECS))
            .await
        {
            info!("Click queue drained: {:?}", clicks.stats());
        } else {
            error!(
                "Click queue not drained within {} seconds, pending clicks dropped",
                TASK_TIMEOUT_SECS
            );
        }
    })
    .await;

    if result.is_err() {
        error!(
            "Shutdown tasks timed out after {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        );
    } else {
        info!("All shutdown tasks completed");
    }
}
