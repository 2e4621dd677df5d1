//! Background click recording
//!
//! Redirect handlers hand clicks to a bounded queue and return immediately.
//! A fixed set of worker tasks drains the queue and records each click
//! through the [`LinkResolver`] under its own timeout. A full queue drops the
//! click; failures and timeouts are logged and counted, never returned to
//! the request that produced them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, anyhow};
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::ClickConfig;
use crate::services::LinkResolver;

/// One click waiting to be recorded.
#[derive(Debug, Clone, Default)]
pub struct ClickEvent {
    pub link_id: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub submitted: u64,
    pub recorded: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    recorded: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

pub struct ClickDispatcher {
    tx: Mutex<Option<mpsc::Sender<ClickEvent>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl ClickDispatcher {
    /// Spawn `config.workers` tasks on the current tokio runtime.
    pub fn start(recorder: Arc<dyn LinkResolver>, config: &ClickConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let counters = Arc::new(Counters::default());
        let timeout = config.timeout();

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let recorder = Arc::clone(&recorder);
                let counters = Arc::clone(&counters);
                tokio::spawn(async move {
                    loop {
                        // 只在取消息时持有接收端锁，记录期间释放
                        let event = rx.lock().await.recv().await;
                        let Some(event) = event else { break };

                        match record_one(recorder.as_ref(), &event, timeout).await {
                            Ok(()) => {
                                counters.recorded.fetch_add(1, Ordering::Relaxed);
                                trace!("ClickDispatcher: recorded click for {}", event.link_id);
                            }
                            Err(e) => {
                                counters.failed.fetch_add(1, Ordering::Relaxed);
                                warn!("ClickDispatcher: {:#}", e);
                            }
                        }
                    }
                    debug!("ClickDispatcher: worker {} stopped", worker_id);
                })
            })
            .collect();

        debug!(
            "ClickDispatcher started: {} workers, queue size {}, timeout {}ms",
            config.workers.max(1),
            config.queue_size.max(1),
            timeout.as_millis()
        );

        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            counters,
        }
    }

    /// Queue a click without waiting. Returns false when it was dropped.
    pub fn submit(&self, event: ClickEvent) -> bool {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("ClickDispatcher: closed, dropping click for {}", event.link_id);
            return false;
        };

        match tx.try_send(event) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("ClickDispatcher: queue full, dropping click for {}", event.link_id);
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("ClickDispatcher: queue closed, dropping click for {}", event.link_id);
                false
            }
        }
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            recorded: self.counters.recorded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Close the queue and let workers drain it for at most `grace`.
    ///
    /// Workers still running after `grace` are aborted. Returns true when the
    /// queue drained in time. Later calls are no-ops returning true.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        drop(self.tx.lock().take());
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return true;
        }

        let aborts: Vec<_> = workers.iter().map(JoinHandle::abort_handle).collect();
        match tokio::time::timeout(grace, join_all(workers)).await {
            Ok(_) => {
                debug!("ClickDispatcher: drained, {:?}", self.stats());
                true
            }
            Err(_) => {
                warn!(
                    "ClickDispatcher: drain exceeded {}ms, aborting workers",
                    grace.as_millis()
                );
                aborts.iter().for_each(|handle| handle.abort());
                false
            }
        }
    }
}

async fn record_one(
    recorder: &dyn LinkResolver,
    event: &ClickEvent,
    timeout: Duration,
) -> anyhow::Result<()> {
    tokio::time::timeout(
        timeout,
        recorder.record_click(
            &event.link_id,
            event.referrer.as_deref(),
            event.user_agent.as_deref(),
            event.ip.as_deref(),
        ),
    )
    .await
    .map_err(|_| {
        anyhow!(
            "recording click for {} timed out after {}ms",
            event.link_id,
            timeout.as_millis()
        )
    })?
    .with_context(|| format!("recording click for {} failed", event.link_id))
}
