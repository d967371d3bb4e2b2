//! Periodic background jobs: catalog refresh and the inactivity sweep.
//!
//! Both loops are owned by [`BackgroundTasks`]; dropping the owner without
//! calling [`BackgroundTasks::shutdown`] leaves them running until the runtime
//! stops.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    catalog::CatalogCache, config::Config, conversation::ConversationStore,
    messaging::port::MessageGateway,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Intervals {
    pub catalog_refresh: Duration,
    pub sweep: Duration,
    pub inactivity_timeout: Duration,
}

impl Intervals {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            catalog_refresh: cfg.catalog_refresh_interval,
            sweep: cfg.sweep_interval,
            inactivity_timeout: cfg.inactivity_timeout,
        }
    }
}

pub struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    /// Start both loops. The catalog refresh fires immediately; the first
    /// sweep runs one interval after start.
    pub fn spawn(
        catalog: Arc<CatalogCache>,
        conversations: Arc<ConversationStore>,
        gateway: Arc<dyn MessageGateway>,
        intervals: Intervals,
    ) -> Self {
        let cancel = CancellationToken::new();

        let refresh = {
            let tok = cancel.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(intervals.catalog_refresh);
                tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                      _ = tok.cancelled() => break,
                      _ = tick.tick() => {
                        // Failures are logged inside and the old snapshot stays.
                        let _ = catalog.refresh().await;
                      }
                    }
                }
                debug!("catalog refresh loop stopped");
            })
        };

        let sweep = {
            let tok = cancel.clone();
            tokio::spawn(async move {
                let start = tokio::time::Instant::now() + intervals.sweep;
                let mut tick = tokio::time::interval_at(start, intervals.sweep);
                tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                      _ = tok.cancelled() => break,
                      _ = tick.tick() => {
                        conversations
                            .sweep_inactive(gateway.as_ref(), intervals.inactivity_timeout, Utc::now())
                            .await;
                      }
                    }
                }
                debug!("inactivity sweep loop stopped");
            })
        };

        info!(
            refresh_secs = intervals.catalog_refresh.as_secs(),
            sweep_secs = intervals.sweep.as_secs(),
            "background tasks started"
        );
        Self {
            cancel,
            handles: vec![("catalog_refresh", refresh), ("inactivity_sweep", sweep)],
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Cancel both loops and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                warn!(task = name, error = %e, "background task ended abnormally");
            }
        }
        info!("background tasks stopped");
    }
}
