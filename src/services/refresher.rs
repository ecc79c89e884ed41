//! Refresh orchestrator.
//!
//! Drives the fetch -> filter -> publish cycle, at most one at a time.
//! State machine: Idle -> Running -> Success | Error, where the terminal
//! state is what `/status` shows until the next trigger. A failing cycle
//! never touches the published snapshot; readers keep the last good data.

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::FilterRules;
use crate::models::{
    decode_categories, decode_streams, CacheSnapshot, ContentKind, KindCatalog, RefreshState,
    RefreshStatus,
};
use crate::services::filter::filter_catalog;
use crate::services::upstream::{CatalogSource, UpstreamError};
use crate::services::catalog::CatalogStore;

lazy_static! {
    static ref REFRESH_RUNS: IntCounter = register_int_counter!(
        "xtream_proxy_refresh_runs_total",
        "Refresh cycles started"
    )
    .unwrap();
    static ref REFRESH_FAILURES: IntCounter = register_int_counter!(
        "xtream_proxy_refresh_failures_total",
        "Refresh cycles that ended in error"
    )
    .unwrap();
    static ref MALFORMED_ROWS: IntCounter = register_int_counter!(
        "xtream_proxy_malformed_rows_total",
        "Upstream rows skipped for missing or undecodable ids"
    )
    .unwrap();
}

pub struct Refresher<S> {
    source: S,
    store: Arc<CatalogStore>,
    rules: FilterRules,
    status: RwLock<RefreshStatus>,
}

impl<S: CatalogSource + 'static> Refresher<S> {
    pub fn new(source: S, store: Arc<CatalogStore>, rules: FilterRules) -> Self {
        Self {
            source,
            store,
            rules,
            status: RwLock::new(RefreshStatus::default()),
        }
    }

    /// Current status; side-effect free, safe to poll.
    pub async fn status(&self) -> RefreshStatus {
        self.status.read().await.clone()
    }

    /// Start a refresh cycle in the background and return immediately.
    ///
    /// Returns false without starting anything when a cycle is already
    /// running; the check-and-set happens under the status write lock, so
    /// two racing triggers can never both start.
    pub async fn trigger(self: &Arc<Self>) -> bool {
        {
            let mut status = self.status.write().await;
            if status.state == RefreshState::Running {
                return false;
            }
            status.state = RefreshState::Running;
            status.message = "Starting download...".to_string();
        }

        REFRESH_RUNS.inc();
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_cycle().await });
        true
    }

    async fn run_cycle(&self) {
        match self.build_snapshot().await {
            Ok((snapshot, skipped)) => {
                self.store.publish(snapshot).await;
                if let Err(e) = self.store.persist().await {
                    warn!("failed to persist catalog snapshot: {:#}", e);
                }

                let message = if skipped > 0 {
                    format!("Last run successful ({} malformed entries skipped)", skipped)
                } else {
                    "Last run successful".to_string()
                };
                info!(skipped, "refresh complete");

                let mut status = self.status.write().await;
                status.state = RefreshState::Success;
                status.message = message;
                status.last_run = Some(Utc::now());
            }
            Err(e) => {
                REFRESH_FAILURES.inc();
                error!("refresh failed: {}", e);

                let mut status = self.status.write().await;
                status.state = RefreshState::Error;
                status.message = e.to_string();
            }
        }
    }

    /// Fetch, decode, and filter all three kinds into a fresh snapshot,
    /// built entirely off to the side. Any kind's failure aborts the whole
    /// cycle; the previously published snapshot stays current.
    async fn build_snapshot(&self) -> Result<(CacheSnapshot, usize), UpstreamError> {
        let mut snapshot = CacheSnapshot::empty();
        let mut skipped_total = 0usize;

        for kind in ContentKind::ALL {
            self.set_message(format!("Downloading {}...", kind)).await;
            let raw_categories = self.source.fetch_categories(kind).await?;
            let raw_streams = self.source.fetch_streams(kind).await?;

            self.set_message(format!("Filtering {}...", kind)).await;
            let (categories, skipped_cats) = decode_categories(raw_categories);
            let (streams, skipped_streams) = decode_streams(kind, raw_streams);

            let skipped = skipped_cats + skipped_streams;
            if skipped > 0 {
                warn!(kind = %kind, skipped, "skipped malformed upstream rows");
                MALFORMED_ROWS.inc_by(skipped as u64);
                skipped_total += skipped;
            }

            let (categories, streams) =
                filter_catalog(categories, streams, self.rules.for_kind(kind));
            info!(
                kind = %kind,
                categories = categories.len(),
                streams = streams.len(),
                "kind filtered"
            );

            let catalog = KindCatalog {
                categories,
                streams,
            };
            match kind {
                ContentKind::Live => snapshot.live = catalog,
                ContentKind::Vod => snapshot.vod = catalog,
                ContentKind::Series => snapshot.series = catalog,
            }
        }

        snapshot.generated_at = Utc::now();
        Ok((snapshot, skipped_total))
    }

    async fn set_message(&self, message: String) {
        self.status.write().await.message = message;
    }
}
