//! Bulk download: every item of a result set fetched concurrently, progress
//! reported in completion order, failures isolated per item.

mod fetcher;

pub use fetcher::HttpFetcher;

use crate::error::{Error, Result};
use crate::media::{MediaItem, MediaKind};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::FutureExt;
use rand::Rng;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

#[async_trait]
pub trait ItemFetcher: Send + Sync {
    /// Download one item under `filename`, returning the number of bytes saved
    async fn fetch(&self, item: &MediaItem, filename: &str) -> Result<u64>;
}

/// `<prefix>_<YYYYMMDD_HHMMSS>_<disambiguator>_<position>.<ext>`
pub fn item_filename(
    prefix: &str,
    now: DateTime<Local>,
    disambiguator: u32,
    position: usize,
    kind: MediaKind,
) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        prefix,
        now.format("%Y%m%d_%H%M%S"),
        disambiguator,
        position,
        kind.extension()
    )
}

fn random_disambiguator() -> u32 {
    rand::rng().random_range(0..1000)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Saved { bytes: u64 },
    Failed { reason: String },
}

/// Emitted once per finished item.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub position: usize,
    pub filename: String,
    pub outcome: ItemOutcome,
    /// Successful items so far
    pub completed: usize,
    /// Finished items so far, successful or not
    pub finished: usize,
    pub total: usize,
}

#[derive(Debug, Default)]
pub struct BulkReport {
    pub total: usize,
    pub completed: usize,
    pub bytes: u64,
    pub failures: Vec<Error>,
}

pub struct BulkDownloader {
    fetcher: Arc<dyn ItemFetcher>,
    prefix: String,
}

impl BulkDownloader {
    pub fn new(fetcher: Arc<dyn ItemFetcher>, prefix: &str) -> Self {
        Self {
            fetcher,
            prefix: prefix.to_string(),
        }
    }

    fn filename_for(&self, item: &MediaItem, position: usize) -> String {
        item_filename(
            &self.prefix,
            Local::now(),
            random_disambiguator(),
            position,
            item.kind,
        )
    }

    /// Downloads a single item at its 1-based position in the result set.
    pub async fn download_one(&self, item: &MediaItem, position: usize) -> Result<String> {
        let filename = self.filename_for(item, position);
        let bytes = self.fetcher.fetch(item, &filename).await?;
        info!("Saved {} ({} bytes)", filename, bytes);
        Ok(filename)
    }

    /// Launches all downloads at once and joins them as they finish.
    pub async fn download_all<F>(&self, items: &[MediaItem], mut on_progress: F) -> BulkReport
    where
        F: FnMut(&Progress),
    {
        let total = items.len();
        let mut tasks = JoinSet::new();

        for (index, item) in items.iter().enumerate() {
            let position = index + 1;
            let filename = self.filename_for(item, position);
            let fetcher = Arc::clone(&self.fetcher);
            let item = item.clone();

            tasks.spawn(async move {
                let result = AssertUnwindSafe(fetcher.fetch(&item, &filename))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(Error::Internal("download task panicked".into())));
                (position, filename, result)
            });
        }

        info!("Started {} download(s)", total);

        let mut report = BulkReport {
            total,
            ..BulkReport::default()
        };
        let mut finished = 0;

        while let Some(joined) = tasks.join_next().await {
            finished += 1;

            let (position, filename, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!("Download task did not finish: {}", e);
                    report.failures.push(Error::Internal(e.to_string()));
                    continue;
                }
            };

            let outcome = match result {
                Ok(bytes) => {
                    report.completed += 1;
                    report.bytes += bytes;
                    info!("Saved {} ({} bytes)", filename, bytes);
                    ItemOutcome::Saved { bytes }
                }
                Err(e) => {
                    warn!("Failed to download item {} ({}): {}", position, filename, e);
                    let reason = e.to_string();
                    report.failures.push(Error::DownloadItem {
                        position,
                        reason: reason.clone(),
                    });
                    ItemOutcome::Failed { reason }
                }
            };

            on_progress(&Progress {
                position,
                filename,
                outcome,
                completed: report.completed,
                finished,
                total,
            });
        }

        info!(
            "Bulk download finished: {}/{} item(s) saved",
            report.completed, total
        );
        report
    }
}
