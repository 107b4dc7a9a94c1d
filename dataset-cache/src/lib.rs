// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Process-wide cache of the published bills snapshot.
//!
//! The snapshot is fetched lazily on first use and at most once per process.
//! Concurrent first callers share one in-flight attempt; a failed attempt
//! leaves the cache empty so a later call can try again.

pub mod snapshot;
pub mod source;

use core_types::{AddressError, AggregateTotals, DepositRecord, TonAddress};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, error, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub use snapshot::Dataset;
pub use source::{HttpSnapshotSource, SnapshotSource, decompress};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("snapshot fetch from {url} returned HTTP {status}")]
    Status { status: u16, url: String },
    #[error("snapshot decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("malformed snapshot payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("invalid amount in field {field}: {value}")]
    InvalidAmount { field: &'static str, value: String },
    #[error("invalid address '{value}' in snapshot: {source}")]
    InvalidAddress {
        value: String,
        #[source]
        source: AddressError,
    },
}

/// Failure of a load attempt, shared by every caller that awaited it.
pub type SharedDatasetError = Arc<DatasetError>;

type LoadFuture = Shared<BoxFuture<'static, Result<Arc<Dataset>, SharedDatasetError>>>;

enum Slot {
    Empty,
    Loading { attempt: u64, pending: LoadFuture },
    Loaded(Arc<Dataset>),
}

pub struct DatasetCache {
    source: Arc<dyn SnapshotSource>,
    slot: Mutex<Slot>,
    attempts: AtomicU64,
}

impl DatasetCache {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            source,
            slot: Mutex::new(Slot::Empty),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn http(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self::new(Arc::new(HttpSnapshotSource::new(client, url)))
    }

    /// Load the snapshot if needed. Idempotent and single-flight.
    pub async fn load(&self) -> Result<Arc<Dataset>, SharedDatasetError> {
        let (attempt, pending) = {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Loaded(dataset) => return Ok(Arc::clone(dataset)),
                Slot::Loading { attempt, pending } => (*attempt, pending.clone()),
                Slot::Empty => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let pending = fetch_dataset(Arc::clone(&self.source)).boxed().shared();
                    *slot = Slot::Loading {
                        attempt,
                        pending: pending.clone(),
                    };
                    (attempt, pending)
                }
            }
        };

        let result = pending.await;

        let mut slot = self.slot.lock();
        if matches!(&*slot, Slot::Loading { attempt: current, .. } if *current == attempt) {
            *slot = match &result {
                Ok(dataset) => Slot::Loaded(Arc::clone(dataset)),
                Err(_) => Slot::Empty,
            };
        }
        result
    }

    /// Find the deposit for `address`. Unparseable addresses are simply absent.
    pub async fn lookup(&self, address: &str) -> Result<Option<DepositRecord>, SharedDatasetError> {
        let dataset = self.load().await?;
        match TonAddress::parse(address) {
            Ok(parsed) => Ok(dataset.get(&parsed).cloned()),
            Err(err) => {
                debug!("lookup of malformed address '{}': {}", address, err);
                Ok(None)
            }
        }
    }

    pub async fn lookup_address(
        &self,
        address: &TonAddress,
    ) -> Result<Option<DepositRecord>, SharedDatasetError> {
        let dataset = self.load().await?;
        Ok(dataset.get(address).cloned())
    }

    pub async fn aggregate_totals(&self) -> Result<AggregateTotals, SharedDatasetError> {
        let dataset = self.load().await?;
        Ok(dataset.totals().clone())
    }

    /// Whether `address` has a deposit at all.
    pub async fn validate(&self, address: &str) -> Result<bool, SharedDatasetError> {
        Ok(self.lookup(address).await?.is_some())
    }

    pub fn is_loaded(&self) -> bool {
        matches!(&*self.slot.lock(), Slot::Loaded(_))
    }

    /// Number of fetch attempts started so far.
    pub fn load_attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

async fn fetch_dataset(source: Arc<dyn SnapshotSource>) -> Result<Arc<Dataset>, SharedDatasetError> {
    let result = async {
        let compressed = source.fetch().await?;
        let raw = decompress(&compressed).await?;
        Dataset::from_json(&raw)
    }
    .await;
    match result {
        Ok(dataset) => {
            info!(
                "loaded bills snapshot from {}: {} depositors",
                source.describe(),
                dataset.len()
            );
            Ok(Arc::new(dataset))
        }
        Err(err) => {
            error!("failed to load bills snapshot from {}: {}", source.describe(), err);
            Err(Arc::new(err))
        }
    }
}
