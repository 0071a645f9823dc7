//! # Write-Ahead Log Interface
//!
//! The cache emits one update record per dirty page at flush time,
//! `(txn, page, before-image, after-image)`, and forces the log before
//! the page itself is written. That ordering is the whole of the FORCE
//! contract; the log's on-disk format, segmentation and replay live
//! outside this crate.
//!
//! [`MemoryLog`] is the in-process implementation used by tests, benches
//! and embedders that bring their own durability: it retains every record
//! and counts forces so ordering can be asserted against it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use eyre::Result;

use crate::storage::PageId;
use crate::txn::TxnId;

/// Sink for page update records. Implementations must tolerate
/// concurrent callers; the cache serializes per-page records itself.
pub trait WriteAheadLog: Send + Sync {
    /// Appends an update record carrying both images of the page.
    fn log_update(&self, txn: TxnId, page: PageId, before: &[u8], after: &[u8]) -> Result<()>;

    /// Makes every record appended so far durable.
    fn force(&self) -> Result<()>;
}

/// One logged page update.
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    pub txn: TxnId,
    pub page: PageId,
    pub before: Vec<u8>,
    pub after: Vec<u8>,
}

/// In-memory log that remembers all records and counts forces.
#[derive(Default)]
pub struct MemoryLog {
    records: Mutex<Vec<UpdateRecord>>,
    forces: AtomicU64,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record appended so far.
    pub fn records(&self) -> Vec<UpdateRecord> {
        self.records.lock().clone()
    }

    pub fn force_count(&self) -> u64 {
        self.forces.load(Ordering::Relaxed)
    }

    /// True if some record for `page` carries exactly these images.
    pub fn contains_update(&self, page: PageId, before: &[u8], after: &[u8]) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.page == page && r.before == before && r.after == after)
    }
}

impl WriteAheadLog for MemoryLog {
    fn log_update(&self, txn: TxnId, page: PageId, before: &[u8], after: &[u8]) -> Result<()> {
        self.records.lock().push(UpdateRecord {
            txn,
            page,
            before: before.to_vec(),
            after: after.to_vec(),
        });
        Ok(())
    }

    fn force(&self) -> Result<()> {
        self.forces.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
