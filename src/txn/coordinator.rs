//! # Transaction Coordinator
//!
//! The façade access methods and operators talk to. It composes the
//! page cache and the lock table (the two never reference each other)
//! and drives the commit/abort protocol over them:
//!
//! - **commit**: every page the transaction touched is flushed (log
//!   record, log force, page write) and its before-image re-captured,
//!   then all locks are released. FORCE: a crash after commit returns
//!   needs no redo.
//! - **abort**: every page the transaction dirtied is rolled back to
//!   its before-image in place, then all locks are released. NO-STEAL:
//!   nothing uncommitted ever reached disk, so memory is all there is to
//!   repair.
//!
//! Both are idempotent: completing a transaction clears its page set, so
//! a second completion finds nothing to do.

use std::sync::Arc;

use eyre::Result;
use tracing::debug;

use crate::storage::cache::PageCache;
use crate::storage::file::Catalog;
use crate::storage::page::{PageId, RecordId, SharedPage, TableId};
use crate::storage::wal::WriteAheadLog;
use crate::txn::{LockMode, LockTable, TxnId};

/// Drives page access, tuple mutation and transaction completion.
pub struct TxnCoordinator {
    cache: PageCache,
    locks: LockTable,
    catalog: Arc<Catalog>,
}

impl TxnCoordinator {
    pub fn new(capacity: usize, catalog: Arc<Catalog>, log: Arc<dyn WriteAheadLog>) -> Self {
        Self {
            cache: PageCache::new(capacity, Arc::clone(&catalog), log),
            locks: LockTable::new(),
            catalog,
        }
    }

    /// The underlying cache, for direct inspection (tests, admin
    /// tooling). Access methods do not touch it: they reach pages
    /// through [`get_page`](Self::get_page) so locking comes with them.
    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Admits the page, then acquires the requested lock. Admission runs
    /// first on purpose: a wedged cache fails fast before any waiting.
    ///
    /// A clean page evicted between those two steps is harmless: its
    /// disk copy is identical, so the handle returned here still reads
    /// the committed bytes.
    pub fn get_page(&self, txn: TxnId, pid: PageId, mode: LockMode) -> Result<SharedPage> {
        let page = self.cache.admit(pid)?;
        self.locks.acquire(txn, pid, mode)?;
        Ok(page)
    }

    /// Inserts a tuple via the table's access method. The access method
    /// write-locks every page it touches through
    /// [`get_page`](Self::get_page) (and may block doing so); the pages
    /// it dirtied are then recorded on behalf of `txn`, so a later
    /// commit flushes them.
    pub fn insert_tuple(&self, txn: TxnId, table: TableId, tuple: &[u8]) -> Result<()> {
        let file = self.catalog.file_for(table)?;
        let dirtied = file.insert_tuple(txn, tuple, self)?;
        for page in &dirtied {
            self.cache.put_dirty(page, txn);
        }
        Ok(())
    }

    /// Deletes the tuple named by `rid`; symmetric to insert, including
    /// the write lock on the tuple's page.
    pub fn delete_tuple(&self, txn: TxnId, rid: RecordId) -> Result<()> {
        let file = self.catalog.file_for(rid.page.table)?;
        let dirtied = file.delete_tuple(txn, rid, self)?;
        for page in &dirtied {
            self.cache.put_dirty(page, txn);
        }
        Ok(())
    }

    /// Flushes every page the transaction touched, refreshes the
    /// rollback point of each, and releases all its locks.
    pub fn commit(&self, txn: TxnId) -> Result<()> {
        let pages = self.locks.pages(txn);
        for pid in &pages {
            self.cache.flush(*pid)?;
            self.cache.refresh_before_image(*pid);
        }
        self.locks.release_all(txn);
        debug!(%txn, pages = pages.len(), "committed");
        Ok(())
    }

    /// Rolls back every page the transaction dirtied and releases all
    /// its locks. Also the required follow-up after `Aborted`.
    pub fn abort(&self, txn: TxnId) -> Result<()> {
        let pages = self.locks.pages(txn);
        for pid in &pages {
            self.cache.restore_before_image(*pid, txn);
        }
        self.locks.release_all(txn);
        debug!(%txn, pages = pages.len(), "aborted");
        Ok(())
    }

    /// Drops one lock early, before commit. This breaks two-phase
    /// locking for the page: only callers that can prove the transaction
    /// will never touch it again (e.g. index traversal hand-over-hand)
    /// should use it.
    pub fn release_page(&self, txn: TxnId, pid: PageId) {
        self.locks.release(txn, pid);
    }

    pub fn holds_lock(&self, txn: TxnId, pid: PageId) -> bool {
        self.locks.holds(txn, pid)
    }

    /// Writes every page the transaction touched to disk without
    /// releasing its locks.
    pub fn flush_transaction(&self, txn: TxnId) -> Result<()> {
        for pid in self.locks.pages(txn) {
            self.cache.flush(pid)?;
        }
        Ok(())
    }

    /// Flushes every resident page. Administrative use; defeats NO-STEAL
    /// for anything uncommitted.
    pub fn flush_all_pages(&self) -> Result<()> {
        self.cache.flush_all()
    }

    /// Evicts a page without flushing. Recovery and B-tree page reuse.
    pub fn discard_page(&self, pid: PageId) {
        self.cache.discard(pid);
    }
}
