//! # Page Cache
//!
//! Bounded pool of resident pages keyed by [`PageId`]. The cache is the
//! enforcement point for both halves of the recovery policy:
//!
//! - **NO-STEAL**: eviction refuses dirty pages. When every resident
//!   page is dirty, admission fails with `CacheFull` instead of writing
//!   uncommitted data to disk.
//! - **FORCE**: [`flush`](PageCache::flush) emits an update record and
//!   forces the log *before* the page goes to its table file, and only
//!   then clears the dirty tag.
//!
//! ## Eviction
//!
//! Second-chance (SIEVE-style) scan: a hand walks the entry list; an
//! entry touched since the last sweep loses its visited bit and survives,
//! the first clean unvisited entry is the victim. Dirty entries are
//! skipped unconditionally. Two full sweeps find a victim whenever at
//! least one clean page is resident; the first sweep can at worst clear
//! every visited bit.
//!
//! ## Locking
//!
//! One mutex serializes every structural operation, including the read
//! and write I/O done on behalf of a page. Entry inspection takes the
//! per-page `RwLock` briefly; the order is always cache monitor first,
//! then page guard. Callers must not invoke cache operations while
//! holding a page guard.

use std::collections::HashMap;
use std::sync::Arc;

use eyre::Result;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::{DEFAULT_CACHE_CAPACITY, EVICTION_SWEEPS};
use crate::errors::StoreError;
use crate::storage::file::Catalog;
use crate::storage::page::{PageId, SharedPage};
use crate::storage::wal::WriteAheadLog;
use crate::txn::TxnId;

struct CacheEntry {
    id: PageId,
    page: SharedPage,
    visited: bool,
}

struct CacheInner {
    entries: Vec<CacheEntry>,
    index: HashMap<PageId, usize>,
    hand: usize,
    capacity: usize,
}

impl CacheInner {
    fn insert_entry(&mut self, id: PageId, page: SharedPage) {
        let idx = self.entries.len();
        self.entries.push(CacheEntry {
            id,
            page,
            visited: true,
        });
        self.index.insert(id, idx);
    }

    fn remove_at(&mut self, idx: usize) -> CacheEntry {
        let entry = self.entries.swap_remove(idx);
        self.index.remove(&entry.id);
        if idx < self.entries.len() {
            let moved = self.entries[idx].id;
            self.index.insert(moved, idx);
        }
        if self.hand >= self.entries.len() {
            self.hand = 0;
        }
        entry
    }

    /// Frees one slot, or fails with `CacheFull` when every resident
    /// page is dirty.
    fn evict_one(&mut self) -> Result<()> {
        let len = self.entries.len();
        for _ in 0..len * EVICTION_SWEEPS {
            let idx = self.hand;
            self.hand = (self.hand + 1) % len;

            let entry = &mut self.entries[idx];
            if entry.page.read().dirtied_by().is_some() {
                continue;
            }
            if entry.visited {
                entry.visited = false;
                continue;
            }

            let victim = self.remove_at(idx).id;
            trace!(page = %victim, "evicted clean page");
            return Ok(());
        }
        Err(StoreError::CacheFull {
            capacity: self.capacity,
        }
        .into())
    }
}

/// Bounded, transaction-aware page pool.
pub struct PageCache {
    inner: Mutex<CacheInner>,
    catalog: Arc<Catalog>,
    log: Arc<dyn WriteAheadLog>,
}

impl PageCache {
    pub fn new(capacity: usize, catalog: Arc<Catalog>, log: Arc<dyn WriteAheadLog>) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(CacheInner {
                entries: Vec::with_capacity(capacity),
                index: HashMap::with_capacity(capacity),
                hand: 0,
                capacity,
            }),
            catalog,
            log,
        }
    }

    pub fn with_default_capacity(catalog: Arc<Catalog>, log: Arc<dyn WriteAheadLog>) -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, catalog, log)
    }

    /// Returns the resident page, admitting it from its table file on a
    /// miss. Admission at capacity evicts one clean page first and fails
    /// with `CacheFull` when there is none.
    pub fn admit(&self, pid: PageId) -> Result<SharedPage> {
        let mut inner = self.inner.lock();

        if let Some(&idx) = inner.index.get(&pid) {
            inner.entries[idx].visited = true;
            return Ok(Arc::clone(&inner.entries[idx].page));
        }

        // A dirty reinsertion can push the pool past capacity, so shrink
        // until the new entry fits within the bound again.
        while inner.entries.len() >= inner.capacity {
            inner.evict_one()?;
        }

        let file = self.catalog.file_for(pid.table)?;
        let mut page = file.read_page(pid)?;
        page.capture_before_image();
        let shared = page.into_shared();
        inner.insert_entry(pid, Arc::clone(&shared));
        trace!(page = %pid, "admitted page");
        Ok(shared)
    }

    /// Tags the page dirty on behalf of `by` and (re)inserts its entry.
    /// A reinsertion may transiently exceed capacity; the next admission
    /// squeezes the pool back down.
    pub fn put_dirty(&self, page: &SharedPage, by: TxnId) {
        let pid = {
            let mut guard = page.write();
            guard.set_dirtied_by(Some(by));
            guard.id()
        };

        let mut inner = self.inner.lock();
        if let Some(&idx) = inner.index.get(&pid) {
            if !Arc::ptr_eq(&inner.entries[idx].page, page) {
                inner.entries[idx].page = Arc::clone(page);
            }
            inner.entries[idx].visited = true;
        } else {
            inner.insert_entry(pid, Arc::clone(page));
        }
    }

    /// Flushes a resident dirty page: update record, log force, page
    /// write, clear dirty tag, in that order. Clean or absent pages are
    /// a no-op.
    pub fn flush(&self, pid: PageId) -> Result<()> {
        let inner = self.inner.lock();
        let Some(&idx) = inner.index.get(&pid) else {
            return Ok(());
        };
        let shared = Arc::clone(&inner.entries[idx].page);
        let mut page = shared.write();
        let Some(txn) = page.dirtied_by() else {
            return Ok(());
        };

        self.log.log_update(txn, pid, page.before_image(), page.data())?;
        self.log.force()?;
        self.catalog.file_for(pid.table)?.write_page(&page)?;
        page.set_dirtied_by(None);
        debug!(page = %pid, %txn, "flushed page");
        Ok(())
    }

    /// Flushes every resident page. Administrative use only: with
    /// NO-STEAL in effect this writes uncommitted data and is never
    /// called from eviction.
    pub fn flush_all(&self) -> Result<()> {
        let pids: Vec<PageId> = self.inner.lock().entries.iter().map(|e| e.id).collect();
        for pid in pids {
            self.flush(pid)?;
        }
        Ok(())
    }

    /// Drops the entry without flushing. Abort and B-tree page reuse.
    pub fn discard(&self, pid: PageId) {
        let mut inner = self.inner.lock();
        if let Some(&idx) = inner.index.get(&pid) {
            inner.remove_at(idx);
            trace!(page = %pid, "discarded page");
        }
    }

    /// Rolls the page back to its before-image, but only when `by` is
    /// the transaction that dirtied it.
    pub fn restore_before_image(&self, pid: PageId, by: TxnId) {
        let inner = self.inner.lock();
        if let Some(&idx) = inner.index.get(&pid) {
            let mut page = inner.entries[idx].page.write();
            if page.dirtied_by() == Some(by) {
                page.restore_before_image();
                debug!(page = %pid, txn = %by, "restored before-image");
            }
        }
    }

    /// Re-snapshots the before-image from current contents. Called right
    /// after a commit flush.
    pub fn refresh_before_image(&self, pid: PageId) {
        let inner = self.inner.lock();
        if let Some(&idx) = inner.index.get(&pid) {
            inner.entries[idx].page.write().capture_before_image();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn is_resident(&self, pid: PageId) -> bool {
        self.inner.lock().index.contains_key(&pid)
    }

    pub fn is_dirty(&self, pid: PageId) -> bool {
        let inner = self.inner.lock();
        match inner.index.get(&pid) {
            Some(&idx) => inner.entries[idx].page.read().dirtied_by().is_some(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file::{MemTable, TableFile};
    use crate::storage::wal::MemoryLog;

    const TABLE: u32 = 3;

    fn setup(capacity: usize) -> (PageCache, Arc<MemoryLog>) {
        let catalog = Arc::new(Catalog::new());
        catalog.register(Arc::new(MemTable::new(TABLE, 16).unwrap()) as Arc<dyn TableFile>);
        let log = Arc::new(MemoryLog::new());
        let cache = PageCache::new(capacity, catalog, Arc::clone(&log) as Arc<dyn WriteAheadLog>);
        (cache, log)
    }

    fn pid(page_no: u32) -> PageId {
        PageId::new(TABLE, page_no)
    }

    #[test]
    fn admit_hit_returns_the_same_page() {
        let (cache, _) = setup(4);
        let first = cache.admit(pid(0)).unwrap();
        let second = cache.admit(pid(0)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn admission_never_exceeds_capacity() {
        let (cache, _) = setup(3);
        for n in 0..10 {
            cache.admit(pid(n)).unwrap();
            assert!(cache.len() <= 3);
        }
    }

    #[test]
    fn eviction_skips_dirty_pages() {
        let (cache, _) = setup(2);
        let txn = TxnId::fresh();

        let a = cache.admit(pid(0)).unwrap();
        {
            a.write().data_mut()[0] = 1;
        }
        cache.put_dirty(&a, txn);
        cache.admit(pid(1)).unwrap();

        // Only the clean page may leave.
        cache.admit(pid(2)).unwrap();
        assert!(cache.is_resident(pid(0)));
        assert!(!cache.is_resident(pid(1)));
        assert!(cache.is_resident(pid(2)));
    }

    #[test]
    fn all_dirty_pool_reports_cache_full() {
        let (cache, _) = setup(2);
        let txn = TxnId::fresh();

        for n in 0..2 {
            let page = cache.admit(pid(n)).unwrap();
            cache.put_dirty(&page, txn);
        }

        let err = cache.admit(pid(2)).unwrap_err();
        assert!(StoreError::is_cache_full(&err));
        assert!(cache.is_resident(pid(0)));
        assert!(cache.is_resident(pid(1)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn flush_logs_before_clearing_dirty() {
        let (cache, log) = setup(4);
        let txn = TxnId::fresh();

        let page = cache.admit(pid(5)).unwrap();
        {
            page.write().data_mut()[0] = 0xEE;
        }
        cache.put_dirty(&page, txn);

        cache.flush(pid(5)).unwrap();

        assert!(!cache.is_dirty(pid(5)));
        assert_eq!(log.records().len(), 1);
        assert_eq!(log.force_count(), 1);
        let rec = &log.records()[0];
        assert_eq!(rec.before[0], 0);
        assert_eq!(rec.after[0], 0xEE);
    }

    #[test]
    fn flush_of_clean_page_is_a_no_op() {
        let (cache, log) = setup(4);
        cache.admit(pid(1)).unwrap();
        cache.flush(pid(1)).unwrap();
        cache.flush(pid(9)).unwrap();
        assert_eq!(log.records().len(), 0);
        assert_eq!(log.force_count(), 0);
    }

    #[test]
    fn discard_drops_without_logging() {
        let (cache, log) = setup(4);
        let txn = TxnId::fresh();
        let page = cache.admit(pid(2)).unwrap();
        cache.put_dirty(&page, txn);

        cache.discard(pid(2));

        assert!(!cache.is_resident(pid(2)));
        assert_eq!(log.records().len(), 0);
    }

    #[test]
    fn restore_only_honors_the_dirtying_transaction() {
        let (cache, _) = setup(4);
        let owner = TxnId::fresh();
        let other = TxnId::fresh();

        let page = cache.admit(pid(0)).unwrap();
        {
            page.write().data_mut()[0] = 9;
        }
        cache.put_dirty(&page, owner);

        cache.restore_before_image(pid(0), other);
        assert_eq!(page.read().data()[0], 9);
        assert!(cache.is_dirty(pid(0)));

        cache.restore_before_image(pid(0), owner);
        assert_eq!(page.read().data()[0], 0);
        assert!(!cache.is_dirty(pid(0)));
    }

    #[test]
    fn refresh_moves_the_rollback_point() {
        let (cache, _) = setup(4);
        let txn = TxnId::fresh();

        let page = cache.admit(pid(0)).unwrap();
        {
            page.write().data_mut()[0] = 5;
        }
        cache.put_dirty(&page, txn);
        cache.flush(pid(0)).unwrap();
        cache.refresh_before_image(pid(0));

        // A later rollback lands on the committed value, not zero.
        {
            let mut guard = page.write();
            guard.data_mut()[0] = 77;
            guard.set_dirtied_by(Some(txn));
        }
        cache.restore_before_image(pid(0), txn);
        assert_eq!(page.read().data()[0], 5);
    }
}
