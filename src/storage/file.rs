//! # Table Files and the Catalog
//!
//! Access methods sit below the cache: the cache pulls whole pages from a
//! [`TableFile`] on a miss and pushes them back at flush time. Mutation
//! entry points (`insert_tuple` / `delete_tuple`) run the other way:
//! the coordinator delegates to the file, which reaches pages only
//! through the coordinator it is handed, so every access observes cached
//! state and carries the page lock the operation needs. The file returns
//! the pages it dirtied.
//!
//! The [`Catalog`] is the registry mapping a [`TableId`] to its file. It
//! is shared (`Arc`) between the cache and the coordinator.
//!
//! [`MemTable`] is a deliberately simple access method: fixed-width
//! records in slots, one occupancy byte per slot, backed by an in-memory
//! "disk". Real heap or B-tree files live outside this crate; this one
//! exists so the transactional core can be exercised end to end.

use std::collections::HashMap;
use std::sync::Arc;

use eyre::{bail, ensure, Result};
use parking_lot::{Mutex, RwLock};
use smallvec::{smallvec, SmallVec};

use crate::config::page_size;
use crate::errors::StoreError;
use crate::storage::page::{Page, PageId, RecordId, SharedPage, TableId};
use crate::txn::{LockMode, TxnCoordinator, TxnId};

/// Pages dirtied by a single tuple operation. Almost always one.
pub type DirtiedPages = SmallVec<[SharedPage; 2]>;

/// One table's storage, as seen by the cache and the coordinator.
///
/// `read_page` / `write_page` move whole pages between memory and the
/// backing store. The tuple operations receive the coordinator and must
/// acquire their page locks through it: an exclusive lock on every page
/// insert/delete touches, shared locks for scans. They return every page
/// they dirtied and leave dirty-marking to the caller.
pub trait TableFile: Send + Sync {
    fn table_id(&self) -> TableId;

    /// Reads one page from the backing store. Pages past the current end
    /// of the file come back zeroed.
    fn read_page(&self, pid: PageId) -> Result<Page>;

    /// Writes one page to the backing store.
    fn write_page(&self, page: &Page) -> Result<()>;

    /// Adds a tuple somewhere in the file, growing it if necessary.
    /// Write-locks every page it touches; may block on those locks.
    fn insert_tuple(&self, txn: TxnId, tuple: &[u8], coord: &TxnCoordinator)
        -> Result<DirtiedPages>;

    /// Removes the tuple named by `rid`, under a write lock on its page.
    fn delete_tuple(&self, txn: TxnId, rid: RecordId, coord: &TxnCoordinator)
        -> Result<DirtiedPages>;

    /// All live tuples, in file order, read under shared locks.
    fn scan(&self, txn: TxnId, coord: &TxnCoordinator) -> Result<Vec<(RecordId, Vec<u8>)>>;
}

/// Registry of table files, keyed by table id.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<TableId, Arc<dyn TableFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the file serving `file.table_id()`.
    pub fn register(&self, file: Arc<dyn TableFile>) {
        self.tables.write().insert(file.table_id(), file);
    }

    pub fn file_for(&self, table: TableId) -> Result<Arc<dyn TableFile>> {
        match self.tables.read().get(&table) {
            Some(file) => Ok(Arc::clone(file)),
            None => bail!("no table file registered for table {table}"),
        }
    }
}

struct MemTableState {
    /// page_no -> last flushed contents. Absent pages read as zeroes.
    disk: HashMap<u32, Box<[u8]>>,
    page_count: u32,
}

/// In-memory table file with fixed-width records.
///
/// Slot layout within a page: `stride = 1 + record_len` bytes per slot,
/// the first byte is an occupancy flag. No header, no variable-length
/// records; tuple representation is the embedder's concern.
pub struct MemTable {
    table: TableId,
    record_len: usize,
    slots_per_page: usize,
    state: Mutex<MemTableState>,
}

impl MemTable {
    pub fn new(table: TableId, record_len: usize) -> Result<Self> {
        let stride = record_len + 1;
        ensure!(
            record_len > 0 && stride <= page_size(),
            "record length {record_len} does not fit a {} byte page",
            page_size()
        );
        Ok(Self {
            table,
            record_len,
            slots_per_page: page_size() / stride,
            state: Mutex::new(MemTableState {
                disk: HashMap::new(),
                page_count: 0,
            }),
        })
    }

    pub fn record_len(&self) -> usize {
        self.record_len
    }

    /// Pages currently in the file (allocated, not necessarily flushed).
    pub fn page_count(&self) -> u32 {
        self.state.lock().page_count
    }

    fn stride(&self) -> usize {
        self.record_len + 1
    }

    fn slot_offset(&self, slot: u16) -> usize {
        slot as usize * self.stride()
    }

    /// Writes `tuple` into the first free slot of `page`, if any.
    fn try_insert_in(&self, page: &mut Page, tuple: &[u8]) -> Option<RecordId> {
        for slot in 0..self.slots_per_page as u16 {
            let off = self.slot_offset(slot);
            if page.data()[off] == 0 {
                let data = page.data_mut();
                data[off] = 1;
                data[off + 1..off + 1 + tuple.len()].copy_from_slice(tuple);
                return Some(RecordId::new(page.id(), slot));
            }
        }
        None
    }
}

impl TableFile for MemTable {
    fn table_id(&self) -> TableId {
        self.table
    }

    fn read_page(&self, pid: PageId) -> Result<Page> {
        ensure!(pid.table == self.table, "page {pid} belongs to another table");
        let state = self.state.lock();
        match state.disk.get(&pid.page_no) {
            Some(bytes) => Page::new(pid, bytes.clone()),
            None => Ok(Page::zeroed(pid)),
        }
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        ensure!(
            page.id().table == self.table,
            "page {} belongs to another table",
            page.id()
        );
        let mut state = self.state.lock();
        state.disk.insert(page.id().page_no, page.data().into());
        state.page_count = state.page_count.max(page.id().page_no + 1);
        Ok(())
    }

    fn insert_tuple(
        &self,
        txn: TxnId,
        tuple: &[u8],
        coord: &TxnCoordinator,
    ) -> Result<DirtiedPages> {
        if tuple.len() != self.record_len {
            return Err(StoreError::Db(format!(
                "tuple is {} bytes, table {} stores {}-byte records",
                tuple.len(),
                self.table,
                self.record_len
            ))
            .into());
        }

        // Existing pages first, write-locked through the coordinator.
        // The backing-store mutex is never held across a coordinator
        // call.
        let page_count = self.state.lock().page_count;
        for page_no in 0..page_count {
            let shared = coord.get_page(
                txn,
                PageId::new(self.table, page_no),
                LockMode::Exclusive,
            )?;
            let mut page = shared.write();
            if self.try_insert_in(&mut page, tuple).is_some() {
                drop(page);
                return Ok(smallvec![shared]);
            }
        }

        // Every page is full: grow the file by one page. The fresh page
        // reads as zeroes, so admission stamps a zeroed before-image.
        let pid = {
            let mut state = self.state.lock();
            let pid = PageId::new(self.table, state.page_count);
            state.page_count += 1;
            pid
        };
        let shared = coord.get_page(txn, pid, LockMode::Exclusive)?;
        {
            let mut page = shared.write();
            self.try_insert_in(&mut page, tuple)
                .expect("fresh page must have a free slot");
        }
        Ok(smallvec![shared])
    }

    fn delete_tuple(
        &self,
        txn: TxnId,
        rid: RecordId,
        coord: &TxnCoordinator,
    ) -> Result<DirtiedPages> {
        ensure!(
            rid.page.table == self.table,
            "record {rid:?} belongs to another table"
        );
        ensure!(
            (rid.slot as usize) < self.slots_per_page,
            "slot {} out of range for table {}",
            rid.slot,
            self.table
        );

        let shared = coord.get_page(txn, rid.page, LockMode::Exclusive)?;
        {
            let mut page = shared.write();
            let off = self.slot_offset(rid.slot);
            if page.data()[off] == 0 {
                return Err(StoreError::Db(format!("no tuple at {rid:?}")).into());
            }
            let data = page.data_mut();
            data[off] = 0;
            data[off + 1..off + 1 + self.record_len].fill(0);
        }
        Ok(smallvec![shared])
    }

    fn scan(&self, txn: TxnId, coord: &TxnCoordinator) -> Result<Vec<(RecordId, Vec<u8>)>> {
        let page_count = self.state.lock().page_count;
        let mut out = Vec::new();
        for page_no in 0..page_count {
            let shared = coord.get_page(
                txn,
                PageId::new(self.table, page_no),
                LockMode::Shared,
            )?;
            let page = shared.read();
            for slot in 0..self.slots_per_page as u16 {
                let off = self.slot_offset(slot);
                if page.data()[off] != 0 {
                    let rec = page.data()[off + 1..off + 1 + self.record_len].to_vec();
                    out.push((RecordId::new(page.id(), slot), rec));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::wal::MemoryLog;

    fn setup(capacity: usize, record_len: usize) -> (Arc<TxnCoordinator>, Arc<MemTable>) {
        let catalog = Arc::new(Catalog::new());
        let table = Arc::new(MemTable::new(7, record_len).unwrap());
        catalog.register(Arc::clone(&table) as Arc<dyn TableFile>);
        let coord = Arc::new(TxnCoordinator::new(
            capacity,
            catalog,
            Arc::new(MemoryLog::new()),
        ));
        (coord, table)
    }

    #[test]
    fn catalog_rejects_unknown_table() {
        let catalog = Catalog::new();
        assert!(catalog.file_for(99).is_err());
    }

    #[test]
    fn missing_pages_read_as_zeroes() {
        let (_, table) = setup(4, 16);
        let page = table.read_page(PageId::new(7, 3)).unwrap();
        assert!(page.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn insert_write_locks_its_page_and_scan_sees_the_tuple() {
        let (coord, table) = setup(4, 16);
        let txn = TxnId::fresh();
        let tuple = [0xAB; 16];

        let dirtied = table.insert_tuple(txn, &tuple, &coord).unwrap();
        assert_eq!(dirtied.len(), 1);
        let pid = dirtied[0].read().id();
        assert!(coord.holds_lock(txn, pid));

        let rows = table.scan(txn, &coord).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, tuple.to_vec());
    }

    #[test]
    fn insert_grows_past_a_full_page() {
        let (coord, table) = setup(8, 16);
        let txn = TxnId::fresh();
        let per_page = page_size() / 17;

        for i in 0..per_page + 1 {
            table.insert_tuple(txn, &[i as u8; 16], &coord).unwrap();
        }

        assert_eq!(table.page_count(), 2);
        assert_eq!(table.scan(txn, &coord).unwrap().len(), per_page + 1);
    }

    #[test]
    fn delete_frees_the_slot() {
        let (coord, table) = setup(4, 8);
        let txn = TxnId::fresh();

        table.insert_tuple(txn, &[1u8; 8], &coord).unwrap();
        let (rid, _) = table.scan(txn, &coord).unwrap().remove(0);

        table.delete_tuple(txn, rid, &coord).unwrap();
        assert!(table.scan(txn, &coord).unwrap().is_empty());

        let err = table.delete_tuple(txn, rid, &coord).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Db(_))
        ));
    }

    #[test]
    fn wrong_width_tuple_is_rejected() {
        let (coord, table) = setup(4, 8);
        let err = table
            .insert_tuple(TxnId::fresh(), &[0u8; 5], &coord)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Db(_))
        ));
    }
}
