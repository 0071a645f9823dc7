//! Shared test fixtures: a table file and log that record the order of
//! their I/O calls, so tests can assert the FORCE protocol (log record,
//! log force, page write) rather than just its end state.

// Each integration test compiles its own copy of this module and uses a
// different slice of it.
#![allow(dead_code)]

use std::sync::Arc;

use eyre::Result;
use parking_lot::Mutex;

use quarry::storage::DirtiedPages;
use quarry::{
    Catalog, MemTable, MemoryLog, Page, PageId, RecordId, TableFile, TxnCoordinator, TxnId,
    WriteAheadLog,
};

/// One observed I/O call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoEvent {
    LogUpdate(PageId),
    LogForce,
    PageWrite(PageId),
}

pub type IoTrace = Arc<Mutex<Vec<IoEvent>>>;

/// `WriteAheadLog` that records call order into the shared trace.
pub struct TraceLog {
    inner: MemoryLog,
    trace: IoTrace,
}

impl TraceLog {
    pub fn new(trace: IoTrace) -> Self {
        Self {
            inner: MemoryLog::new(),
            trace,
        }
    }
}

impl WriteAheadLog for TraceLog {
    fn log_update(&self, txn: TxnId, page: PageId, before: &[u8], after: &[u8]) -> Result<()> {
        self.trace.lock().push(IoEvent::LogUpdate(page));
        self.inner.log_update(txn, page, before, after)
    }

    fn force(&self) -> Result<()> {
        self.trace.lock().push(IoEvent::LogForce);
        self.inner.force()
    }
}

/// `TableFile` that records page writes into the shared trace.
pub struct TraceTable {
    inner: MemTable,
    trace: IoTrace,
}

impl TraceTable {
    pub fn new(table: u32, record_len: usize, trace: IoTrace) -> Self {
        Self {
            inner: MemTable::new(table, record_len).unwrap(),
            trace,
        }
    }
}

impl TableFile for TraceTable {
    fn table_id(&self) -> u32 {
        self.inner.table_id()
    }

    fn read_page(&self, pid: PageId) -> Result<Page> {
        self.inner.read_page(pid)
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        self.trace.lock().push(IoEvent::PageWrite(page.id()));
        self.inner.write_page(page)
    }

    fn insert_tuple(
        &self,
        txn: TxnId,
        tuple: &[u8],
        coord: &TxnCoordinator,
    ) -> Result<DirtiedPages> {
        self.inner.insert_tuple(txn, tuple, coord)
    }

    fn delete_tuple(
        &self,
        txn: TxnId,
        rid: RecordId,
        coord: &TxnCoordinator,
    ) -> Result<DirtiedPages> {
        self.inner.delete_tuple(txn, rid, coord)
    }

    fn scan(&self, txn: TxnId, coord: &TxnCoordinator) -> Result<Vec<(RecordId, Vec<u8>)>> {
        self.inner.scan(txn, coord)
    }
}

pub const TABLE: u32 = 1;

pub struct Harness {
    pub coord: Arc<TxnCoordinator>,
    pub trace: IoTrace,
}

/// Coordinator over one spying table and log.
pub fn engine(capacity: usize) -> Harness {
    let trace: IoTrace = Arc::new(Mutex::new(Vec::new()));
    let catalog = Arc::new(Catalog::new());
    catalog.register(Arc::new(TraceTable::new(TABLE, 16, Arc::clone(&trace))));
    let log = Arc::new(TraceLog::new(Arc::clone(&trace)));
    Harness {
        coord: Arc::new(TxnCoordinator::new(capacity, catalog, log)),
        trace,
    }
}

pub fn pid(page_no: u32) -> PageId {
    PageId::new(TABLE, page_no)
}
