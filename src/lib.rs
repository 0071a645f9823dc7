//! # Quarry - Transactional Page Cache
//!
//! Quarry is the transactional core of a small relational storage
//! engine: a bounded page cache, strict two-phase page locking with
//! waits-for deadlock detection, and a NO-STEAL / FORCE completion
//! protocol built on per-page before-images.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use quarry::{Catalog, LockMode, MemTable, MemoryLog, TxnCoordinator, TxnId};
//!
//! let catalog = Arc::new(Catalog::new());
//! catalog.register(Arc::new(MemTable::new(1, 16)?));
//! let coord = TxnCoordinator::new(64, catalog, Arc::new(MemoryLog::new()));
//!
//! let txn = TxnId::fresh();
//! coord.insert_tuple(txn, 1, &[0u8; 16])?;
//! coord.commit(txn)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Access methods / operators (callers)   │
//! ├─────────────────────────────────────────┤
//! │        TxnCoordinator (txn module)       │
//! │   get_page · insert · delete · commit    │
//! ├────────────────────┬────────────────────┤
//! │     PageCache      │     LockTable      │
//! │  bounded pool,     │  S/X page locks,   │
//! │  clean-only evict  │  waits-for graph   │
//! ├────────────────────┴────────────────────┤
//! │   TableFile + Catalog │ WriteAheadLog    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The coordinator composes the cache and the lock table; the two know
//! nothing about each other. Table files and the log are collaborator
//! traits; real heap files, B-trees and a durable log live outside
//! this crate.
//!
//! ## Guarantees
//!
//! - Strict 2PL on pages: readers under shared locks always observe the
//!   last committed value; writes are serialized by exclusive locks.
//! - NO-STEAL: an uncommitted page never reaches disk; eviction refuses
//!   dirty pages outright.
//! - FORCE: commit writes the log record and forces the log before each
//!   page write, so a returned commit needs no redo.
//! - Deadlocks are detected by cycle search, not timeouts; the losing
//!   `acquire` reports `Aborted` and the caller rolls back.
//!
//! ## Module Overview
//!
//! - [`storage`]: pages, the cache, table files, the log interface
//! - [`txn`]: transaction ids, the lock table, the coordinator
//! - [`config`]: constants and the process-wide page size
//! - [`errors`]: typed failure kinds carried inside eyre reports

pub mod config;
pub mod errors;
pub mod storage;
pub mod txn;

pub use config::{page_size, reset_page_size, set_page_size};
pub use errors::StoreError;
pub use storage::{
    Catalog, MemTable, MemoryLog, Page, PageCache, PageId, RecordId, SharedPage, TableFile,
    TableId, WriteAheadLog,
};
pub use txn::{LockMode, LockTable, TxnCoordinator, TxnId};
