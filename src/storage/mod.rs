//! # Storage Module
//!
//! The page side of the engine: fixed-width pages, the bounded cache
//! that keeps them resident, the table files they come from, and the
//! write-ahead log interface the cache emits into at flush time.
//!
//! ## Data Flow
//!
//! ```text
//!             get_page / insert / delete
//!                        │
//!                 TxnCoordinator
//!                        │  admit / flush / restore
//!                   PageCache ──────────────┐
//!                    │     │                │ log_update + force
//!           read_page│     │write_page      ▼
//!                    ▼     ▼           WriteAheadLog
//!                TableFile (via Catalog)
//! ```
//!
//! A page enters the cache on first access with its before-image stamped
//! from the disk contents. From then on the cache is the single source
//! of truth: access methods read and mutate the resident copy, commits
//! push it down (log first), aborts copy the before-image back up.
//!
//! ## Policy
//!
//! NO-STEAL / FORCE throughout: eviction refuses dirty pages, commit
//! flushes everything the transaction touched. The trade is bounded
//! cache pressure (a transaction cannot dirty more pages than the cache
//! holds) for trivial recovery (no redo, no undo on disk).

pub mod cache;
pub mod file;
pub mod page;
pub mod wal;

pub use cache::PageCache;
pub use file::{Catalog, DirtiedPages, MemTable, TableFile};
pub use page::{Page, PageId, RecordId, SharedPage, TableId};
pub use wal::{MemoryLog, UpdateRecord, WriteAheadLog};
