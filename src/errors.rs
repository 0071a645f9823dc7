//! # Error Kinds
//!
//! Fallible operations throughout quarry return [`eyre::Result`]; the
//! variants a caller must branch on are collected in [`StoreError`] and
//! travel inside the report, recoverable with
//! [`downcast_ref`](eyre::Report::downcast_ref).
//!
//! Only two variants carry control-flow meaning: `Aborted` tells the
//! caller its transaction lost a deadlock and must be rolled back, and
//! `CacheFull` means every resident page is dirty so nothing can be
//! evicted. The rest exist so collaborators (table files, the log) have a
//! shared vocabulary when they fail.

use thiserror::Error;

use crate::storage::PageId;
use crate::txn::TxnId;

/// Errors surfaced by the transactional page store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The waits-for graph contains a cycle through this transaction.
    /// The caller must abort the transaction to release its locks.
    #[error("transaction {txn} aborted: waits-for cycle detected acquiring page {page}")]
    Aborted { txn: TxnId, page: PageId },

    /// Every resident page is dirty; NO-STEAL forbids evicting any of them.
    #[error("page cache full: all {capacity} resident pages are dirty")]
    CacheFull { capacity: usize },

    /// Propagated from the table-file or log layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation reported by an access method.
    #[error("{0}")]
    Db(String),
}

impl StoreError {
    /// True when the report wraps a deadlock abort.
    pub fn is_aborted(report: &eyre::Report) -> bool {
        matches!(report.downcast_ref::<StoreError>(), Some(StoreError::Aborted { .. }))
    }

    /// True when the report wraps a wedged cache.
    pub fn is_cache_full(report: &eyre::Report) -> bool {
        matches!(report.downcast_ref::<StoreError>(), Some(StoreError::CacheFull { .. }))
    }
}
