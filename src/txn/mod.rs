//! # Transactions
//!
//! Transaction identity and the page-locking layer. A transaction in
//! quarry is nothing more than a [`TxnId`]: it comes into existence when
//! a thread mints one and first acquires a lock, and it disappears when
//! [`TxnCoordinator::commit`](crate::txn::TxnCoordinator::commit) or
//! [`abort`](crate::txn::TxnCoordinator::abort) releases everything it
//! held. There is no transaction object to carry around; each application
//! thread owns at most one in-progress id at a time.
//!
//! ## Locking model
//!
//! Strict two-phase locking on pages: shared locks admit any number of
//! readers, an exclusive lock admits a single writer and nothing else.
//! Locks are held until commit/abort. Waiting is done on a per-page
//! monitor; deadlocks are found by cycle search over a waits-for graph
//! rather than by timeout.

mod coordinator;
mod lock_table;

pub use coordinator::TxnCoordinator;
pub use lock_table::LockTable;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque per-transaction handle, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(u64);

impl TxnId {
    /// Mints a fresh id from the process-wide counter.
    pub fn fresh() -> Self {
        Self(NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn#{}", self.0)
    }
}

/// Requested access level for a page lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Multiple readers may hold this simultaneously.
    Shared,
    /// Single writer, excludes all other holders.
    Exclusive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txn_ids_are_unique_and_ordered() {
        let a = TxnId::fresh();
        let b = TxnId::fresh();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn txn_id_display() {
        let t = TxnId::fresh();
        assert_eq!(format!("{t}"), format!("txn#{}", t.as_u64()));
    }
}
