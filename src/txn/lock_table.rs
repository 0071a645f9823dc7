//! # Lock Table
//!
//! Page-level shared/exclusive locks with blocking acquisition and
//! deadlock detection. Three pieces of state:
//!
//! - a per-page monitor (`Mutex<LockState>` + `Condvar`), created lazily
//!   the first time a page is locked;
//! - the waits-for graph: `waiter -> holders` edges, written each time a
//!   request blocks and erased on grant or abort;
//! - per-transaction page sets, so commit/abort know what to release.
//!
//! The graph and the page sets share one short-lived mutex (the table
//! monitor). When a page monitor and the table monitor are both needed,
//! the page monitor is taken first, everywhere.
//!
//! ## Deadlock detection
//!
//! Before a request sleeps it replaces its outgoing edges with the
//! current set of conflicting holders, then runs a depth-first search
//! from itself. The cycle predicate is membership in the DFS recursion
//! stack, not mere revisitation: two waiters converging on one holder is
//! a diamond, not a deadlock. A cycle fails the request with `Aborted`;
//! the caller is expected to roll the transaction back, which releases
//! its locks and wakes the survivors.
//!
//! Fairness is not guaranteed: every release notifies all waiters on
//! that page and they race to re-evaluate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use eyre::Result;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::errors::StoreError;
use crate::storage::PageId;
use crate::txn::{LockMode, TxnId};

#[derive(Default)]
struct LockState {
    shared: HashSet<TxnId>,
    exclusive: Option<TxnId>,
}

impl LockState {
    /// Grants in place when compatible. Handles re-entry (both modes)
    /// and the sole-reader upgrade.
    fn try_grant(&mut self, txn: TxnId, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => match self.exclusive {
                // An exclusive holder re-reads without touching the
                // shared set.
                Some(holder) => holder == txn,
                None => {
                    self.shared.insert(txn);
                    true
                }
            },
            LockMode::Exclusive => {
                if self.exclusive == Some(txn) {
                    return true;
                }
                if self.exclusive.is_none() && self.shared.iter().all(|h| *h == txn) {
                    // Upgrade: the shared claim is swapped for the
                    // exclusive one atomically under the page monitor.
                    self.shared.remove(&txn);
                    self.exclusive = Some(txn);
                    return true;
                }
                false
            }
        }
    }

    /// Holders that prevent `txn` from acquiring `mode` right now.
    fn conflicting_holders(&self, txn: TxnId, mode: LockMode) -> Vec<TxnId> {
        match mode {
            LockMode::Shared => self
                .exclusive
                .into_iter()
                .filter(|h| *h != txn)
                .collect(),
            LockMode::Exclusive => {
                let mut holders: Vec<TxnId> =
                    self.shared.iter().copied().filter(|h| *h != txn).collect();
                if let Some(x) = self.exclusive {
                    if x != txn {
                        holders.push(x);
                    }
                }
                holders
            }
        }
    }

    fn release(&mut self, txn: TxnId) -> bool {
        let was_shared = self.shared.remove(&txn);
        let was_exclusive = self.exclusive == Some(txn);
        if was_exclusive {
            self.exclusive = None;
        }
        was_shared || was_exclusive
    }
}

#[derive(Default)]
struct PageLock {
    state: Mutex<LockState>,
    granted: Condvar,
}

#[derive(Default)]
struct TableMeta {
    /// waiter -> set of holders it is blocked on.
    waits_for: HashMap<TxnId, HashSet<TxnId>>,
    /// every page a transaction has been granted a lock on.
    holdings: HashMap<TxnId, HashSet<PageId>>,
}

impl TableMeta {
    fn has_cycle_through(&self, start: TxnId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        self.dfs(start, &mut visited, &mut stack)
    }

    fn dfs(&self, node: TxnId, visited: &mut HashSet<TxnId>, stack: &mut HashSet<TxnId>) -> bool {
        visited.insert(node);
        stack.insert(node);
        if let Some(nexts) = self.waits_for.get(&node) {
            for &next in nexts {
                if stack.contains(&next) {
                    return true;
                }
                if !visited.contains(&next) && self.dfs(next, visited, stack) {
                    return true;
                }
            }
        }
        stack.remove(&node);
        false
    }
}

/// Per-page reader/writer locks with waits-for deadlock detection.
#[derive(Default)]
pub struct LockTable {
    pages: Mutex<HashMap<PageId, Arc<PageLock>>>,
    meta: Mutex<TableMeta>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn page_lock(&self, pid: PageId) -> Arc<PageLock> {
        Arc::clone(self.pages.lock().entry(pid).or_default())
    }

    /// Blocks until `txn` holds `mode` on `pid`, or fails with `Aborted`
    /// when waiting would close a cycle in the waits-for graph.
    pub fn acquire(&self, txn: TxnId, pid: PageId, mode: LockMode) -> Result<()> {
        let lock = self.page_lock(pid);
        let mut state = lock.state.lock();
        loop {
            if state.try_grant(txn, mode) {
                let mut meta = self.meta.lock();
                meta.waits_for.remove(&txn);
                meta.holdings.entry(txn).or_default().insert(pid);
                trace!(%txn, page = %pid, ?mode, "lock granted");
                return Ok(());
            }

            let holders = state.conflicting_holders(txn, mode);
            {
                let mut meta = self.meta.lock();
                let edges = meta.waits_for.entry(txn).or_default();
                edges.clear();
                edges.extend(holders.iter().copied());
                if meta.has_cycle_through(txn) {
                    meta.waits_for.remove(&txn);
                    debug!(%txn, page = %pid, ?mode, "waits-for cycle, aborting waiter");
                    return Err(StoreError::Aborted { txn, page: pid }.into());
                }
            }

            trace!(%txn, page = %pid, ?mode, holders = holders.len(), "lock conflict, waiting");
            lock.granted.wait(&mut state);
        }
    }

    /// Drops any claim `txn` has on `pid` and wakes that page's waiters.
    /// No-op when nothing is held.
    pub fn release(&self, txn: TxnId, pid: PageId) {
        let lock = self.pages.lock().get(&pid).cloned();
        if let Some(lock) = lock {
            let mut state = lock.state.lock();
            if state.release(txn) {
                lock.granted.notify_all();
            }
        }
        let mut meta = self.meta.lock();
        if let Some(set) = meta.holdings.get_mut(&txn) {
            set.remove(&pid);
        }
    }

    /// Releases everything `txn` holds, drops its page set, and removes
    /// it from the waits-for graph entirely (both edge directions).
    pub fn release_all(&self, txn: TxnId) {
        let held: Vec<PageId> = {
            let mut meta = self.meta.lock();
            meta.holdings
                .remove(&txn)
                .map(|set| set.into_iter().collect())
                .unwrap_or_default()
        };

        for pid in &held {
            let lock = self.pages.lock().get(pid).cloned();
            if let Some(lock) = lock {
                let mut state = lock.state.lock();
                if state.release(txn) {
                    lock.granted.notify_all();
                }
            }
        }

        let mut meta = self.meta.lock();
        meta.waits_for.remove(&txn);
        for edges in meta.waits_for.values_mut() {
            edges.remove(&txn);
        }
        if !held.is_empty() {
            trace!(%txn, pages = held.len(), "released all locks");
        }
    }

    /// Whether `txn` currently has `pid` in its page set.
    pub fn holds(&self, txn: TxnId, pid: PageId) -> bool {
        self.meta
            .lock()
            .holdings
            .get(&txn)
            .is_some_and(|set| set.contains(&pid))
    }

    /// Owned snapshot of `txn`'s page set; safe to iterate while other
    /// transactions commit.
    pub fn pages(&self, txn: TxnId) -> Vec<PageId> {
        self.meta
            .lock()
            .holdings
            .get(&txn)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}
