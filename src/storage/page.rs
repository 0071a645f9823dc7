//! # Pages and Identifiers
//!
//! A [`Page`] is a fixed-width block of bytes plus the bookkeeping the
//! cache needs for the NO-STEAL / FORCE policy: which transaction (if
//! any) last dirtied it, and an owned **before-image**: a snapshot of
//! the contents as of the last commit or the initial read from disk.
//!
//! The before-image never shares storage with the live buffer. Aborting
//! a transaction copies the before-image back over the data; committing
//! re-captures the before-image from the freshly flushed data.
//!
//! ## Identity
//!
//! [`PageId`] names a `(table, page_no)` pair; [`RecordId`] extends it
//! with a slot number so a tuple can be deleted without re-scanning.
//!
//! ## Sharing
//!
//! Pages circulate as [`SharedPage`] (`Arc<RwLock<Page>>`). The `RwLock`
//! only guards the in-memory representation; whether a transaction may
//! read or mutate the contents at all is decided by the page-level lock
//! table, not here.

use std::fmt;
use std::sync::Arc;

use eyre::{ensure, Result};
use parking_lot::RwLock;

use crate::config::page_size;
use crate::txn::TxnId;

/// Identifies a table managed by the catalog.
pub type TableId = u32;

/// Identifies one page of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table: TableId,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table: TableId, page_no: u32) -> Self {
        Self { table, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.page_no)
    }
}

/// Names a tuple: the page it lives on plus its slot within the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page: PageId,
    pub slot: u16,
}

impl RecordId {
    pub fn new(page: PageId, slot: u16) -> Self {
        Self { page, slot }
    }
}

/// A page handle shared between the cache and its callers.
pub type SharedPage = Arc<RwLock<Page>>;

/// A fixed-width page with dirty tracking and an owned before-image.
pub struct Page {
    id: PageId,
    data: Box<[u8]>,
    before: Box<[u8]>,
    dirtied_by: Option<TxnId>,
}

impl Page {
    /// Wraps bytes read from disk. The before-image starts as a copy of
    /// the initial contents.
    pub fn new(id: PageId, data: Box<[u8]>) -> Result<Self> {
        ensure!(
            data.len() == page_size(),
            "page {} has {} bytes, expected {}",
            id,
            data.len(),
            page_size()
        );
        let before = data.clone();
        Ok(Self {
            id,
            data,
            before,
            dirtied_by: None,
        })
    }

    /// A freshly allocated all-zero page (both images zeroed).
    pub fn zeroed(id: PageId) -> Self {
        let data = vec![0u8; page_size()].into_boxed_slice();
        let before = data.clone();
        Self {
            id,
            data,
            before,
            dirtied_by: None,
        }
    }

    pub fn into_shared(self) -> SharedPage {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable view of the contents. Callers are expected to hold the
    /// page's exclusive lock and to mark the page dirty afterwards via
    /// the cache; mutating the bytes alone does not set the dirty tag.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn before_image(&self) -> &[u8] {
        &self.before
    }

    /// The transaction that last dirtied this page, if any.
    pub fn dirtied_by(&self) -> Option<TxnId> {
        self.dirtied_by
    }

    pub fn set_dirtied_by(&mut self, txn: Option<TxnId>) {
        self.dirtied_by = txn;
    }

    /// Re-snapshots the before-image from the current contents. Done on
    /// first read from disk and again right after a commit flush.
    pub fn capture_before_image(&mut self) {
        self.before.copy_from_slice(&self.data);
    }

    /// Copies the before-image back over the live contents and clears
    /// the dirty tag. The rollback half of NO-STEAL.
    pub fn restore_before_image(&mut self) {
        self.data.copy_from_slice(&self.before);
        self.dirtied_by = None;
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("len", &self.data.len())
            .field("dirtied_by", &self.dirtied_by)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::page_size;

    fn page_with_byte(b: u8) -> Page {
        let mut p = Page::zeroed(PageId::new(1, 0));
        p.data_mut()[0] = b;
        p
    }

    #[test]
    fn new_rejects_wrong_length() {
        let data = vec![0u8; 7].into_boxed_slice();
        assert!(Page::new(PageId::new(1, 0), data).is_err());
    }

    #[test]
    fn before_image_is_an_independent_copy() {
        let mut p = page_with_byte(42);
        assert_eq!(p.before_image()[0], 0);

        p.capture_before_image();
        p.data_mut()[0] = 99;
        assert_eq!(p.before_image()[0], 42);
    }

    #[test]
    fn restore_rolls_back_and_clears_dirty() {
        let mut p = Page::zeroed(PageId::new(1, 3));
        p.data_mut()[10] = 7;
        p.set_dirtied_by(Some(crate::txn::TxnId::fresh()));

        p.restore_before_image();

        assert_eq!(p.data()[10], 0);
        assert_eq!(p.dirtied_by(), None);
        assert_eq!(p.data().len(), page_size());
    }

    #[test]
    fn zeroed_page_matches_page_size() {
        let p = Page::zeroed(PageId::new(2, 9));
        assert_eq!(p.data().len(), page_size());
        assert_eq!(p.before_image().len(), page_size());
    }
}
