//! # Configuration
//!
//! Centralized constants plus the one piece of process-wide state quarry
//! carries: the page size. Cache entries and before-images size their
//! buffers from [`page_size`], so the value must not change while any
//! page is live. The mutators exist for tests that want small pages;
//! production code reads the default and never writes.

pub mod constants;
pub use constants::*;

use std::sync::atomic::{AtomicUsize, Ordering};

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Current page size in bytes.
#[inline]
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::Relaxed)
}

/// Overrides the process-wide page size. Tests only: existing pages keep
/// their old length and will fail size checks if mixed with new ones.
pub fn set_page_size(bytes: usize) {
    PAGE_SIZE.store(bytes, Ordering::Relaxed);
}

/// Restores the default page size. Tests only.
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::Relaxed);
}
