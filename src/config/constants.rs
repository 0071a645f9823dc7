//! # Configuration Constants
//!
//! This module centralizes the numeric configuration values for quarry.
//! Constants that depend on each other are co-located and their
//! relationships documented, so a change to one can be checked against
//! the others.
//!
//! ## Dependency Graph
//!
//! ```text
//! DEFAULT_PAGE_SIZE (4096 bytes)
//!       │
//!       └─> every Page buffer and before-image is exactly this long;
//!           the runtime value lives behind config::page_size() and is
//!           mutable only from tests.
//!
//! DEFAULT_CACHE_CAPACITY (50 pages)
//!       │
//!       └─> upper bound on resident pages. Because eviction refuses
//!           dirty pages, a transaction that dirties more than this many
//!           pages before committing will observe CacheFull.
//!
//! EVICTION_SWEEPS (2)
//!       │
//!       └─> full passes of the second-chance hand. The first pass may
//!           only clear visited bits; the second is then guaranteed to
//!           find a victim whenever at least one clean page is resident.
//! ```

/// Bytes per page, including any header an access method keeps inside it.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of resident pages in a cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Full hand sweeps attempted before eviction declares the cache wedged.
pub const EVICTION_SWEEPS: usize = 2;

const _: () = assert!(DEFAULT_PAGE_SIZE.is_power_of_two());
const _: () = assert!(EVICTION_SWEEPS >= 2, "one sweep may only clear visited bits");
