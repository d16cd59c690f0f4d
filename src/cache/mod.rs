//! Bounded Page Cache with Frequency-Based Eviction
//!
//! Fixed-size pages of the backing resource are kept in a map keyed by page
//! index, alongside a per-page access-frequency table. When the resident
//! bound is reached, the page ranked lowest by the eviction policy is
//! dropped before the next insert.
//!
//! # Design
//!
//! - Page storage and the frequency table are two colocated maps behind one
//!   component exposing `lookup` / `reserve_slot` / `insert`.
//! - Frequency counters survive eviction: a page that cycles out and back in
//!   keeps its history. For streams touching many distinct pages over a long
//!   session the table therefore grows without bound; this is a known,
//!   documented limitation.
//! - The cache is single-owner state inside a stream instance; there is no
//!   internal synchronization.

mod policy;

pub use policy::{EvictionPolicy, LeastFrequent};

use std::collections::HashMap;

use bytes::Bytes;
use tracing::trace;

/// A fully populated page of the backing resource.
///
/// Pages are immutable once stored; a page is either absent from the cache
/// or complete, never partially filled.
#[derive(Debug, Clone)]
pub struct Page {
    index: u64,
    bytes: Bytes,
}

impl Page {
    fn new(index: u64, bytes: Bytes) -> Self {
        Self { index, bytes }
    }

    /// Page index (`offset / page_size`).
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Page payload.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Cache statistics snapshot
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Resident page count
    pub resident: usize,
    /// Resident page bound
    pub max_pages: usize,
    /// Lookup hits
    pub hits: u64,
    /// Lookup misses
    pub misses: u64,
    /// Evicted pages
    pub evictions: u64,
    /// Distinct pages with a frequency counter (resident or not)
    pub tracked: usize,
}

/// Bounded page store plus per-page access-frequency table.
#[derive(Debug)]
pub struct PageCache {
    pages: HashMap<u64, Page>,
    heat: HashMap<u64, u64>,
    max_pages: usize,
    policy: Box<dyn EvictionPolicy>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl PageCache {
    /// Create a cache bounded to `max_pages` resident pages with the
    /// default [`LeastFrequent`] policy.
    pub fn new(max_pages: usize) -> Self {
        Self::with_policy(max_pages, Box::new(LeastFrequent))
    }

    /// Create a cache with a custom eviction policy.
    pub fn with_policy(max_pages: usize, policy: Box<dyn EvictionPolicy>) -> Self {
        Self {
            pages: HashMap::with_capacity(max_pages),
            heat: HashMap::with_capacity(max_pages),
            max_pages,
            policy,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Probe for a resident page. A hit bumps the page's access counter.
    pub fn lookup(&mut self, index: u64) -> Option<&Page> {
        if self.pages.contains_key(&index) {
            *self.heat.entry(index).or_insert(0) += 1;
            self.hits += 1;
            self.pages.get(&index)
        } else {
            self.misses += 1;
            None
        }
    }

    /// Access a resident page without touching its counter.
    pub fn page(&self, index: u64) -> Option<&Page> {
        self.pages.get(&index)
    }

    /// Whether `index` is resident.
    pub fn contains(&self, index: u64) -> bool {
        self.pages.contains_key(&index)
    }

    /// Make room for one insertion, evicting while at capacity.
    ///
    /// Victims are removed from the page map only; their counters survive so
    /// frequency history outlives residency.
    pub fn reserve_slot(&mut self) {
        while self.pages.len() >= self.max_pages {
            let mut candidates = self
                .pages
                .keys()
                .map(|&index| (index, self.heat.get(&index).copied().unwrap_or(0)))
                .collect::<Vec<_>>()
                .into_iter();

            let Some(victim) = self.policy.select_victim(&mut candidates) else {
                break;
            };
            self.pages.remove(&victim);
            self.evictions += 1;
            trace!(page = victim, "evicted page");
        }
    }

    /// Store a freshly fetched page.
    ///
    /// The insert itself services a fault, so an index never seen before
    /// starts its counter at 1; an index re-inserted after eviction keeps
    /// its prior count (the faulting lookup is not an extra access). Only
    /// callable after [`reserve_slot`](Self::reserve_slot).
    pub fn insert(&mut self, index: u64, bytes: Bytes) {
        debug_assert!(
            self.pages.len() < self.max_pages,
            "reserve_slot must run before insert"
        );
        self.heat.entry(index).or_insert(1);
        self.pages.insert(index, Page::new(index, bytes));
    }

    /// Current access count for a page index (0 if never seen).
    pub fn access_count(&self, index: u64) -> u64 {
        self.heat.get(&index).copied().unwrap_or(0)
    }

    /// Number of resident pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether no pages are resident.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Resident page bound.
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Drop every resident page. Frequency history is kept.
    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resident: self.pages.len(),
            max_pages: self.max_pages,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            tracked: self.heat.len(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
