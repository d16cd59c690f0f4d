//! Seekable Caching Stream
//!
//! The public face of the crate: random-access reads over a remote resource,
//! served from a bounded page cache and faulted through a [`RangeAccessor`]
//! on a miss.
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ SeekableCachingStream ──▶ PageCache ──miss──▶ RangeAccessor
//!              (read / seek)          (lookup / evict)    (HTTP, memory, ...)
//! ```
//!
//! # Ownership
//!
//! A stream instance is single-owner: every operation takes `&mut self` and
//! the cache is mutated without internal locks, so the type system rules out
//! concurrent invocation. Callers needing concurrency construct independent
//! instances sharing nothing, or serialize calls externally.
//!
//! The stream is read-only by construction. There is no write, flush, or
//! resize surface to misuse; bytes crossing the `read` boundary are always
//! copied into caller-supplied storage, never handed out by reference to
//! cache-internal buffers.

mod io;

use std::io::SeekFrom;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::accessor::RangeAccessor;
use crate::cache::{CacheStats, PageCache};
use crate::error::{Error, Result};

/// Default page length: 25 MiB.
pub const DEFAULT_PAGE_SIZE: u64 = 25 * 1024 * 1024;

/// Default bound on resident pages.
pub const DEFAULT_MAX_PAGES: usize = 20;

/// Stream configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Page length in bytes; the unit of caching and fetching.
    pub page_size: u64,
    /// Maximum number of resident pages.
    pub max_pages: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Counters and dimensions of a live stream.
#[derive(Debug, Clone)]
pub struct StreamStats {
    /// Resource length in bytes
    pub length: u64,
    /// Current read position
    pub position: u64,
    /// Cumulative bytes copied out to callers
    pub total_delivered: u64,
    /// Cumulative bytes fetched from the accessor
    pub total_fetched: u64,
    /// Page cache counters
    pub cache: CacheStats,
}

/// Read-only, seekable stream over a remote byte-range resource.
///
/// Arbitrary, possibly tiny or overlapping reads are turned into a bounded
/// number of large, page-aligned range fetches. Fetched pages are cached in
/// memory up to a resident bound and evicted by observed access frequency.
pub struct SeekableCachingStream<A: RangeAccessor> {
    accessor: A,
    page_size: u64,
    length: u64,
    position: u64,
    total_delivered: u64,
    total_fetched: u64,
    cache: PageCache,
    dispose: CancellationToken,
    disposed: bool,
}

impl<A: RangeAccessor> SeekableCachingStream<A> {
    /// Create a stream over `accessor` with the default configuration.
    pub fn new(accessor: A) -> Self {
        Self::with_config(accessor, StreamConfig::default())
    }

    /// Create a stream with a custom page size and resident bound.
    pub fn with_config(accessor: A, config: StreamConfig) -> Self {
        let length = accessor.length();
        Self {
            accessor,
            // a zero page size cannot address any byte
            page_size: config.page_size.max(1),
            length,
            position: 0,
            total_delivered: 0,
            total_fetched: 0,
            cache: PageCache::new(config.max_pages),
            dispose: CancellationToken::new(),
            disposed: false,
        }
    }

    /// Resource length in bytes, fixed at construction.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Current read position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Set the read position to an absolute offset.
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        self.seek(SeekFrom::Start(position)).map(|_| ())
    }

    /// Cumulative bytes copied out to callers.
    pub fn total_delivered(&self) -> u64 {
        self.total_delivered
    }

    /// Cumulative bytes fetched from the accessor.
    pub fn total_fetched(&self) -> u64 {
        self.total_fetched
    }

    /// Snapshot of stream and cache counters.
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            length: self.length,
            position: self.position,
            total_delivered: self.total_delivered,
            total_fetched: self.total_fetched,
            cache: self.cache.stats(),
        }
    }

    /// Whether the stream has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed || self.dispose.is_cancelled()
    }

    /// Handle that aborts any in-flight suspending operation on this stream.
    ///
    /// Cancelling the returned token is the asynchronous half of disposal: a
    /// read in flight fails with [`Error::Cancelled`] and every later
    /// operation fails with [`Error::Disposed`].
    pub fn disposal_token(&self) -> CancellationToken {
        self.dispose.clone()
    }

    /// Dispose the stream.
    ///
    /// Cancels any in-flight suspending operation and drops every cached
    /// page. All subsequent operations fail with [`Error::Disposed`].
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.dispose.cancel();
        self.cache.clear();
        debug!(
            delivered = self.total_delivered,
            fetched = self.total_fetched,
            "stream disposed"
        );
    }

    /// Move the read position.
    ///
    /// `SeekFrom::End` measures back from the end of the stream by the
    /// offset's magnitude, so `End(0)` lands exactly at the end. The new
    /// position is validated against `0..=length` before committing; on
    /// violation the prior position is retained.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_active()?;
        let requested: i128 = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(offset) => self.position as i128 + offset as i128,
            SeekFrom::End(offset) => self.length as i128 - (offset as i128).abs(),
        };
        if requested < 0 || requested > self.length as i128 {
            return Err(Error::InvalidPosition {
                requested,
                length: self.length,
            });
        }
        self.position = requested as u64;
        Ok(self.position)
    }

    /// Read up to `dest.len()` bytes at the current position, blocking the
    /// thread on any page fault.
    ///
    /// Returns the number of bytes copied; 0 means end of stream. A failed
    /// read leaves the position unchanged and delivers no bytes; the same
    /// call may be retried once the failure is resolved.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<usize> {
        self.ensure_active()?;
        if dest.is_empty() || self.position >= self.length {
            return Ok(0);
        }

        let mut pos = self.position;
        let mut copied = 0;
        while copied < dest.len() && pos < self.length {
            let page_index = pos / self.page_size;
            if self.cache.lookup(page_index).is_none() {
                self.fault_blocking(page_index)?;
            }
            let n = self.copy_out(page_index, pos, &mut dest[copied..])?;
            copied += n;
            pos += n as u64;
        }

        self.total_delivered += copied as u64;
        self.position = pos;
        Ok(copied)
    }

    /// Suspending variant of [`read`](Self::read); yields only while a page
    /// fault is in flight, never mid-copy.
    pub async fn read_async(&mut self, dest: &mut [u8]) -> Result<usize> {
        let token = CancellationToken::new();
        self.read_with(dest, &token).await
    }

    /// Like [`read_async`](Self::read_async), aborting the in-flight fetch
    /// as soon as either `cancel` or the stream's disposal token fires.
    ///
    /// An aborted fetch commits nothing: the page stays absent and a later
    /// read retries it cleanly.
    pub async fn read_with(&mut self, dest: &mut [u8], cancel: &CancellationToken) -> Result<usize> {
        self.ensure_active()?;
        if dest.is_empty() || self.position >= self.length {
            return Ok(0);
        }

        let mut pos = self.position;
        let mut copied = 0;
        while copied < dest.len() && pos < self.length {
            let page_index = pos / self.page_size;
            if self.cache.lookup(page_index).is_none() {
                self.fault_async(page_index, cancel).await?;
            }
            let n = self.copy_out(page_index, pos, &mut dest[copied..])?;
            copied += n;
            pos += n as u64;
        }

        self.total_delivered += copied as u64;
        self.position = pos;
        Ok(copied)
    }

    /// Byte range `[start, end)` covered by `page_index`.
    fn page_range(&self, page_index: u64) -> (u64, u64) {
        let start = page_index * self.page_size;
        let end = start + self.page_size.min(self.length - start);
        (start, end)
    }

    /// Copy from a resident page into `dest`, starting at absolute `pos`.
    fn copy_out(&self, page_index: u64, pos: u64, dest: &mut [u8]) -> Result<usize> {
        let page = self
            .cache
            .page(page_index)
            .ok_or_else(|| Error::Internal(format!("page {page_index} absent after fault")))?;
        let page_offset = (pos % self.page_size) as usize;
        let n = (page.len() - page_offset).min(dest.len());
        dest[..n].copy_from_slice(&page.bytes()[page_offset..page_offset + n]);
        Ok(n)
    }

    /// Page-fault procedure, blocking form: make room, fetch the full page
    /// range, verify the drain was complete, commit.
    fn fault_blocking(&mut self, page_index: u64) -> Result<()> {
        if self.dispose.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.cache.reserve_slot();

        let (start, end) = self.page_range(page_index);
        trace!(page = page_index, start, end, "page fault");
        let mut buf = vec![0u8; (end - start) as usize];
        let n = self.accessor.read_range(start, end, &mut buf)?;
        if n as u64 != end - start {
            return Err(Error::IncompleteFetch {
                expected: end - start,
                actual: n as u64,
            });
        }

        self.cache.insert(page_index, Bytes::from(buf));
        self.total_fetched += end - start;
        Ok(())
    }

    /// Page-fault procedure, suspending form. The fetch races `cancel` and
    /// the stream's disposal token; losing the race abandons the fetch with
    /// no partial page committed.
    async fn fault_async(&mut self, page_index: u64, cancel: &CancellationToken) -> Result<()> {
        self.cache.reserve_slot();

        let (start, end) = self.page_range(page_index);
        trace!(page = page_index, start, end, "page fault");
        let mut buf = vec![0u8; (end - start) as usize];
        let n = {
            let mut fetch = self.accessor.read_range_async(start, end, &mut buf);
            tokio::select! {
                biased;
                _ = self.dispose.cancelled() => return Err(Error::Cancelled),
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                res = &mut fetch => res?,
            }
        };
        if n as u64 != end - start {
            return Err(Error::IncompleteFetch {
                expected: end - start,
                actual: n as u64,
            });
        }

        self.cache.insert(page_index, Bytes::from(buf));
        self.total_fetched += end - start;
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        Ok(())
    }
}

impl<A: RangeAccessor> Drop for SeekableCachingStream<A> {
    fn drop(&mut self) {
        self.dispose.cancel();
    }
}

impl<A: RangeAccessor> std::fmt::Debug for SeekableCachingStream<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeekableCachingStream")
            .field("length", &self.length)
            .field("position", &self.position)
            .field("page_size", &self.page_size)
            .field("resident_pages", &self.cache.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
