//! RangeCache - Paged Read-Through Caching for Remote Byte-Range Resources
//!
//! Random-access (seek + read) semantics over a remote, byte-range-
//! addressable resource (object storage, HTTP server) without re-fetching
//! the whole object and without re-fetching the same byte range repeatedly.
//! Arbitrary, possibly tiny or overlapping reads become a bounded number of
//! large, page-aligned range fetches; fetched pages are cached in memory
//! under a capacity bound and evicted by observed access frequency.
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ SeekableCachingStream ──▶ PageCache ──miss──▶ RangeAccessor
//!              (read / seek)          (lookup / evict)    (HTTP, memory, ...)
//! ```
//!
//! A read walks pages: on a cache hit bytes are copied straight out of the
//! resident page; on a miss the full page range is fetched through the
//! accessor, committed to the cache (evicting the least-frequently-used
//! page when at capacity), and then copied. Reads come in blocking and
//! suspending forms with identical semantics; the suspending form yields
//! only at the fetch boundary and supports cancellation.
//!
//! # Modules
//!
//! - [`accessor`] - the range-fetch port and its backends
//! - [`cache`] - bounded page cache with frequency-based eviction
//! - [`error`] - error types
//! - [`stream`] - the seekable caching stream
//!
//! # Example
//!
//! ```no_run
//! use rangecache::{HttpRangeAccessor, SeekableCachingStream, StreamConfig};
//! use std::io::SeekFrom;
//!
//! # async fn example() -> rangecache::Result<()> {
//! let url = "https://example.com/large-file.parquet".parse().unwrap();
//! let accessor = HttpRangeAccessor::connect(reqwest::Client::new(), url).await?;
//!
//! let mut stream = SeekableCachingStream::new(accessor);
//!
//! // Jump to the footer, then read; only the touched pages are fetched.
//! stream.seek(SeekFrom::End(-64))?;
//! let mut footer = [0u8; 64];
//! let n = stream.read_async(&mut footer).await?;
//! assert_eq!(n, 64);
//! # Ok(())
//! # }
//! ```

pub mod accessor;
pub mod cache;
pub mod error;
pub mod stream;

// Re-export commonly used types
pub use accessor::{HttpRangeAccessor, MemoryRangeAccessor, RangeAccessor};
pub use cache::{CacheStats, EvictionPolicy, LeastFrequent, Page, PageCache};
pub use error::{Error, Result};
pub use stream::{
    SeekableCachingStream, StreamConfig, StreamStats, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE,
};
