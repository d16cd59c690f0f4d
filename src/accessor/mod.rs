//! Range Accessor Port and Backends
//!
//! This module defines the capability the caching stream depends on: fetching
//! an arbitrary byte range of a remote resource and reporting its total
//! length. Backends implement the [`RangeAccessor`] trait to plug a concrete
//! transport underneath the stream.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  SeekableCachingStream                       │
//! │                          │                                   │
//! │                          ▼                                   │
//! │            ┌─────────────────────────────┐                   │
//! │            │    RangeAccessor (Port)     │                   │
//! │            └─────────────────────────────┘                   │
//! └──────────────────────────┼──────────────────────────────────┘
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Backends (Adapters)                        │
//! │      HttpRangeAccessor  │  MemoryRangeAccessor               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The free functions [`drain_reader`] and [`drain_async`] are the shared
//! glue backends use to pull a transport's byte source into a page buffer,
//! looping until the buffer is full or the source is exhausted.

mod http;
mod memory;

pub use http::HttpRangeAccessor;
pub use memory::MemoryRangeAccessor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

/// Capability for fetching byte ranges of a remote, range-addressable
/// resource.
///
/// The stream requests exactly the bytes of `[start, end)`, never an empty
/// range, and never a range past the length the backend reported. Both fetch
/// variants must be semantically identical apart from blocking behavior.
#[async_trait]
pub trait RangeAccessor {
    /// Total length of the backing resource in bytes.
    ///
    /// Computed once by the backend and treated as immutable for the
    /// lifetime of any stream built on top of it. A backend that detects the
    /// remote object changed should fail subsequent fetches instead of
    /// silently serving different bytes.
    fn length(&self) -> u64;

    /// Fetch the bytes of `[start, end)` into `buf`, blocking the calling
    /// thread.
    ///
    /// Postcondition: the transport's byte source is fully drained before
    /// returning. The return value is the number of bytes written into
    /// `buf`, which is `end - start` unless the remote source was exhausted
    /// early. Backends that cannot block return [`Error::Unsupported`].
    ///
    /// [`Error::Unsupported`]: crate::error::Error::Unsupported
    fn read_range(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize>;

    /// Suspending variant of [`read_range`](Self::read_range).
    ///
    /// Identical contract apart from yielding the task instead of blocking
    /// the thread while bytes are in flight.
    async fn read_range_async(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize>;
}

/// Drain a blocking byte source into `buf`.
///
/// Loops until `buf` is completely filled or the source reports end of
/// stream; a single short read from the transport is never treated as fetch
/// completion. Returns the number of bytes written.
pub fn drain_reader<R: std::io::Read>(src: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Suspending variant of [`drain_reader`].
pub async fn drain_async<R>(src: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = src.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

// =============================================================================
// Tests
// =============================================================================
