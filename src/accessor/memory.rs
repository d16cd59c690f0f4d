//! In-Memory Range Backend
//!
//! Serves ranges of an owned byte buffer. Useful as a fixture backend for
//! tests and for wrapping already-downloaded resources behind the same port
//! the remote backends implement.

use async_trait::async_trait;
use bytes::Bytes;

use super::RangeAccessor;
use crate::error::{Error, Result};

/// Range accessor backed by an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemoryRangeAccessor {
    data: Bytes,
}

impl MemoryRangeAccessor {
    /// Create an accessor over the given content.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    fn slice(&self, start: u64, end: u64) -> Result<&[u8]> {
        let len = self.data.len() as u64;
        if start > end || end > len {
            return Err(Error::Internal(format!(
                "range {start}..{end} outside resource of {len} bytes"
            )));
        }
        Ok(&self.data[start as usize..end as usize])
    }

    fn copy_range(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        let src = self.slice(start, end)?;
        let n = src.len().min(buf.len());
        buf[..n].copy_from_slice(&src[..n]);
        Ok(n)
    }
}

#[async_trait]
impl RangeAccessor for MemoryRangeAccessor {
    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        self.copy_range(start, end, buf)
    }

    async fn read_range_async(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        self.copy_range(start, end, buf)
    }
}

// =============================================================================
// Tests
// =============================================================================
