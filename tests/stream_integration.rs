//! RangeCache Integration Tests
//!
//! End-to-end coverage of the caching stream over instrumented accessor
//! backends:
//! - Round-trip fidelity under arbitrary call chunking
//! - Capacity bound and frequency-based eviction
//! - Fault accounting (delivered vs. fetched)
//! - Cancellation and disposal of in-flight fetches
//! - Incomplete-fetch and transient-failure handling

use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use rangecache::{
    Error, MemoryRangeAccessor, RangeAccessor, Result, SeekableCachingStream, StreamConfig,
};

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Route stream tracing to the test harness when RUST_LOG is set.
fn trace_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn stream_over(
    data: Vec<u8>,
    page_size: u64,
    max_pages: usize,
) -> SeekableCachingStream<MemoryRangeAccessor> {
    SeekableCachingStream::with_config(
        MemoryRangeAccessor::new(data),
        StreamConfig {
            page_size,
            max_pages,
        },
    )
}

// =============================================================================
// Instrumented accessors
// =============================================================================

/// Delegates to a memory accessor while counting fetches.
struct CountingAccessor {
    inner: MemoryRangeAccessor,
    fetches: Arc<AtomicU64>,
}

impl CountingAccessor {
    fn new(data: Vec<u8>) -> (Self, Arc<AtomicU64>) {
        let fetches = Arc::new(AtomicU64::new(0));
        (
            Self {
                inner: MemoryRangeAccessor::new(data),
                fetches: Arc::clone(&fetches),
            },
            fetches,
        )
    }
}

#[async_trait]
impl RangeAccessor for CountingAccessor {
    fn length(&self) -> u64 {
        self.inner.length()
    }

    fn read_range(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.read_range(start, end, buf)
    }

    async fn read_range_async(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.read_range_async(start, end, buf).await
    }
}

/// Stalls the first suspending fetch forever; later fetches succeed.
struct StallOnceAccessor {
    inner: MemoryRangeAccessor,
    stall: AtomicBool,
}

impl StallOnceAccessor {
    fn new(data: Vec<u8>) -> Self {
        Self {
            inner: MemoryRangeAccessor::new(data),
            stall: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl RangeAccessor for StallOnceAccessor {
    fn length(&self) -> u64 {
        self.inner.length()
    }

    fn read_range(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        self.inner.read_range(start, end, buf)
    }

    async fn read_range_async(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        if self.stall.swap(false, Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        self.inner.read_range_async(start, end, buf).await
    }
}

/// Yields one byte fewer than requested on every fetch.
struct ShortAccessor {
    inner: MemoryRangeAccessor,
}

#[async_trait]
impl RangeAccessor for ShortAccessor {
    fn length(&self) -> u64 {
        self.inner.length()
    }

    fn read_range(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        let span = buf.len() - 1;
        self.inner.read_range(start, end - 1, &mut buf[..span])
    }

    async fn read_range_async(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        self.read_range(start, end, buf)
    }
}

/// Fails the first fetch with an I/O error; later fetches succeed.
struct FailOnceAccessor {
    inner: MemoryRangeAccessor,
    fail: AtomicBool,
}

impl FailOnceAccessor {
    fn new(data: Vec<u8>) -> Self {
        Self {
            inner: MemoryRangeAccessor::new(data),
            fail: AtomicBool::new(true),
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "transient backend failure",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RangeAccessor for FailOnceAccessor {
    fn length(&self) -> u64 {
        self.inner.length()
    }

    fn read_range(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        self.check()?;
        self.inner.read_range(start, end, buf)
    }

    async fn read_range_async(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        self.check()?;
        self.inner.read_range_async(start, end, buf).await
    }
}

// =============================================================================
// Round trip
// =============================================================================

#[test]
fn test_round_trip_single_call() {
    let data = content(1000);
    let mut stream = stream_over(data.clone(), 64, 8);

    let mut out = vec![0u8; 1000];
    assert_eq!(stream.read(&mut out).unwrap(), 1000);
    assert_eq!(out, data);
}

#[test]
fn test_round_trip_odd_chunks() {
    let data = content(500);
    let mut stream = stream_over(data.clone(), 37, 3);

    let mut out = Vec::new();
    let mut chunk = vec![0u8; 13];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(out, data);
    assert_eq!(stream.total_delivered(), 500);
}

#[tokio::test]
async fn test_round_trip_async() {
    let data = content(300);
    let mut stream = stream_over(data.clone(), 32, 4);

    let mut out = Vec::new();
    let mut chunk = vec![0u8; 17];
    loop {
        let n = stream.read_async(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(out, data);
}

proptest! {
    #[test]
    fn prop_round_trip_any_geometry(
        len in 0usize..400,
        page_size in 1u64..70,
        max_pages in 1usize..6,
        chunk in 1usize..50,
    ) {
        let data = content(len);
        let mut stream = stream_over(data.clone(), page_size, max_pages);

        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }

        prop_assert_eq!(out, data);
        prop_assert!(stream.stats().cache.resident <= max_pages);
    }
}

// =============================================================================
// Capacity and eviction
// =============================================================================

#[test]
fn test_capacity_bound_under_random_access() {
    let mut stream = stream_over(content(1000), 10, 3);

    let mut buf = vec![0u8; 5];
    for offset in [0u64, 990, 500, 250, 750, 120, 40, 999, 5, 601] {
        stream.seek(SeekFrom::Start(offset)).unwrap();
        stream.read(&mut buf).unwrap();
        assert!(stream.stats().cache.resident <= 3);
    }
}

#[test]
fn test_eviction_prefers_cold_page() {
    // pages: 0 (touched twice), 1 (touched once), 2 forces the eviction
    let mut stream = stream_over(content(30), 10, 2);
    let mut buf = vec![0u8; 10];

    stream.read(&mut buf).unwrap(); // page 0
    stream.read(&mut buf).unwrap(); // page 1
    stream.seek(SeekFrom::Start(0)).unwrap();
    stream.read(&mut buf).unwrap(); // page 0 again
    stream.seek(SeekFrom::Start(20)).unwrap();
    stream.read(&mut buf).unwrap(); // page 2, evicts page 1
    assert_eq!(stream.total_fetched(), 30);

    // Page 0 stayed resident: no new fetch.
    stream.seek(SeekFrom::Start(0)).unwrap();
    stream.read(&mut buf).unwrap();
    assert_eq!(stream.total_fetched(), 30);

    // Page 1 was the victim: reading it faults again.
    stream.seek(SeekFrom::Start(10)).unwrap();
    stream.read(&mut buf).unwrap();
    assert_eq!(stream.total_fetched(), 40);
}

#[test]
fn test_straddling_read_fetches_each_page_once() {
    let (accessor, fetches) = CountingAccessor::new(content(100));
    let mut stream = SeekableCachingStream::with_config(
        accessor,
        StreamConfig {
            page_size: 10,
            max_pages: 8,
        },
    );

    stream.seek(SeekFrom::Start(25)).unwrap();
    let mut buf = vec![0u8; 30];
    let n = stream.read(&mut buf).unwrap();

    assert_eq!(n, 30);
    assert_eq!(buf, content(100)[25..55]);
    // pages 2..=5 newly touched, one fetch each
    assert_eq!(fetches.load(Ordering::SeqCst), 4);

    // Same span again: everything is resident.
    stream.seek(SeekFrom::Start(25)).unwrap();
    stream.read(&mut buf).unwrap();
    assert_eq!(fetches.load(Ordering::SeqCst), 4);
}

// =============================================================================
// Fault accounting
// =============================================================================

#[test]
fn test_sequential_read_fetches_length_exactly() {
    let mut stream = stream_over(content(256), 32, 16);

    let mut out = vec![0u8; 256];
    stream.read(&mut out).unwrap();
    assert_eq!(stream.total_fetched(), 256);
    assert_eq!(stream.total_delivered(), 256);

    stream.seek(SeekFrom::Start(0)).unwrap();
    stream.read(&mut out).unwrap();
    assert_eq!(stream.total_fetched(), 256);
    assert_eq!(stream.total_delivered(), 512);
}

// =============================================================================
// Cancellation and disposal
// =============================================================================

#[tokio::test]
async fn test_cancel_mid_fetch_leaves_page_absent() {
    trace_init();
    let mut stream = SeekableCachingStream::with_config(
        StallOnceAccessor::new(content(40)),
        StreamConfig {
            page_size: 10,
            max_pages: 4,
        },
    );

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        canceller.cancel();
    });

    let mut buf = vec![0u8; 10];
    let result = stream.read_with(&mut buf, &cancel).await;
    assert_matches!(result, Err(Error::Cancelled));
    assert_eq!(stream.position(), 0);
    assert_eq!(stream.stats().cache.resident, 0);
    assert_eq!(stream.total_fetched(), 0);

    // The abandoned fetch committed nothing; a fresh read retries cleanly.
    let fresh = CancellationToken::new();
    let n = stream.read_with(&mut buf, &fresh).await.unwrap();
    assert_eq!(n, 10);
    assert_eq!(buf, content(40)[..10]);
}

#[tokio::test]
async fn test_disposal_token_aborts_in_flight_read() {
    trace_init();
    let mut stream = SeekableCachingStream::with_config(
        StallOnceAccessor::new(content(40)),
        StreamConfig {
            page_size: 10,
            max_pages: 4,
        },
    );

    let disposal = stream.disposal_token();
    tokio::spawn(async move {
        disposal.cancel();
    });

    let cancel = CancellationToken::new();
    let mut buf = vec![0u8; 10];
    let result = stream.read_with(&mut buf, &cancel).await;
    assert_matches!(result, Err(Error::Cancelled));

    // The disposal signal also retires the stream itself.
    let result = stream.read_with(&mut buf, &cancel).await;
    assert_matches!(result, Err(Error::Disposed));
}

// =============================================================================
// Failure handling
// =============================================================================

#[test]
fn test_incomplete_fetch_is_fatal_for_that_call() {
    let mut stream = SeekableCachingStream::with_config(
        ShortAccessor {
            inner: MemoryRangeAccessor::new(content(40)),
        },
        StreamConfig {
            page_size: 10,
            max_pages: 4,
        },
    );

    let mut buf = vec![0u8; 10];
    let result = stream.read(&mut buf);
    assert_matches!(
        result,
        Err(Error::IncompleteFetch {
            expected: 10,
            actual: 9
        })
    );
    assert_eq!(stream.position(), 0);
    assert_eq!(stream.stats().cache.resident, 0);
}

#[test]
fn test_failed_read_leaves_position_then_retry_succeeds() {
    let mut stream = SeekableCachingStream::with_config(
        FailOnceAccessor::new(content(40)),
        StreamConfig {
            page_size: 10,
            max_pages: 4,
        },
    );
    stream.seek(SeekFrom::Start(5)).unwrap();

    let mut buf = vec![0u8; 10];
    assert_matches!(stream.read(&mut buf), Err(Error::Io(_)));
    assert_eq!(stream.position(), 5);
    assert_eq!(stream.total_delivered(), 0);

    // Same call again after the failure resolves.
    let n = stream.read(&mut buf).unwrap();
    assert_eq!(n, 10);
    assert_eq!(buf, content(40)[5..15]);
    assert_eq!(stream.position(), 15);
}

#[tokio::test]
async fn test_async_failure_matches_blocking() {
    let mut stream = SeekableCachingStream::with_config(
        FailOnceAccessor::new(content(40)),
        StreamConfig {
            page_size: 10,
            max_pages: 4,
        },
    );

    let mut buf = vec![0u8; 10];
    assert_matches!(stream.read_async(&mut buf).await, Err(Error::Io(_)));
    assert_eq!(stream.position(), 0);

    let n = stream.read_async(&mut buf).await.unwrap();
    assert_eq!(n, 10);
}
