//! HTTP Range Backend
//!
//! Speaks `Range` / `Content-Range` against any server with byte-range
//! support. The resource length is discovered with a zero-length range probe
//! (`Range: bytes=0-0`) whose response must carry the total length in its
//! `Content-Range` header; a server that does not report it is a hard
//! failure, not an empty stream.
//!
//! Every fetch is conditioned on the `ETag` observed by the probe, so a
//! resource that changes mid-session fails with
//! [`Error::ResourceChanged`] instead of silently serving bytes from a
//! different generation.

use async_trait::async_trait;
use futures::TryStreamExt;
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderValue, CONTENT_RANGE, ETAG, IF_MATCH, RANGE};
use reqwest::StatusCode;
use tokio_util::io::StreamReader;
use tracing::debug;

use super::{drain_async, drain_reader, RangeAccessor};
use crate::error::{Error, Result};

/// Range accessor speaking HTTP `Range` requests.
pub struct HttpRangeAccessor {
    client: reqwest::Client,
    blocking: OnceCell<reqwest::blocking::Client>,
    url: reqwest::Url,
    length: u64,
    etag: Option<HeaderValue>,
}

impl HttpRangeAccessor {
    /// Open an accessor against `url`, probing the resource length.
    pub async fn connect(client: reqwest::Client, url: reqwest::Url) -> Result<Self> {
        let response = client
            .get(url.clone())
            .header(RANGE, "bytes=0-0")
            .send()
            .await?;
        let (length, etag) = probe_outcome(
            response.status(),
            response.headers().get(CONTENT_RANGE),
            response.headers().get(ETAG),
        )?;
        debug!(%url, length, "probed resource length");
        Ok(Self {
            client,
            blocking: OnceCell::new(),
            url,
            length,
            etag,
        })
    }

    /// Blocking variant of [`connect`](Self::connect).
    ///
    /// Must not be called from within an async runtime; use
    /// [`connect`](Self::connect) there instead.
    pub fn connect_blocking(url: reqwest::Url) -> Result<Self> {
        let blocking = reqwest::blocking::Client::builder().build()?;
        let response = blocking
            .get(url.clone())
            .header(RANGE, "bytes=0-0")
            .send()?;
        let (length, etag) = probe_outcome(
            response.status(),
            response.headers().get(CONTENT_RANGE),
            response.headers().get(ETAG),
        )?;
        debug!(%url, length, "probed resource length");
        let cell = OnceCell::new();
        let _ = cell.set(blocking);
        Ok(Self {
            client: reqwest::Client::new(),
            blocking: cell,
            url,
            length,
            etag,
        })
    }

    /// The URL this accessor fetches from.
    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    // HTTP range headers are inclusive on both ends
    fn range_header(start: u64, end: u64) -> String {
        format!("bytes={}-{}", start, end - 1)
    }
}

impl std::fmt::Debug for HttpRangeAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRangeAccessor")
            .field("url", &self.url.as_str())
            .field("length", &self.length)
            .field("conditional", &self.etag.is_some())
            .finish()
    }
}

#[async_trait]
impl RangeAccessor for HttpRangeAccessor {
    fn length(&self) -> u64 {
        self.length
    }

    fn read_range(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        let client = self
            .blocking
            .get_or_try_init(|| reqwest::blocking::Client::builder().build())?;

        let mut request = client
            .get(self.url.clone())
            .header(RANGE, Self::range_header(start, end));
        if let Some(etag) = &self.etag {
            request = request.header(IF_MATCH, etag.clone());
        }

        let response = request.send()?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Err(Error::ResourceChanged);
        }
        let mut response = response.error_for_status()?;

        Ok(drain_reader(&mut response, buf)?)
    }

    async fn read_range_async(&self, start: u64, end: u64, buf: &mut [u8]) -> Result<usize> {
        let mut request = self
            .client
            .get(self.url.clone())
            .header(RANGE, Self::range_header(start, end));
        if let Some(etag) = &self.etag {
            request = request.header(IF_MATCH, etag.clone());
        }

        let response = request.send().await?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Err(Error::ResourceChanged);
        }
        let response = response.error_for_status()?;

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(Box::pin(stream));

        Ok(drain_async(&mut reader, buf).await?)
    }
}

/// Extract the total length and ETag from a zero-length probe response.
///
/// A satisfiable probe answers `206 Partial Content` with
/// `Content-Range: bytes 0-0/<total>`; an empty resource answers
/// `416 Range Not Satisfiable` with `Content-Range: bytes */<total>`.
fn probe_outcome(
    status: StatusCode,
    content_range: Option<&HeaderValue>,
    etag: Option<&HeaderValue>,
) -> Result<(u64, Option<HeaderValue>)> {
    if status != StatusCode::PARTIAL_CONTENT && status != StatusCode::RANGE_NOT_SATISFIABLE {
        return Err(Error::LengthProbe(format!(
            "unexpected probe response status {status}"
        )));
    }

    let raw = content_range
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::LengthProbe("response carried no Content-Range header".into()))?;

    let length = raw
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
        .ok_or_else(|| Error::LengthProbe(format!("cannot parse Content-Range '{raw}'")))?;

    Ok((length, etag.cloned()))
}

// =============================================================================
// Tests
// =============================================================================
