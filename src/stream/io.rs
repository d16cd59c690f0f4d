//! `std::io` Integration for the Blocking Mode
//!
//! The stream plugs into ordinary Rust I/O consumers as `R: Read + Seek`.
//! No `Write` implementation exists; read-only is part of the type's
//! contract, not a runtime error.
//!
//! `SeekFrom::End` keeps this crate's convention of measuring back from the
//! end by the offset's magnitude, which coincides with the standard meaning
//! for the non-positive offsets a read-only consumer actually uses.

use std::io;

use super::SeekableCachingStream;
use crate::accessor::RangeAccessor;
use crate::error::Error;

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::InvalidPosition { .. } => io::ErrorKind::InvalidInput,
            Error::Unsupported(_) => io::ErrorKind::Unsupported,
            Error::IncompleteFetch { .. } => io::ErrorKind::UnexpectedEof,
            Error::Cancelled => io::ErrorKind::Interrupted,
            Error::Disposed => io::ErrorKind::NotConnected,
            Error::Io(inner) => inner.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

impl<A: RangeAccessor> io::Read for SeekableCachingStream<A> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        SeekableCachingStream::read(self, buf).map_err(io::Error::from)
    }
}

impl<A: RangeAccessor> io::Seek for SeekableCachingStream<A> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        SeekableCachingStream::seek(self, pos).map_err(io::Error::from)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position())
    }
}

// =============================================================================
// Tests
// =============================================================================
