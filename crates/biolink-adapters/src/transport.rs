//! DeviceTransport trait definition.
//!
//! A device service exposes four endpoints on a local port. Each is reached
//! with an application-defined HTTP method token rather than GET/POST; the
//! tokens are part of the wire contract with existing device services and
//! must be sent byte-for-byte.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};

use crate::error::DeviceResult;

/// Device-info endpoint path segment.
pub const DEVICE_INFO_ENDPOINT: &str = "info";
/// Discovery endpoint path segment.
pub const DEVICE_DISCOVERY_ENDPOINT: &str = "device";
/// Capture endpoint path segment.
pub const CAPTURE_ENDPOINT: &str = "capture";
/// Stream endpoint path segment.
pub const STREAM_ENDPOINT: &str = "stream";

/// Method token for device-info requests and liveness probes.
pub const DEVICE_INFO_METHOD: &str = "MOSIPDINFO";
/// Method token for discovery requests.
pub const DISCOVERY_METHOD: &str = "MOSIPDISC";
/// Method token for registration capture requests.
pub const CAPTURE_METHOD: &str = "RCAPTURE";
/// Method token for live stream requests.
pub const STREAM_METHOD: &str = "STREAM";

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A live byte stream from a device's preview endpoint.
///
/// The underlying connection stays open until the stream is closed or
/// dropped.
pub struct DeviceStream {
    inner: BoxStream<'static, DeviceResult<Bytes>>,
}

impl DeviceStream {
    /// Wraps a chunk stream.
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = DeviceResult<Bytes>> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
        }
    }

    /// Creates a finite stream from pre-recorded chunks.
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        Self::new(stream::iter(chunks.into_iter().map(Ok)))
    }

    /// Reads the next chunk, or `None` once the device closes the stream.
    pub async fn next_chunk(&mut self) -> Option<DeviceResult<Bytes>> {
        self.inner.next().await
    }

    /// Closes the stream and releases the connection.
    pub fn close(self) {
        drop(self.inner);
    }

    /// Returns the underlying chunk stream.
    pub fn into_inner(self) -> BoxStream<'static, DeviceResult<Bytes>> {
        self.inner
    }
}

impl fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceStream").finish_non_exhaustive()
    }
}

/// Network access to the device services on this workstation.
///
/// Every call must complete or fail within a finite deadline; timeouts are
/// reported as [`DeviceError::Timeout`](crate::DeviceError::Timeout) and
/// refused connections as
/// [`DeviceError::ProbeUnavailable`](crate::DeviceError::ProbeUnavailable).
pub trait DeviceTransport: Send + Sync {
    /// Checks whether anything answers the device-info method on `port`.
    fn probe(&self, port: u16) -> BoxFuture<'_, DeviceResult<()>>;

    /// Fetches the raw device-info response (a JSON array of envelopes).
    fn device_info(&self, port: u16) -> BoxFuture<'_, DeviceResult<String>>;

    /// Sends a discovery request and returns the raw response.
    fn discover(&self, port: u16, body: Vec<u8>) -> BoxFuture<'_, DeviceResult<String>>;

    /// Sends a capture request and returns the raw response.
    ///
    /// `deadline` bounds the whole call; it must cover the capture window
    /// the device was asked to honour.
    fn capture(
        &self,
        port: u16,
        body: Vec<u8>,
        deadline: Duration,
    ) -> BoxFuture<'_, DeviceResult<String>>;

    /// Opens a live preview stream. Opening is bounded by a deadline; the
    /// returned body is not.
    fn stream(&self, port: u16, body: Vec<u8>) -> BoxFuture<'_, DeviceResult<DeviceStream>>;
}
