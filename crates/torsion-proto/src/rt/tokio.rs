//! Tokio-backed implementations of the runtime traits.

use async_trait::async_trait;
use std::io::Result as IoResult;
use std::net::SocketAddr;
use std::time::Duration;

use tokio_util::compat::{Compat, TokioAsyncReadCompatExt as _};

use super::{NetStreamProvider, SleepProvider};

/// The runtime used when nothing else is asked for: tokio's reactor for
/// both timers and TCP.
///
/// The handle itself is stateless.  It must be used from inside a running
/// tokio runtime, which is where anything driving a contact request
/// already lives.
///
/// Tokio has its own dialect of `AsyncRead`/`AsyncWrite`, while this
/// crate speaks the `futures` ones; connections therefore come back
/// wearing `tokio-util`'s [`Compat`] adapter, which translates between
/// the two without copying.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct PreferredRuntime;

impl PreferredRuntime {
    /// Return a handle to the preferred runtime.
    pub fn new() -> Self {
        PreferredRuntime
    }
}

impl SleepProvider for PreferredRuntime {
    type SleepFuture = tokio::time::Sleep;
    fn sleep(&self, duration: Duration) -> Self::SleepFuture {
        tokio::time::sleep(duration)
    }
}

#[async_trait]
impl NetStreamProvider for PreferredRuntime {
    type Stream = Compat<tokio::net::TcpStream>;

    async fn connect(&self, addr: &SocketAddr) -> IoResult<Self::Stream> {
        Ok(tokio::net::TcpStream::connect(addr).await?.compat())
    }
}
