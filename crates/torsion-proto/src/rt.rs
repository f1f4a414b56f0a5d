//! Runtime traits: the timer and networking facilities we need from an
//! async reactor.
//!
//! The protocol code in this crate never names a concrete runtime.  It
//! asks for exactly two capabilities — "pause me for a while" and "give me
//! a TCP stream" — expressed as the traits here, so the same state machine
//! runs under tokio in production and under instant mock time in tests.

use async_trait::async_trait;
use futures::{AsyncRead, AsyncWrite, Future};
use std::io::Result as IoResult;
use std::net::SocketAddr;
use std::time::Duration;

#[cfg(feature = "tokio")]
pub mod tokio;

#[cfg(feature = "tokio")]
pub use self::tokio::PreferredRuntime;

/// Trait for a runtime that can wait until a timer has expired.
pub trait SleepProvider: Clone + Send + Sync + 'static {
    /// A future returned by [`SleepProvider::sleep()`]
    type SleepFuture: Future<Output = ()> + Send + 'static;

    /// Return a future that will be ready after `duration` has elapsed.
    #[must_use = "sleep() returns a future, which does nothing unless used"]
    fn sleep(&self, duration: Duration) -> Self::SleepFuture;
}

/// Trait for a runtime that can open outgoing TCP connections.
///
/// (We use the [`AsyncRead`] and [`AsyncWrite`] traits from `futures::io`
/// rather than the runtime's own, so that the rest of the crate stays
/// runtime-neutral.)
#[async_trait]
pub trait NetStreamProvider: Clone + Send + Sync + 'static {
    /// The type of the TCP connections returned by [`Self::connect()`].
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Launch a TCP connection to a given socket address.
    ///
    /// Note that we take only a [`SocketAddr`], never a hostname: the
    /// only name resolution a Torsion client performs happens inside the
    /// Tor network, via the SOCKS proxy.
    async fn connect(&self, addr: &SocketAddr) -> IoResult<Self::Stream>;
}
