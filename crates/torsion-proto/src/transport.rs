//! The transport capability: Tor-tunneled connections, plus the "SOCKS is
//! ready" signal.
//!
//! Everything a contact request does on the network goes through a
//! [`TorTransport`].  The production implementation is
//! [`SocksTransport`], which tunnels TCP through the local Tor daemon's
//! SOCKS5 port; tests substitute
//! [`testing::MockTransport`](crate::testing::MockTransport).
//!
//! Readiness is not something this crate can determine on its own: only
//! the Tor supervisor knows when the daemon has bootstrapped far enough to
//! carry traffic.  The supervisor holds a [`SocksStatusSender`] and flips
//! it; every transport clone sees the change and every pending request
//! wakes up.

use async_trait::async_trait;
use futures::{AsyncRead, AsyncWrite, Stream, StreamExt};
use postage::watch;
use std::fmt::{self, Debug, Formatter};
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::net::SocketAddr;

use crate::rt::NetStreamProvider;
use crate::socks;

/// A capability for opening streams tunneled over Tor.
#[async_trait]
pub trait TorTransport: Clone + Send + Sync + 'static {
    /// The type of the tunneled streams returned by [`Self::connect()`].
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Return true if the local SOCKS endpoint is currently usable.
    fn is_socks_ready(&self) -> bool;

    /// Return a stream of readiness transitions.
    ///
    /// The stream is lossy in the same way as any watch: a slow reader
    /// only sees the most recent value.  The current value is always
    /// yielded first, so a subscriber never misses a transition that
    /// happened just before it subscribed.
    fn status_events(&self) -> SocksStatusEvents;

    /// Open a connection to `host:port` through the tunnel.
    async fn connect(&self, host: &str, port: u16) -> IoResult<Self::Stream>;
}

/// Create a linked readiness sender and watch.
///
/// The sender side belongs to whatever supervises the Tor daemon; the
/// watch side is cloned into each [`SocksTransport`].  Readiness begins as
/// false.
pub fn socks_status_channel() -> (SocksStatusSender, SocksStatusWatch) {
    let (tx, rx) = watch::channel();
    (
        SocksStatusSender { tx },
        SocksStatusWatch { rx },
    )
}

/// The writing half of the SOCKS readiness signal.
pub struct SocksStatusSender {
    /// The watch we publish on.
    tx: watch::Sender<bool>,
}

impl SocksStatusSender {
    /// Record whether the SOCKS endpoint is usable.
    ///
    /// Setting the same value twice is fine; watchers see each assignment,
    /// and treat a repeated value as no news.
    pub fn set_ready(&mut self, ready: bool) {
        *self.tx.borrow_mut() = ready;
    }
}

impl Debug for SocksStatusSender {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocksStatusSender").finish_non_exhaustive()
    }
}

/// The reading half of the SOCKS readiness signal.
#[derive(Clone)]
pub struct SocksStatusWatch {
    /// The watch we read from.
    rx: watch::Receiver<bool>,
}

impl SocksStatusWatch {
    /// Return the current readiness value.
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Return a stream of readiness values.
    pub fn events(&self) -> SocksStatusEvents {
        SocksStatusEvents {
            inner: self.rx.clone(),
        }
    }
}

impl Debug for SocksStatusWatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocksStatusWatch")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

/// A stream of SOCKS readiness values.
///
/// Yields the current value immediately, then each subsequent assignment
/// (subject to watch lossiness).
pub struct SocksStatusEvents {
    /// The receiver that implements this stream.
    ///
    /// (We wrap it in a new type here so that we can replace the
    /// implementation later on if we need to.)
    inner: watch::Receiver<bool>,
}

impl Stream for SocksStatusEvents {
    type Item = bool;
    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Debug for SocksStatusEvents {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocksStatusEvents").finish_non_exhaustive()
    }
}

/// A [`TorTransport`] that tunnels through the local Tor daemon's SOCKS5
/// proxy.
#[derive(Clone, Debug)]
pub struct SocksTransport<R> {
    /// The runtime that opens our TCP connections.
    runtime: R,
    /// Address of the local SOCKS5 endpoint.
    proxy: SocketAddr,
    /// Readiness, as reported by the Tor supervisor.
    status: SocksStatusWatch,
}

impl<R: NetStreamProvider> SocksTransport<R> {
    /// Make a new transport that connects through the SOCKS5 proxy at
    /// `proxy`.
    pub fn new(runtime: R, proxy: SocketAddr, status: SocksStatusWatch) -> Self {
        SocksTransport {
            runtime,
            proxy,
            status,
        }
    }
}

#[async_trait]
impl<R: NetStreamProvider> TorTransport for SocksTransport<R> {
    type Stream = R::Stream;

    fn is_socks_ready(&self) -> bool {
        self.status.is_ready()
    }

    fn status_events(&self) -> SocksStatusEvents {
        self.status.events()
    }

    async fn connect(&self, host: &str, port: u16) -> IoResult<Self::Stream> {
        if !self.is_socks_ready() {
            return Err(IoError::new(
                ErrorKind::NotConnected,
                "SOCKS proxy is not ready",
            ));
        }
        let stream = self.runtime.connect(&self.proxy).await?;
        socks::connect_over(stream, host, port).await
    }
}
