//! Test doubles for the transport and timer capabilities.
//!
//! Everything here is for testing only: in-memory socketpairs, a transport
//! whose "connections" follow a script, and a sleep provider that returns
//! instantly while remembering what it was asked to wait for.  None of it
//! is optimized.

use futures::channel::mpsc;
use futures::io::{AsyncRead, AsyncWrite};
use futures::sink::{Sink, SinkExt};
use futures::stream::Stream;
use std::collections::VecDeque;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;

use crate::rt::SleepProvider;
use crate::transport::{
    socks_status_channel, SocksStatusEvents, SocksStatusSender, SocksStatusWatch, TorTransport,
};

/// Channel capacity for our internal MPSC channels.
///
/// We keep this intentionally low to make sure that some blocking
/// will occur occasionally.
const CAPACITY: usize = 4;

/// Maximum size for a queued buffer on a local chunk.
///
/// This size is deliberately weird, to try to find errors.
const CHUNKSZ: usize = 213;

/// Construct a new pair of linked LocalStream objects.
///
/// Any bytes written to one will be readable on the other, and vice
/// versa.  These streams will behave more or less like a socketpair,
/// except without actually going through the operating system.
pub fn stream_pair() -> (LocalStream, LocalStream) {
    let (w1, r2) = mpsc::channel(CAPACITY);
    let (w2, r1) = mpsc::channel(CAPACITY);
    let s1 = LocalStream {
        w: w1,
        r: r1,
        pending_bytes: Vec::new(),
    };
    let s2 = LocalStream {
        w: w2,
        r: r2,
        pending_bytes: Vec::new(),
    };
    (s1, s2)
}

/// One half of a pair of linked streams returned by [`stream_pair`].
//
// Implementation notes: linked streams are made out of a pair of mpsc
// channels.  There's one channel for sending bytes in each direction.
// Bytes are sent as IoResult<Vec<u8>>: sending an error causes an error
// to occur on the other side.
pub struct LocalStream {
    /// The writing side of the channel that we use to implement this
    /// stream.
    ///
    /// The reading side is held by the other linked stream.
    w: mpsc::Sender<IoResult<Vec<u8>>>,
    /// The reading side of the channel that we use to implement this
    /// stream.
    ///
    /// The writing side is held by the other linked stream.
    r: mpsc::Receiver<IoResult<Vec<u8>>>,
    /// Bytes that we have read from `r` but not yet delivered.
    pending_bytes: Vec<u8>,
}

impl LocalStream {
    /// Send an error to the other linked local stream.
    ///
    /// When the other stream reads this message, it will generate a
    /// [`std::io::Error`] with the provided `ErrorKind`.
    pub async fn send_err(&mut self, kind: ErrorKind) {
        let _ignore = self.w.send(Err(IoError::new(kind, "synthetic error"))).await;
    }
}

/// Helper: pull bytes off the front of `pending_bytes` and put them
/// onto `buf`.  Return the number of bytes moved.
fn drain_helper(buf: &mut [u8], pending_bytes: &mut Vec<u8>) -> usize {
    let n_to_drain = std::cmp::min(buf.len(), pending_bytes.len());
    buf[..n_to_drain].copy_from_slice(&pending_bytes[..n_to_drain]);
    pending_bytes.drain(..n_to_drain);
    n_to_drain
}

impl AsyncRead for LocalStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<IoResult<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        if !self.pending_bytes.is_empty() {
            return Poll::Ready(Ok(drain_helper(buf, &mut self.pending_bytes)));
        }

        match futures::ready!(Pin::new(&mut self.r).poll_next(cx)) {
            Some(Err(e)) => Poll::Ready(Err(e)),
            Some(Ok(bytes)) => {
                self.pending_bytes = bytes;
                let n = drain_helper(buf, &mut self.pending_bytes);
                Poll::Ready(Ok(n))
            }
            None => Poll::Ready(Ok(0)), // This is an EOF
        }
    }
}

impl AsyncWrite for LocalStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<IoResult<usize>> {
        match futures::ready!(Pin::new(&mut self.w).poll_ready(cx)) {
            Ok(()) => (),
            Err(e) => return Poll::Ready(Err(IoError::new(ErrorKind::BrokenPipe, e))),
        }

        let buf = if buf.len() > CHUNKSZ {
            &buf[..CHUNKSZ]
        } else {
            buf
        };
        let len = buf.len();
        match Pin::new(&mut self.w).start_send(Ok(buf.to_vec())) {
            Ok(()) => Poll::Ready(Ok(len)),
            Err(e) => Poll::Ready(Err(IoError::new(ErrorKind::BrokenPipe, e))),
        }
    }
    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        Pin::new(&mut self.w)
            .poll_flush(cx)
            .map_err(|e| IoError::new(ErrorKind::BrokenPipe, e))
    }
    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        Pin::new(&mut self.w)
            .poll_close(cx)
            .map_err(|e| IoError::new(ErrorKind::Other, e))
    }
}

/// A [`SleepProvider`] that never actually sleeps.
///
/// Every requested delay completes immediately and is recorded, so tests
/// can assert on the schedule a component asked for without waiting it
/// out.
#[derive(Clone, Debug, Default)]
pub struct MockSleepProvider {
    /// Every delay that has been requested so far, in order.
    requested: Arc<Mutex<Vec<Duration>>>,
}

impl MockSleepProvider {
    /// Make a new mock sleep provider with no recorded delays.
    pub fn new() -> Self {
        MockSleepProvider::default()
    }

    /// Return every delay that has been requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.requested.lock().expect("poisoned lock").clone()
    }
}

impl SleepProvider for MockSleepProvider {
    type SleepFuture = futures::future::Ready<()>;
    fn sleep(&self, duration: Duration) -> Self::SleepFuture {
        self.requested.lock().expect("poisoned lock").push(duration);
        futures::future::ready(())
    }
}

/// One scripted outcome for a [`MockTransport`] connection attempt.
enum ScriptedConnect {
    /// Fail as if the service were unreachable.
    Refuse,
    /// Succeed, yielding this stream.
    Open(LocalStream),
}

/// Shared state for a [`MockTransport`].
#[derive(Default)]
struct MockTransportInner {
    /// Outcomes for future connection attempts, first in front.
    script: VecDeque<ScriptedConnect>,
    /// Every `host:port` that connect() has been asked for.
    attempts: Vec<String>,
}

/// A scripted [`TorTransport`] for tests.
///
/// Each call to `connect` consumes the next scripted outcome; an empty
/// script refuses the connection.  Readiness starts out false and is
/// driven through the returned [`SocksStatusSender`].
#[derive(Clone)]
pub struct MockTransport {
    /// The script and the attempt log.
    inner: Arc<Mutex<MockTransportInner>>,
    /// Readiness, as set by the test.
    status: SocksStatusWatch,
}

impl MockTransport {
    /// Make a new transport with an empty script, along with the handle
    /// that controls its readiness.
    pub fn new() -> (Self, SocksStatusSender) {
        let (sender, status) = socks_status_channel();
        (
            MockTransport {
                inner: Arc::new(Mutex::new(MockTransportInner::default())),
                status,
            },
            sender,
        )
    }

    /// Script one refused connection attempt.
    pub fn push_refusal(&self) {
        self.inner
            .lock()
            .expect("poisoned lock")
            .script
            .push_back(ScriptedConnect::Refuse);
    }

    /// Script one successful connection attempt, returning the peer's end
    /// of the stream that `connect` will yield.
    pub fn push_stream(&self) -> LocalStream {
        let (ours, theirs) = stream_pair();
        self.inner
            .lock()
            .expect("poisoned lock")
            .script
            .push_back(ScriptedConnect::Open(ours));
        theirs
    }

    /// Return every `host:port` connect() has been asked to reach.
    pub fn attempts(&self) -> Vec<String> {
        self.inner.lock().expect("poisoned lock").attempts.clone()
    }
}

#[async_trait]
impl TorTransport for MockTransport {
    type Stream = LocalStream;

    fn is_socks_ready(&self) -> bool {
        self.status.is_ready()
    }

    fn status_events(&self) -> SocksStatusEvents {
        self.status.events()
    }

    async fn connect(&self, host: &str, port: u16) -> IoResult<Self::Stream> {
        let next = {
            let mut inner = self.inner.lock().expect("poisoned lock");
            inner.attempts.push(format!("{}:{}", host, port));
            inner.script.pop_front()
        };
        match next {
            Some(ScriptedConnect::Open(stream)) => Ok(stream),
            Some(ScriptedConnect::Refuse) | None => Err(IoError::new(
                ErrorKind::ConnectionRefused,
                "scripted connection refusal",
            )),
        }
    }
}
