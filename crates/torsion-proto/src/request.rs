//! The contact request state machine.
//!
//! A [`ContactRequest`] is the client side of one attempt to become a
//! stranger's contact.  It owns the whole exchange: wait for SOCKS, open a
//! connection to the peer's hidden service, introduce itself, sign the
//! server's cookie into a request frame, and interpret the one-byte
//! answers — retrying with backoff for as long as the service stays
//! unreachable, and handing the live socket to the session layer the
//! moment the peer says yes.
//!
//! The request runs as one cooperative task: call
//! [`run()`](ContactRequest::run) and drive the returned future on your
//! executor.  Progress comes back through the [`RequestMonitor`]: a stream
//! of [`RequestEvent`]s for the UI, a watchable [`RequestState`] for
//! anyone curious, and a [`close`](RequestMonitor::close) button.

use futures::channel::{mpsc, oneshot};
use futures::future::{self, Either};
use futures::io::{AsyncReadExt, AsyncWriteExt};
use futures::{pin_mut, Stream, StreamExt};
use postage::watch;
use std::fmt::{self, Debug, Formatter};

use tracing::{debug, trace};

use torsion_identity::{ContactId, LocalIdentity};

use crate::backoff::ReconnectDelay;
use crate::msg::{
    ContactRequestBody, Introduction, Purpose, RequestCookie, ResponseStatus, COOKIE_LEN,
    PROTOCOL_VERSION,
};
use crate::transport::TorTransport;
use crate::{rt::SleepProvider, ContactRequestConfig, RequestError};

/// Where a contact request is in its lifecycle.
///
/// The `Wait*` states each name the thing the request is waiting for; a
/// connection to the peer exists exactly while the request is in one of
/// them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum RequestState {
    /// Not yet started, or waiting for the SOCKS proxy to become usable.
    #[default]
    Idle,
    /// Connecting, or connected and waiting for the server's version byte.
    WaitConnect,
    /// Waiting for the server's 16-byte cookie.
    WaitCookie,
    /// Request sent; waiting for the first response byte.
    WaitAck,
    /// Request acknowledged; waiting for the remote user's decision.
    WaitResponse,
    /// Disconnected before an answer; a retry timer is running.
    Reconnecting,
    /// Finished, successfully or not.  Nothing further will happen.
    Done,
}

/// The responder's answer, as far as we know it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum Response {
    /// No answer yet.
    #[default]
    None,
    /// The request was delivered and awaits a human.
    Acknowledged,
    /// The request was accepted.
    Accepted,
    /// The request was rejected by the remote user.
    Rejected,
    /// The request failed: a protocol error, an unexpected status byte, or
    /// a local configuration problem.
    Error,
}

impl Response {
    /// Return true if this response ends the request for good.
    ///
    /// Once terminal, no reconnection is ever scheduled.
    pub fn is_terminal(self) -> bool {
        matches!(self, Response::Accepted | Response::Rejected | Response::Error)
    }
}

/// An event reported to the owner of a contact request.
///
/// These are the request's only outbound signals.
#[non_exhaustive]
pub enum RequestEvent<S> {
    /// The peer acknowledged the request; a human is deciding.
    Acknowledged,
    /// The peer accepted the request.
    ///
    /// Carries the still-open connection, detached from the request: the
    /// session layer takes full ownership of it as a primary connection.
    Accepted(S),
    /// The request ended with the given status byte.
    ///
    /// Sent for a user rejection (0x40), a version rejection (0x90), and
    /// any unrecognized status.
    Rejected(ResponseStatus),
    /// The [`Response`] value changed.  Emitted alongside the specific
    /// events above.
    ResponseChanged(Response),
}

impl<S> Debug for RequestEvent<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RequestEvent::Acknowledged => write!(f, "Acknowledged"),
            RequestEvent::Accepted(_) => write!(f, "Accepted(..)"),
            RequestEvent::Rejected(code) => write!(f, "Rejected({})", code),
            RequestEvent::ResponseChanged(r) => write!(f, "ResponseChanged({:?})", r),
        }
    }
}

/// A stream of [`RequestState`] values from one contact request.
///
/// Lossy in the usual watch way: a slow reader sees the newest state, not
/// every intermediate one.
pub struct RequestStatusEvents {
    /// The receiver that implements this stream.
    inner: watch::Receiver<RequestState>,
}

impl Stream for RequestStatusEvents {
    type Item = RequestState;
    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Debug for RequestStatusEvents {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestStatusEvents").finish_non_exhaustive()
    }
}

/// The caller's handle on a running [`ContactRequest`].
///
/// Implements [`Stream`], yielding each [`RequestEvent`] in order.
/// Dropping the monitor closes the request.
pub struct RequestMonitor<S> {
    /// Events from the request task.
    events: mpsc::UnboundedReceiver<RequestEvent<S>>,
    /// The request's current state.
    state: watch::Receiver<RequestState>,
    /// Tells the request task to stop.  `None` once used.
    close_tx: Option<oneshot::Sender<()>>,
}

impl<S> RequestMonitor<S> {
    /// Return the request's current state.
    pub fn state(&self) -> RequestState {
        *self.state.borrow()
    }

    /// Return a stream of state changes.
    pub fn status_events(&self) -> RequestStatusEvents {
        RequestStatusEvents {
            inner: self.state.clone(),
        }
    }

    /// Close the request.
    ///
    /// Aborts any open connection, cancels any pending retry, and moves
    /// the request to [`RequestState::Done`] without emitting any further
    /// events.  Closing an already-closed or finished request does
    /// nothing.
    pub fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            // An Err here means the request already finished; that's fine.
            let _ = tx.send(());
        }
    }

    /// Wait for the next event from the request.
    ///
    /// Returns `None` once the request has finished and every event has
    /// been delivered.
    pub async fn next_event(&mut self) -> Option<RequestEvent<S>> {
        self.events.next().await
    }
}

impl<S> Stream for RequestMonitor<S> {
    type Item = RequestEvent<S>;
    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

impl<S> Debug for RequestMonitor<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMonitor")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// What became of one connection attempt.
enum AttemptOutcome {
    /// A terminal response was handled; the request is over.
    Finished,
    /// The connection died before a terminal response; retry later.
    Disconnected,
}

/// A pending request to be added as a contact of another Torsion user.
///
/// Construct one with [`ContactRequest::new`], then await
/// [`run()`](ContactRequest::run).  See the [module docs](self) for the
/// full lifecycle.
pub struct ContactRequest<T, SP>
where
    T: TorTransport,
    SP: SleepProvider,
{
    /// The transport we reach the peer through.
    transport: T,
    /// Timer source for the reconnect backoff.
    sleep: SP,
    /// The local identity making the request.
    identity: LocalIdentity,
    /// The peer we are asking.
    target: ContactId,
    /// The nickname we ask the peer to know us by.
    my_nickname: String,
    /// Our greeting message.
    message: String,
    /// Protocol configuration.
    config: ContactRequestConfig,
    /// Failed-attempt counter and backoff schedule.
    delay: ReconnectDelay,
    /// The responder's answer so far.
    response: Response,
    /// Where we publish state changes.
    state_tx: watch::Sender<RequestState>,
    /// Where we publish events.
    events_tx: mpsc::UnboundedSender<RequestEvent<T::Stream>>,
    /// How the monitor tells us to stop.  Taken by `run()`.
    close_rx: Option<oneshot::Receiver<()>>,
}

impl<T, SP> ContactRequest<T, SP>
where
    T: TorTransport,
    SP: SleepProvider,
{
    /// Create a new contact request addressed to `target`.
    ///
    /// `identity` supplies the local hostname, the contact secret bound to
    /// `target`, and the signing key.  Nothing happens on the network
    /// until the returned request's [`run()`](ContactRequest::run) future
    /// is polled.
    pub fn new(
        transport: T,
        sleep: SP,
        identity: LocalIdentity,
        target: ContactId,
        my_nickname: impl Into<String>,
        message: impl Into<String>,
        config: ContactRequestConfig,
    ) -> (Self, RequestMonitor<T::Stream>) {
        let (events_tx, events_rx) = mpsc::unbounded();
        let (state_tx, state_rx) = watch::channel();
        let (close_tx, close_rx) = oneshot::channel();

        let request = ContactRequest {
            transport,
            sleep,
            identity,
            target,
            my_nickname: my_nickname.into(),
            message: message.into(),
            config,
            delay: ReconnectDelay::new(),
            response: Response::None,
            state_tx,
            events_tx,
            close_rx: Some(close_rx),
        };
        let monitor = RequestMonitor {
            events: events_rx,
            state: state_rx,
            close_tx: Some(close_tx),
        };
        (request, monitor)
    }

    /// Drive this request to completion.
    ///
    /// Resolves once a terminal response has been handled, a local error
    /// has aborted the request, or the monitor closed it.  Network
    /// failures never resolve this future; they feed the reconnect loop.
    pub async fn run(mut self) -> crate::Result<()> {
        let close_rx = match self.close_rx.take() {
            Some(rx) => rx,
            None => return Err(RequestError::Closed),
        };

        let closed = {
            let drive = self.drive();
            pin_mut!(drive);
            match future::select(close_rx, drive).await {
                Either::Left(_) => None,
                Either::Right((result, _)) => Some(result),
            }
        };

        match closed {
            None => {
                // Closed from outside: tear down silently.
                debug!(peer = %self.target, "contact request closed");
                self.set_state(RequestState::Done);
                Ok(())
            }
            Some(result) => {
                self.set_state(RequestState::Done);
                result
            }
        }
    }

    /// The request loop: connect, attempt, reschedule, forever — until a
    /// terminal response or a local error.
    async fn drive(&mut self) -> crate::Result<()> {
        loop {
            self.wait_for_socks().await;
            self.set_state(RequestState::WaitConnect);

            let host = self.target.hostname();
            let port = self.config.contact_port();
            trace!(peer = %self.target, %port, "opening connection for contact request");
            let stream = match self.transport.connect(&host, port).await {
                Ok(s) => s,
                Err(e) => {
                    debug!(peer = %self.target, error = %e, "contact request connection failed");
                    self.schedule_reconnect().await;
                    continue;
                }
            };
            debug!(peer = %self.target, "contact request connected");

            match self.attempt(stream).await {
                Ok(AttemptOutcome::Finished) => return Ok(()),
                Ok(AttemptOutcome::Disconnected) => {
                    self.schedule_reconnect().await;
                }
                Err(e) => {
                    // A caller-side problem: bad key material or an
                    // unencodable frame.  Not retriable.
                    debug!(peer = %self.target, error = %e, "aborting contact request");
                    self.set_response(Response::Error);
                    self.emit(RequestEvent::ResponseChanged(Response::Error));
                    return Err(e);
                }
            }
        }
    }

    /// Run one connection's worth of the protocol over `stream`.
    ///
    /// `Ok(Disconnected)` is any network-level failure; `Err` is reserved
    /// for local problems that must not be retried.
    async fn attempt(&mut self, mut stream: T::Stream) -> crate::Result<AttemptOutcome> {
        // Introduce ourselves. The server answers with its own version
        // byte, then a cookie; the cookie may arrive in the same burst.
        let intro = Introduction::new(Purpose::CONTACT_REQUEST).encode();
        if write_all_flushed(&mut stream, &intro).await.is_err() {
            return Ok(AttemptOutcome::Disconnected);
        }

        let mut version = [0_u8; 1];
        if stream.read_exact(&mut version).await.is_err() {
            return Ok(AttemptOutcome::Disconnected);
        }
        if version[0] != PROTOCOL_VERSION {
            debug!(
                peer = %self.target,
                version = version[0],
                "peer speaks an unknown protocol version"
            );
            self.set_response(Response::Error);
            self.emit(RequestEvent::ResponseChanged(Response::Error));
            self.emit(RequestEvent::Rejected(ResponseStatus::VERSION_REJECTED));
            return Ok(AttemptOutcome::Finished);
        }

        self.set_state(RequestState::WaitCookie);
        let mut cookie = [0_u8; COOKIE_LEN];
        if stream.read_exact(&mut cookie).await.is_err() {
            return Ok(AttemptOutcome::Disconnected);
        }

        // We have everything we need; build and send the signed request.
        let frame = self.build_request(RequestCookie::new(cookie))?;
        self.set_state(RequestState::WaitAck);
        if write_all_flushed(&mut stream, &frame).await.is_err() {
            return Ok(AttemptOutcome::Disconnected);
        }
        trace!(peer = %self.target, "sent contact request data");

        // The socket lives in an Option from here on, so that acceptance
        // can move it out to the session layer and leave teardown nothing
        // to close.
        let mut slot = Some(stream);
        loop {
            let mut code = [0_u8; 1];
            let read = match slot.as_mut() {
                Some(s) => s.read_exact(&mut code).await,
                None => return Ok(AttemptOutcome::Finished),
            };
            if read.is_err() {
                return Ok(AttemptOutcome::Disconnected);
            }
            if self.handle_response(code[0].into(), &mut slot) {
                return Ok(AttemptOutcome::Finished);
            }
        }
    }

    /// Interpret one response byte.  Returns true when the response is
    /// terminal.
    fn handle_response(&mut self, status: ResponseStatus, slot: &mut Option<T::Stream>) -> bool {
        match status {
            ResponseStatus::ACKNOWLEDGED if self.response == Response::None => {
                debug!(peer = %self.target, "contact request acknowledged; waiting for response");
                self.set_response(Response::Acknowledged);
                self.set_state(RequestState::WaitResponse);
                self.emit(RequestEvent::Acknowledged);
                self.emit(RequestEvent::ResponseChanged(Response::Acknowledged));
                false
            }
            ResponseStatus::ACCEPTED => {
                debug!(peer = %self.target, "contact request accepted; converting connection to primary");
                self.set_response(Response::Accepted);
                if let Some(stream) = slot.take() {
                    self.emit(RequestEvent::Accepted(stream));
                }
                self.emit(RequestEvent::ResponseChanged(Response::Accepted));
                true
            }
            ResponseStatus::REJECTED => {
                debug!(peer = %self.target, "contact request rejected by user");
                self.set_response(Response::Rejected);
                self.emit(RequestEvent::ResponseChanged(Response::Rejected));
                self.emit(RequestEvent::Rejected(status));
                true
            }
            other => {
                debug!(peer = %self.target, code = %other, "contact request rejected with error");
                self.set_response(Response::Error);
                self.emit(RequestEvent::ResponseChanged(Response::Error));
                self.emit(RequestEvent::Rejected(other));
                true
            }
        }
    }

    /// Assemble and sign the request frame around the server's cookie.
    fn build_request(&self, cookie: RequestCookie) -> crate::Result<Vec<u8>> {
        let body = ContactRequestBody {
            hostname: *self.identity.hostname(),
            cookie,
            secret: self.identity.secret().clone(),
            nickname: self.my_nickname.clone(),
            message: self.message.clone(),
        };
        body.encode_signed(self.identity.signing_key())
    }

    /// Block until the SOCKS proxy reports ready.
    async fn wait_for_socks(&mut self) {
        if self.transport.is_socks_ready() {
            return;
        }
        debug!(peer = %self.target, "waiting for SOCKS before sending contact request");
        self.set_state(RequestState::Idle);
        let mut events = self.transport.status_events();
        while let Some(ready) = events.next().await {
            if ready {
                return;
            }
        }
        // The readiness watch went away entirely; fall through and let the
        // connect attempt fail into the retry loop.
    }

    /// Record a failed attempt and wait out the backoff delay.
    async fn schedule_reconnect(&mut self) {
        if self.response.is_terminal() {
            return;
        }
        let delay = self.delay.next_delay();
        debug!(
            peer = %self.target,
            attempt = self.delay.attempts(),
            delay_s = delay.as_secs(),
            "scheduling reconnection of contact request"
        );
        self.set_state(RequestState::Reconnecting);
        self.sleep.sleep(delay).await;
    }

    /// Publish a state change.
    fn set_state(&mut self, state: RequestState) {
        trace!(peer = %self.target, ?state, "contact request state change");
        *self.state_tx.borrow_mut() = state;
    }

    /// Record a response change.
    fn set_response(&mut self, response: Response) {
        self.response = response;
    }

    /// Send an event to the monitor, if it is still listening.
    fn emit(&mut self, event: RequestEvent<T::Stream>) {
        let _ = self.events_tx.unbounded_send(event);
    }
}

impl<T, SP> Debug for ContactRequest<T, SP>
where
    T: TorTransport,
    SP: SleepProvider,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactRequest")
            .field("target", &self.target)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

/// Helper: write `data` and flush, treating any failure as one IO error.
async fn write_all_flushed<S>(stream: &mut S, data: &[u8]) -> std::io::Result<()>
where
    S: futures::AsyncWrite + Unpin,
{
    stream.write_all(data).await?;
    stream.flush().await
}
