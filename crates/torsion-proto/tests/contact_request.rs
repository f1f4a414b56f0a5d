//! End-to-end tests for the contact request state machine, using scripted
//! transports and a mock timer.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use futures::executor::{block_on, LocalPool};
use futures::io::{AsyncReadExt, AsyncWriteExt};
use futures::join;
use futures::task::LocalSpawnExt;

use torsion_identity::{ContactId, ContactSecret, LocalIdentity, ServiceKeypair};
use torsion_proto::msg::ParsedContactRequest;
use torsion_proto::testing::{LocalStream, MockSleepProvider, MockTransport};
use torsion_proto::{
    ContactRequest, ContactRequestConfig, RequestEvent, RequestState, Response, ResponseStatus,
};

/// The cookie our scripted servers hand out.
const COOKIE: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];

fn test_identity() -> LocalIdentity {
    let key = ServiceKeypair::generate(&mut rand::thread_rng());
    LocalIdentity::new(
        "abcdefghijklmnop".parse().unwrap(),
        ContactSecret::new(*b"0123456789abcdef"),
        Arc::new(key),
    )
}

fn target() -> ContactId {
    "torsion:qrstuvwxyz234567".parse().unwrap()
}

fn new_request(
    transport: &MockTransport,
    sleep: &MockSleepProvider,
) -> (
    ContactRequest<MockTransport, MockSleepProvider>,
    torsion_proto::RequestMonitor<LocalStream>,
) {
    ContactRequest::new(
        transport.clone(),
        sleep.clone(),
        test_identity(),
        target(),
        "ada",
        "it's me, from the party",
        ContactRequestConfig::default(),
    )
}

/// Drive the server's half of a successful preamble: check the
/// introduction, send version and cookie, and read back the request
/// frame, verifying its structure and signature.
async fn serve_preamble(peer: &mut LocalStream, fused: bool) {
    let mut intro = [0_u8; 2];
    peer.read_exact(&mut intro).await.unwrap();
    assert_eq!(intro, [0x01, 0x80]);

    if fused {
        let mut burst = vec![0x01];
        burst.extend_from_slice(&COOKIE);
        peer.write_all(&burst).await.unwrap();
    } else {
        peer.write_all(&[0x01]).await.unwrap();
        peer.write_all(&COOKIE).await.unwrap();
    }

    let mut len_bytes = [0_u8; 2];
    peer.read_exact(&mut len_bytes).await.unwrap();
    let len = usize::from(u16::from_be_bytes(len_bytes));
    let mut rest = vec![0_u8; len];
    peer.read_exact(&mut rest).await.unwrap();

    let mut frame = len_bytes.to_vec();
    frame.extend_from_slice(&rest);
    let parsed = ParsedContactRequest::parse(&frame).unwrap();
    assert_eq!(&parsed.hostname, b"abcdefghijklmnop");
    assert_eq!(parsed.cookie.as_bytes(), &COOKIE);
    assert_eq!(&parsed.secret, b"0123456789abcdef");
    assert_eq!(parsed.nickname, "ada");
    assert_eq!(parsed.message, "it's me, from the party");
    assert!(ServiceKeypair::verify(
        &parsed.public_key,
        parsed.signed_region(&frame),
        &parsed.signature,
    ));
}

#[test]
fn happy_path() {
    let (transport, mut readiness) = MockTransport::new();
    readiness.set_ready(true);
    let mut peer = transport.push_stream();
    let sleep = MockSleepProvider::new();
    let (request, mut monitor) = new_request(&transport, &sleep);

    let server = async move {
        serve_preamble(&mut peer, false).await;
        peer.write_all(&[0x00]).await.unwrap(); // acknowledged
        peer.write_all(&[0x01]).await.unwrap(); // accepted
        peer
    };

    let (result, mut peer) = block_on(async { join!(request.run(), server) });
    result.unwrap();
    assert_eq!(monitor.state(), RequestState::Done);

    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::Acknowledged)
    ));
    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::ResponseChanged(Response::Acknowledged))
    ));
    let handed_off = match block_on(monitor.next_event()) {
        Some(RequestEvent::Accepted(stream)) => stream,
        other => panic!("expected Accepted, got {:?}", other),
    };
    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::ResponseChanged(Response::Accepted))
    ));
    assert!(block_on(monitor.next_event()).is_none());

    // The detached socket is alive and belongs to us now: the "session
    // layer" can keep talking on it.
    block_on(async move {
        let mut session = handed_off;
        peer.write_all(b"primary").await.unwrap();
        let mut buf = [0_u8; 7];
        session.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"primary");
    });

    // No reconnections happened along the way.
    assert!(sleep.delays().is_empty());
    assert_eq!(transport.attempts(), vec!["qrstuvwxyz234567.onion:9878"]);
}

#[test]
fn user_rejection() {
    let (transport, mut readiness) = MockTransport::new();
    readiness.set_ready(true);
    let mut peer = transport.push_stream();
    let sleep = MockSleepProvider::new();
    let (request, mut monitor) = new_request(&transport, &sleep);

    let server = async move {
        serve_preamble(&mut peer, false).await;
        peer.write_all(&[0x40]).await.unwrap();
        peer
    };

    let (result, peer) = block_on(async { join!(request.run(), server) });
    result.unwrap();

    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::ResponseChanged(Response::Rejected))
    ));
    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::Rejected(ResponseStatus::REJECTED))
    ));
    assert!(block_on(monitor.next_event()).is_none());

    // Terminal: the later disconnect of the peer must not trigger a
    // retry.
    drop(peer);
    assert!(sleep.delays().is_empty());
    assert_eq!(transport.attempts().len(), 1);
    assert_eq!(monitor.state(), RequestState::Done);
}

#[test]
fn version_mismatch() {
    let (transport, mut readiness) = MockTransport::new();
    readiness.set_ready(true);
    let mut peer = transport.push_stream();
    let sleep = MockSleepProvider::new();
    let (request, mut monitor) = new_request(&transport, &sleep);

    let server = async move {
        let mut intro = [0_u8; 2];
        peer.read_exact(&mut intro).await.unwrap();
        peer.write_all(&[0x02]).await.unwrap();
        peer
    };

    let (result, _peer) = block_on(async { join!(request.run(), server) });
    result.unwrap();

    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::ResponseChanged(Response::Error))
    ));
    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::Rejected(ResponseStatus::VERSION_REJECTED))
    ));
    assert!(block_on(monitor.next_event()).is_none());

    // A version rejection is terminal; no reconnect was scheduled.
    assert!(sleep.delays().is_empty());
    assert_eq!(monitor.state(), RequestState::Done);
}

#[test]
fn flaky_connects_then_success() {
    let (transport, mut readiness) = MockTransport::new();
    readiness.set_ready(true);
    transport.push_refusal();
    transport.push_refusal();
    transport.push_refusal();
    let mut peer = transport.push_stream();
    let sleep = MockSleepProvider::new();
    let (request, mut monitor) = new_request(&transport, &sleep);

    let server = async move {
        serve_preamble(&mut peer, false).await;
        peer.write_all(&[0x00]).await.unwrap();
        peer.write_all(&[0x01]).await.unwrap();
        peer
    };

    let (result, _peer) = block_on(async { join!(request.run(), server) });
    result.unwrap();

    // Three failures, each backed off by 30 seconds, then success.
    assert_eq!(
        sleep.delays(),
        vec![
            Duration::from_secs(30),
            Duration::from_secs(30),
            Duration::from_secs(30)
        ]
    );
    assert_eq!(transport.attempts().len(), 4);

    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::Acknowledged)
    ));
    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::ResponseChanged(Response::Acknowledged))
    ));
    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::Accepted(_))
    ));
    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::ResponseChanged(Response::Accepted))
    ));
}

#[test]
fn waits_for_socks_readiness() {
    let (transport, mut readiness) = MockTransport::new();
    let mut peer = transport.push_stream();
    let sleep = MockSleepProvider::new();
    let (request, monitor) = new_request(&transport, &sleep);

    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    spawner
        .spawn_local(async move {
            request.run().await.unwrap();
        })
        .unwrap();

    // SOCKS is not ready: the request parks itself without connecting.
    pool.run_until_stalled();
    assert!(transport.attempts().is_empty());
    assert_eq!(monitor.state(), RequestState::Idle);

    // Readiness arrives; the connection begins on the next turn.
    readiness.set_ready(true);
    pool.run_until_stalled();
    assert_eq!(transport.attempts().len(), 1);

    spawner
        .spawn_local(async move {
            serve_preamble(&mut peer, false).await;
            peer.write_all(&[0x00]).await.unwrap();
            peer.write_all(&[0x01]).await.unwrap();
            // The written bytes stay readable after we hang up.
        })
        .unwrap();
    pool.run();

    assert_eq!(monitor.state(), RequestState::Done);
}

#[test]
fn fused_version_and_cookie() {
    let (transport, mut readiness) = MockTransport::new();
    readiness.set_ready(true);
    let mut peer = transport.push_stream();
    let sleep = MockSleepProvider::new();
    let (request, mut monitor) = new_request(&transport, &sleep);

    let server = async move {
        // Version byte and all 16 cookie bytes in a single burst.
        serve_preamble(&mut peer, true).await;
        peer.write_all(&[0x00]).await.unwrap();
        peer.write_all(&[0x01]).await.unwrap();
        peer
    };

    let (result, _peer) = block_on(async { join!(request.run(), server) });
    result.unwrap();

    // The request was written exactly once: serve_preamble read exactly
    // one frame and the exchange completed.
    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::Acknowledged)
    ));
    assert_eq!(transport.attempts().len(), 1);
    assert!(sleep.delays().is_empty());
}

#[test]
fn close_is_idempotent() {
    let (transport, _readiness) = MockTransport::new();
    let sleep = MockSleepProvider::new();
    let (request, mut monitor) = new_request(&transport, &sleep);

    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    spawner
        .spawn_local(async move {
            // A closed request resolves cleanly.
            request.run().await.unwrap();
        })
        .unwrap();
    pool.run_until_stalled();

    monitor.close();
    monitor.close();
    pool.run();

    assert_eq!(monitor.state(), RequestState::Done);
    // Closing emitted no events.
    assert!(block_on(monitor.next_event()).is_none());
}

#[test]
fn disconnect_after_ack_reconnects() {
    // A failure after Acknowledged is still a network failure: the
    // request goes back to the reconnect loop rather than giving up.
    let (transport, mut readiness) = MockTransport::new();
    readiness.set_ready(true);
    let mut first = transport.push_stream();
    let mut second = transport.push_stream();
    let sleep = MockSleepProvider::new();
    let (request, mut monitor) = new_request(&transport, &sleep);

    let server = async move {
        serve_preamble(&mut first, false).await;
        first.write_all(&[0x00]).await.unwrap();
        drop(first); // hang up mid-wait

        serve_preamble(&mut second, false).await;
        second.write_all(&[0x01]).await.unwrap();
        second
    };

    let (result, _peer) = block_on(async { join!(request.run(), server) });
    result.unwrap();

    assert_eq!(sleep.delays(), vec![Duration::from_secs(30)]);
    assert_eq!(transport.attempts().len(), 2);

    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::Acknowledged)
    ));
    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::ResponseChanged(Response::Acknowledged))
    ));
    assert!(matches!(
        block_on(monitor.next_event()),
        Some(RequestEvent::Accepted(_))
    ));
}
