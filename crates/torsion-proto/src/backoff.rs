//! Scheduling for contact request reconnection attempts.
//!
//! Hidden services come and go: the peer's machine may be offline for
//! hours, and Tor itself can take a while to make a service reachable
//! again.  Rather than an exponential schedule with jitter, contact
//! requests use the fixed ladder the protocol has always used: quick
//! retries at first, then progressively patient ones, with no upper bound
//! on the number of attempts.

use std::time::Duration;

/// Tracks how often a contact request has failed to connect, and how long
/// to wait before trying again.
///
/// The counter only ever grows: a successful TCP connect does not reset
/// it, since reaching the peer's Tor entry point says nothing about
/// whether the peer will stay reachable.  It is discarded along with the
/// request.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReconnectDelay {
    /// How many connection attempts have failed so far.
    attempts: u32,
}

impl ReconnectDelay {
    /// Make a new delay tracker with no recorded attempts.
    pub(crate) fn new() -> Self {
        ReconnectDelay::default()
    }

    /// Record one more failed attempt, and return how long to wait before
    /// the next one.
    pub(crate) fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        delay_for_attempt(self.attempts)
    }

    /// Return the number of failed attempts recorded so far.
    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Return the reconnect delay used after `attempt` failures.
fn delay_for_attempt(attempt: u32) -> Duration {
    let seconds = if attempt <= 4 {
        30
    } else if attempt <= 6 {
        120
    } else {
        600
    };
    Duration::from_secs(seconds)
}
