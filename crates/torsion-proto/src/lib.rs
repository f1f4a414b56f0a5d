//! `torsion-proto`: the client side of the Torsion contact request
//! protocol.
//!
//! # Overview
//!
//! Before two Torsion peers can talk, the initiating peer has to persuade a
//! stranger — known only by their onion address — to add them as a contact.
//! That out-of-band handshake is the *contact request*: connect to the
//! peer's hidden service through the local Tor SOCKS proxy, introduce the
//! connection's purpose, receive a 16-byte cookie, and send back a signed
//! request that binds the initiator's identity key to this one connection.
//!
//! [`ContactRequest`] drives the whole exchange as a single cooperative
//! async task: it waits for the SOCKS proxy to become usable, survives
//! arbitrarily long hidden-service reachability gaps with a fixed backoff
//! schedule, and on acceptance hands the still-open socket off to the
//! session layer as a primary connection.
//!
//! The crate is runtime-agnostic.  Networking and timers come in through
//! the small provider traits in [`rt`], and the Tor tunnel itself through
//! the [`TorTransport`] capability; [`SocksTransport`] is the production
//! implementation, and [`testing`] has in-memory substitutes for all of
//! them.

// @@ begin lint list maintained by maint/add_warning @@
#![allow(renamed_and_removed_lints)] // @@REMOVE_WHEN(ci_arti_stable)
#![allow(unknown_lints)] // @@REMOVE_WHEN(ci_arti_nightly)
#![warn(missing_docs)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(clippy::all)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::cargo_common_metadata)]
#![deny(clippy::cast_lossless)]
#![deny(clippy::checked_conversions)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::expl_impl_clone_on_copy)]
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::implicit_clone)]
#![deny(clippy::large_stack_arrays)]
#![warn(clippy::manual_ok_or)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::option_option)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![warn(clippy::rc_buffer)]
#![deny(clippy::ref_option_ref)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::trait_duplication_in_bounds)]
#![deny(clippy::unchecked_duration_subtraction)]
#![deny(clippy::unnecessary_wraps)]
#![warn(clippy::unseparated_literal_suffix)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::let_unit_value)] // This can reasonably be done for explicitness
#![allow(clippy::uninlined_format_args)]
//! <!-- @@ end lint list maintained by maint/add_warning @@ -->

mod backoff;
mod config;
mod err;
pub mod msg;
pub mod rt;
mod socks;
pub mod testing;
mod transport;

mod request;

pub use config::{ContactRequestConfig, ContactRequestConfigBuilder};
pub use err::RequestError;
pub use msg::{Purpose, ResponseStatus, PROTOCOL_VERSION};
pub use request::{
    ContactRequest, RequestEvent, RequestMonitor, RequestState, RequestStatusEvents, Response,
};
pub use transport::{
    socks_status_channel, SocksStatusEvents, SocksStatusSender, SocksStatusWatch, SocksTransport,
    TorTransport,
};

/// Result type used by fallible request operations in this crate.
pub type Result<T> = std::result::Result<T, RequestError>;
