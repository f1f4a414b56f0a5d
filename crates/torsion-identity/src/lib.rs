//! `torsion-identity`: contact identifiers and identity keys for Torsion.
//!
//! # Overview
//!
//! A Torsion user *is* a Tor hidden service: the service's 16-character
//! base32 hostname doubles as the user's address, rendered for humans as
//! `torsion:<base32>`.  This crate owns that mapping.  It provides:
//!
//! * [`ContactId`] — a validated peer identifier, with conversions to and
//!   from the `.onion` hostname form.
//! * [`ContactIdValidator`] — incremental validation for UI input fields,
//!   including detection of identifiers that already name a known contact.
//! * [`ServiceHostname`] and [`ContactSecret`] — the local identity
//!   material that a contact request binds itself to on the wire.
//! * [`SigningKey`] — the capability through which protocol code signs
//!   requests with the local hidden service key, and [`ServiceKeypair`],
//!   its Ed25519 implementation.
//!
//! Storage of identities, and the Tor controller that publishes the hidden
//! service, live elsewhere; this crate only describes the material they
//! hand to the protocol layer.

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

mod contact_id;
mod err;
mod keys;

pub use contact_id::{
    ContactId, ContactIdValidator, ContactLookup, IdValidity, ServiceHostname, Validation,
};
pub use err::{KeyError, ParseError};
pub use keys::{ContactSecret, LocalIdentity, ServiceKeypair, SigningKey, CONTACT_SECRET_LEN};

/// The number of base32 characters in a hidden service hostname.
pub const HOSTNAME_LEN: usize = 16;

/// The scheme prefix on the textual form of a contact identifier.
pub const ID_PREFIX: &str = "torsion:";
