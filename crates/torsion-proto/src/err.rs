//! Internal: Declare the error type for torsion-proto

use std::sync::Arc;

use thiserror::Error;

/// An error that aborts a contact request.
///
/// Only caller-side problems surface here: a bad local hostname or secret,
/// unloaded key material, or a frame that would not encode.  Network-level
/// failures never become a `RequestError`; the request recovers from those
/// itself by reconnecting.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum RequestError {
    /// The local identity's key material was missing or would not sign.
    #[error("Identity key problem")]
    Key(#[from] torsion_identity::KeyError),

    /// The request frame would not encode.
    #[error("Could not encode contact request")]
    Encode(#[from] torsion_bytes::EncodeError),

    /// A received frame would not parse.
    #[error("Could not decode protocol message")]
    Decode(#[from] torsion_bytes::Error),

    /// The request was closed by its owner before it finished.
    #[error("Request closed")]
    Closed,

    /// An IO error that we do not treat as retriable.
    ///
    /// (Retriable IO errors are handled internally by the reconnect loop;
    /// this variant is only used when the transport is unusable in a way
    /// that retrying cannot fix.)
    #[error("Transport unusable")]
    Io(#[source] Arc<std::io::Error>),
}
