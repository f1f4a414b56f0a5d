//! Internal: Declare the error types for torsion-identity

use thiserror::Error;

/// An error from parsing a contact identifier or service hostname.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    /// The string was not a well-formed `torsion:` contact identifier.
    #[error("Not a valid contact identifier")]
    BadContactId,
    /// The string was not a 16-character base32 service hostname, with or
    /// without its `.onion` suffix.
    #[error("Not a valid hidden service hostname")]
    BadHostname,
    /// A secret value had the wrong length.
    #[error("Secret had the wrong length (expected {expected} bytes)")]
    BadSecretLen {
        /// The length the secret should have had.
        expected: usize,
    },
}

/// An error from using an identity key.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum KeyError {
    /// The identity's key material is not (or not yet) available.
    #[error("Identity key is not loaded")]
    NotLoaded,
    /// The key refused to produce a signature.
    #[error("Signing failed")]
    SigningFailed,
}
