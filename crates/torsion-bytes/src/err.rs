//! Internal: error types for record parsing and assembly.

use std::borrow::Cow;
use std::num::NonZeroUsize;

use thiserror::Error;

/// A problem found while parsing a received record.
///
/// Parsing never panics; whatever is wrong with the input, the caller
/// gets one of these and throws the record away.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The record ended before the field being read did.
    ///
    /// How bad this is depends on where the bytes came from: in a
    /// complete frame a short field means the frame is garbage, while a
    /// partial read from a socket just hasn't finished arriving yet.
    #[error("Record too short: need at least {deficit} more bytes")]
    Truncated {
        /// A lower bound on how many further bytes the failed read would
        /// have needed.
        deficit: NonZeroUsize,
    },
    /// The record kept going after its last field.
    #[error("Record has bytes left over after its last field")]
    ExtraneousBytes,
    /// A text field held bytes that do not decode as UTF-8.
    #[error("Text field is not valid UTF-8")]
    BadUtf8,
    /// The record was structurally readable but its contents make no
    /// sense.
    #[error("Malformed record: {0}")]
    InvalidMessage(Cow<'static, str>),
}

impl Error {
    /// Construct the [`Error::Truncated`] that a read falling `deficit`
    /// bytes short produces.  For use in tests.
    ///
    /// # Panics
    ///
    /// Panics when `deficit` is zero; no failed read reports that.
    pub fn new_truncated_for_test(deficit: usize) -> Self {
        let deficit = NonZeroUsize::new(deficit).expect("a read cannot fail by zero bytes");
        Error::Truncated { deficit }
    }
}

/// A problem found while assembling a record.
///
/// Assembly has exactly one way to fail: a variable-width field was
/// handed more bytes than its `u16` length prefix can count.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum EncodeError {
    /// A field was too long for the length prefix in front of it.
    #[error("Field too long for its length prefix")]
    BadLengthValue,
}
