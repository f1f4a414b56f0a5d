//! `torsion-bytes`: encode and decode the framed records used on the
//! Torsion wire.
//!
//! # Overview
//!
//! Torsion's protocol messages are small length-prefixed records mixing
//! fixed-width byte strings (hostnames, cookies, secrets) with
//! variable-width ones (keys, signatures, UTF-8 text).  This crate
//! provides the [`Reader`] and [`Writer`] types every protocol message is
//! built from, along with the [`Readable`] and [`Writeable`] traits that
//! let message types describe their own encodings.
//!
//! All multi-byte integers are big-endian.  Variable-width fields are a
//! `u16` big-endian byte count followed by that many bytes; UTF-8 fields
//! are variable-width fields whose contents are validated on read.
//!
//! Parsing is in-memory and never panics: malformed input produces an
//! [`Error`].  The first error aborts assembly or parsing of a record,
//! and the caller discards the record.

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

mod err;
mod reader;
mod writer;

pub use err::{EncodeError, Error};
pub use reader::Reader;
pub use writer::Writer;

/// Result type returned by this crate for [`Reader`]-related methods.
pub type Result<T> = std::result::Result<T, Error>;
/// Result type returned by this crate for [`Writer`]-related methods.
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// A value that knows how to append its own wire encoding to a
/// [`Writer`].
///
/// Protocol types implement this so a record can be assembled field by
/// field with [`Writer::write`], keeping each field's layout next to the
/// type that owns it.
///
/// # Example
///
/// ```
/// use torsion_bytes::{EncodeResult, Writeable, Writer};
///
/// /// How a connection announces what it is for.
/// struct Greeting {
///     version: u8,
///     purpose: u8,
/// }
///
/// impl Writeable for Greeting {
///     fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) -> EncodeResult<()> {
///         w.write_u8(self.version);
///         w.write_u8(self.purpose);
///         Ok(())
///     }
/// }
///
/// let mut record: Vec<u8> = Vec::new();
/// record.write(&Greeting { version: 1, purpose: 0x80 })?;
/// assert_eq!(record, [0x01, 0x80]);
/// # torsion_bytes::EncodeResult::Ok(())
/// ```
pub trait Writeable {
    /// Append this value's encoding to `w`.
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) -> EncodeResult<()>;
}

/// A value that knows how to parse itself out of a [`Reader`].
///
/// The counterpart of [`Writeable`], consumed through
/// [`Reader::extract`], which rewinds past anything a failed parse
/// partially consumed.  Implementations should stick to structure;
/// expensive checks like signature verification belong to the caller.
pub trait Readable: Sized {
    /// Parse one value of this type from the front of `r`.
    fn take_from(r: &mut Reader<'_>) -> Result<Self>;
}

/// Fixed-width byte strings — hostnames, cookies, secrets — encode as
/// their bytes, with the width fixed by the protocol rather than sent on
/// the wire.
impl<const N: usize> Writeable for [u8; N] {
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) -> EncodeResult<()> {
        w.write_all(&self[..]);
        Ok(())
    }
}

impl<const N: usize> Readable for [u8; N] {
    fn take_from(r: &mut Reader<'_>) -> Result<Self> {
        let mut field = [0_u8; N];
        r.take_into(&mut field)?;
        Ok(field)
    }
}
