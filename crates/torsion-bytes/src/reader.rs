//! Internal: the reading half of the codec.

use std::num::NonZeroUsize;

use crate::{Error, Readable, Result};

/// Step-by-step consumer of one received record.
///
/// A `Reader` walks a byte slice from front to back, handing out fields
/// in the shapes the Torsion wire uses: single bytes, big-endian `u16`s,
/// fixed-width runs (hostnames, cookies, secrets), and `u16`-prefixed
/// variable-width fields.  It keeps a position, not a copy; returned
/// slices borrow from the input.
///
/// A failed read is harmless.  It leaves the position where it was and
/// says what went wrong through [`Error`]; the caller reacts by
/// discarding the whole record.  There is deliberately no way to resume
/// a half-parsed record.
///
/// # Example
///
/// Picking apart a toy record — one tag byte, a fixed-width pair, and a
/// length-prefixed name:
///
/// ```
/// use torsion_bytes::{Reader, Result};
///
/// let record = b"\x07ok\x00\x03ada";
/// let mut r = Reader::from_slice(record);
/// assert_eq!(r.take_u8()?, 0x07);
/// let mut pair = [0_u8; 2];
/// r.take_into(&mut pair)?;
/// assert_eq!(&pair, b"ok");
/// assert_eq!(r.take_utf8()?, "ada");
/// r.should_be_exhausted()?;
/// # Result::Ok(())
/// ```
pub struct Reader<'a> {
    /// The record being parsed.
    data: &'a [u8],
    /// Index of the first byte not yet consumed.
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Start reading `data` from its first byte.
    pub fn from_slice(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    /// Return how many bytes are left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Return how many bytes have been read so far.
    ///
    /// This doubles as the current offset into the record, which is how
    /// callers mark field boundaries — the contact request signature
    /// covers "everything up to here".
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Check that every byte of the record has been read.
    ///
    /// Call this after taking the last expected field.  A record with
    /// bytes to spare was built by something speaking a different layout,
    /// and is discarded like any other parse failure
    /// ([`Error::ExtraneousBytes`]).
    pub fn should_be_exhausted(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            _ => Err(Error::ExtraneousBytes),
        }
    }

    /// Consume the next `n` bytes and return them as a slice.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.want(n)?;
        let field = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(field)
    }

    /// Consume exactly enough bytes to fill `buf`.
    ///
    /// This is how fixed-width fields read themselves into place.  When
    /// the record is too short, `buf` is untouched.
    pub fn take_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let field = self.take(buf.len())?;
        buf.copy_from_slice(field);
        Ok(())
    }

    /// Consume one byte.
    pub fn take_u8(&mut self) -> Result<u8> {
        let field = self.take(1)?;
        Ok(field[0])
    }

    /// Consume a `u16`, big-endian like every integer on the wire.
    pub fn take_u16(&mut self) -> Result<u16> {
        let field = self.take(2)?;
        Ok(u16::from_be_bytes([field[0], field[1]]))
    }

    /// Consume a variable-width field: a big-endian `u16` byte count,
    /// then that many bytes.
    ///
    /// When the declared count overruns the record, nothing is consumed —
    /// not even the count itself.
    pub fn take_var_bytes(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let len = self.take_u16()?;
        match self.take(usize::from(len)) {
            Ok(field) => Ok(field),
            Err(e) => {
                // Give back the count as well.
                self.pos = start;
                Err(e)
            }
        }
    }

    /// Consume a variable-width field that must hold UTF-8 text.
    ///
    /// Anything else is [`Error::BadUtf8`], and nothing is consumed.
    pub fn take_utf8(&mut self) -> Result<&'a str> {
        let start = self.pos;
        let field = self.take_var_bytes()?;
        match std::str::from_utf8(field) {
            Ok(text) => Ok(text),
            Err(_) => {
                self.pos = start;
                Err(Error::BadUtf8)
            }
        }
    }

    /// Consume a [`Readable`] value, delegating to its own parsing code.
    ///
    /// If that code fails partway through, the position rewinds to where
    /// it stood before the attempt.
    pub fn extract<E: Readable>(&mut self) -> Result<E> {
        let start = self.pos;
        let result = E::take_from(self);
        if result.is_err() {
            self.pos = start;
        }
        result
    }

    /// Helper: error out with the right deficit unless `n` more bytes
    /// are available.
    fn want(&self, n: usize) -> Result<()> {
        match NonZeroUsize::new(n.saturating_sub(self.remaining())) {
            None => Ok(()),
            Some(deficit) => Err(Error::Truncated { deficit }),
        }
    }
}
