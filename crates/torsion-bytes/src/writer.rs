//! Internal: the writing half of the codec.

use crate::{EncodeError, EncodeResult, Writeable};

/// Append-only sink that records are assembled into.
///
/// This is a trait rather than a type so that protocol code can build
/// frames directly in whatever buffer it already has.  `Vec<u8>`
/// implements it, and is what nearly every caller uses.  Implementors
/// supply [`write_all`](Writer::write_all); the field-shaped methods are
/// all expressed in terms of it.
///
/// Appending to a buffer cannot run out of room, so most methods return
/// nothing.  The exceptions are the variable-width forms, which fail with
/// [`EncodeError::BadLengthValue`] when a field is longer than the `u16`
/// byte count in front of it can say.  A failed append adds nothing.
///
/// # Example
///
/// Laying down the tail of a request — a key, then a nickname:
///
/// ```
/// use torsion_bytes::Writer;
///
/// let mut frame: Vec<u8> = Vec::new();
/// frame.write_var_bytes(&[0xaa; 4])?;
/// frame.write_utf8("ada")?;
/// assert_eq!(frame, b"\x00\x04\xaa\xaa\xaa\xaa\x00\x03ada");
/// # torsion_bytes::EncodeResult::Ok(())
/// ```
pub trait Writer {
    /// Append `bytes` exactly as given.
    fn write_all(&mut self, bytes: &[u8]);

    /// Append one byte.
    fn write_u8(&mut self, byte: u8) {
        self.write_all(&[byte]);
    }

    /// Append a `u16`, big-endian like every integer on the wire.
    fn write_u16(&mut self, val: u16) {
        self.write_all(&val.to_be_bytes());
    }

    /// Append a variable-width field: the byte count as a big-endian
    /// `u16`, then the bytes themselves.
    fn write_var_bytes(&mut self, field: &[u8]) -> EncodeResult<()> {
        let count: u16 = field
            .len()
            .try_into()
            .map_err(|_| EncodeError::BadLengthValue)?;
        self.write_u16(count);
        self.write_all(field);
        Ok(())
    }

    /// Append text as a variable-width UTF-8 field.
    fn write_utf8(&mut self, text: &str) -> EncodeResult<()> {
        self.write_var_bytes(text.as_bytes())
    }

    /// Append a [`Writeable`] value, delegating to its own encoding code.
    fn write<E: Writeable + ?Sized>(&mut self, value: &E) -> EncodeResult<()> {
        value.write_onto(self)
    }
}

impl Writer for Vec<u8> {
    fn write_all(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
    fn write_u8(&mut self, byte: u8) {
        // Skip the one-element slice for the common single-byte case.
        self.push(byte);
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn fixed_shapes() {
        let mut buf: Vec<u8> = Vec::new();
        buf.write_u8(0x01);
        buf.write_u8(0x80);
        buf.write_u16(9878);
        buf.write_all(b"abcdefghijklmnop");
        assert_eq!(&buf[..4], &[0x01, 0x80, 0x26, 0x96]);
        assert_eq!(&buf[4..], b"abcdefghijklmnop");
    }

    #[test]
    fn var_fields() {
        let mut buf: Vec<u8> = Vec::new();
        buf.write_var_bytes(b"key").unwrap();
        buf.write_utf8("").unwrap();
        buf.write_utf8("elena").unwrap();
        assert_eq!(buf, b"\x00\x03key\x00\x00\x00\x05elena");
    }

    #[test]
    fn oversized_field_refused() {
        let mut buf: Vec<u8> = Vec::new();
        buf.write_u8(0x2a);

        let oversized = vec![0_u8; usize::from(u16::MAX) + 1];
        assert_eq!(
            buf.write_var_bytes(&oversized),
            Err(EncodeError::BadLengthValue)
        );
        // The refused field added nothing, not even its count.
        assert_eq!(buf, [0x2a]);

        // Right at the limit is fine.
        let limit = vec![0_u8; usize::from(u16::MAX)];
        buf.write_var_bytes(&limit).unwrap();
        assert_eq!(buf.len(), 1 + 2 + usize::from(u16::MAX));
    }

    #[test]
    fn writeable_delegation() {
        // A value that knows its own two-byte encoding.
        struct Tag(u8);
        impl Writeable for Tag {
            fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) -> EncodeResult<()> {
                w.write_u8(b'#');
                w.write_u8(self.0);
                Ok(())
            }
        }

        let mut buf: Vec<u8> = Vec::new();
        buf.write(&Tag(7)).unwrap();
        assert_eq!(buf, [b'#', 7]);
    }
}
