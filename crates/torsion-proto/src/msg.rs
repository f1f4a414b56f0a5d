//! Messages exchanged during a contact request.
//!
//! The exchange is small: the client introduces the connection's purpose,
//! the server hands back a cookie, the client answers with one signed
//! frame, and the server replies with single status bytes.  This module
//! owns every byte of that, so the state machine in
//! [`request`](crate::request) never touches encodings directly.
//!
//! The signed frame looks like this (all integers big-endian, `var` fields
//! prefixed by a `u16` length):
//!
//! ```text
//! [u16: length of everything after this field]
//! [16 bytes: local service hostname, base32 portion]
//! [16 bytes: server cookie]
//! [16 bytes: contact secret]
//! [var: public key encoding]
//! [var: nickname, UTF-8]
//! [var: message, UTF-8]
//! [var: signature over everything from the hostname through the message]
//! ```
//!
//! The cookie makes the signature worthless on any other connection, and
//! the signature proves the request really comes from the onion address it
//! names.

use caret::caret_int;

use torsion_bytes::{EncodeResult, Error as BytesError, Readable, Reader, Writer};
use torsion_identity::{
    ContactSecret, ServiceHostname, SigningKey, CONTACT_SECRET_LEN, HOSTNAME_LEN,
};

use crate::Result;

/// The version byte spoken by this implementation.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// The length of a server cookie, in bytes.
pub const COOKIE_LEN: usize = 16;

caret_int! {
    /// The declared purpose of a freshly opened connection.
    ///
    /// Sent as the second byte of the introduction, right after the
    /// protocol version.
    pub struct Purpose(u8) {
        /// The long-lived session connection between established contacts.
        PRIMARY = 0x00,
        /// A contact request from a peer we do not know yet.
        CONTACT_REQUEST = 0x80,
    }
}

caret_int! {
    /// A one-byte status sent by the responder during a contact request.
    ///
    /// Every byte value is representable; anything not named here is an
    /// error reported to the user as-is.
    pub struct ResponseStatus(u8) {
        /// The request was delivered; the remote user has not decided yet.
        ACKNOWLEDGED = 0x00,
        /// The remote user accepted the request.
        ACCEPTED = 0x01,
        /// The remote user rejected the request.
        REJECTED = 0x40,
        /// The responder rejected the protocol version or the request
        /// itself, before any user saw it.
        VERSION_REJECTED = 0x90,
    }
}

/// The two bytes a client writes as soon as a connection opens.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Introduction {
    /// What this connection is for.
    purpose: Purpose,
}

impl Introduction {
    /// Make an introduction declaring `purpose`.
    pub fn new(purpose: Purpose) -> Self {
        Introduction { purpose }
    }

    /// Return the introduction's wire encoding.
    pub fn encode(&self) -> [u8; 2] {
        [PROTOCOL_VERSION, self.purpose.into()]
    }
}

/// A 16-byte nonce issued by the responder.
///
/// Signing it into the request frame binds the signature to this one TCP
/// connection: a recorded frame replayed on another connection will carry
/// the wrong cookie and verify against nothing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RequestCookie([u8; COOKIE_LEN]);

impl RequestCookie {
    /// Wrap 16 received bytes as a cookie.
    pub fn new(bytes: [u8; COOKIE_LEN]) -> Self {
        RequestCookie(bytes)
    }

    /// Return the cookie bytes.
    pub fn as_bytes(&self) -> &[u8; COOKIE_LEN] {
        &self.0
    }
}

impl Readable for RequestCookie {
    fn take_from(r: &mut Reader<'_>) -> torsion_bytes::Result<Self> {
        Ok(RequestCookie(r.extract()?))
    }
}

/// The content of one contact request, ready to be signed and framed.
#[derive(Clone, Debug)]
pub struct ContactRequestBody {
    /// The base32 hostname of the requesting service.
    pub hostname: ServiceHostname,
    /// The cookie the responder issued on this connection.
    pub cookie: RequestCookie,
    /// The secret binding this request to the local contact record.
    pub secret: ContactSecret,
    /// The nickname the requester asks to be known by.
    pub nickname: String,
    /// The requester's greeting message.
    pub message: String,
}

impl ContactRequestBody {
    /// Encode this request as a complete signed frame.
    ///
    /// The signature covers everything between the leading length field
    /// and the signature's own length field, and is produced by `key` —
    /// which must be the key for the hostname this body names, or the
    /// responder will refuse the request.
    pub fn encode_signed(&self, key: &dyn SigningKey) -> Result<Vec<u8>> {
        let public_key = key.public_encoding()?;

        let mut frame: Vec<u8> = Vec::new();
        frame.write_u16(0); // length, patched below
        self.write_unsigned(&mut frame, &public_key)?;

        let signature = key.sign(&frame[2..])?;
        frame.write_var_bytes(&signature)?;

        let total: u16 = (frame.len() - 2)
            .try_into()
            .map_err(|_| torsion_bytes::EncodeError::BadLengthValue)?;
        frame[0..2].copy_from_slice(&total.to_be_bytes());
        Ok(frame)
    }

    /// Write every field that the signature covers.
    fn write_unsigned<W: Writer + ?Sized>(
        &self,
        w: &mut W,
        public_key: &[u8],
    ) -> EncodeResult<()> {
        w.write(self.hostname.as_wire_bytes())?;
        w.write(self.cookie.as_bytes())?;
        w.write(self.secret.as_bytes())?;
        w.write_var_bytes(public_key)?;
        w.write_utf8(&self.nickname)?;
        w.write_utf8(&self.message)?;
        Ok(())
    }
}

/// A contact request frame as decoded by a responder (or a test).
///
/// Parsing checks structure only.  Verifying the signature is a separate
/// step, because the responder will usually want to consult the claimed
/// hostname and key first.
#[derive(Clone, Debug)]
pub struct ParsedContactRequest {
    /// The hostname bytes the requester claims as its own.
    pub hostname: [u8; HOSTNAME_LEN],
    /// The cookie echoed back to us.
    pub cookie: RequestCookie,
    /// The requester's contact secret.
    pub secret: [u8; CONTACT_SECRET_LEN],
    /// The requester's public key encoding.
    pub public_key: Vec<u8>,
    /// The requester's nickname.
    pub nickname: String,
    /// The requester's greeting message.
    pub message: String,
    /// The requester's signature.
    pub signature: Vec<u8>,
    /// Offset one-past-the-end of the signed span within the frame.
    signed_end: usize,
}

impl ParsedContactRequest {
    /// Parse `frame` (a complete frame, length field included).
    pub fn parse(frame: &[u8]) -> std::result::Result<Self, BytesError> {
        let mut r = Reader::from_slice(frame);
        let declared: u16 = r.take_u16()?;
        if usize::from(declared) != frame.len() - 2 {
            return Err(BytesError::InvalidMessage(
                "frame length field disagrees with frame size".into(),
            ));
        }

        let mut hostname = [0_u8; HOSTNAME_LEN];
        r.take_into(&mut hostname)?;
        let cookie: RequestCookie = r.extract()?;
        let mut secret = [0_u8; CONTACT_SECRET_LEN];
        r.take_into(&mut secret)?;
        let public_key = r.take_var_bytes()?.to_vec();
        let nickname = r.take_utf8()?.to_owned();
        let message = r.take_utf8()?.to_owned();
        let signed_end = r.consumed();
        let signature = r.take_var_bytes()?.to_vec();
        r.should_be_exhausted()?;

        Ok(ParsedContactRequest {
            hostname,
            cookie,
            secret,
            public_key,
            nickname,
            message,
            signature,
            signed_end,
        })
    }

    /// Return the span of `frame` that the signature covers.
    ///
    /// `frame` must be the same bytes this was parsed from.
    pub fn signed_region<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        &frame[2..self.signed_end]
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use hex_literal::hex;
    use torsion_identity::ServiceKeypair;

    fn body() -> ContactRequestBody {
        ContactRequestBody {
            hostname: "abcdefghijklmnop".parse().unwrap(),
            cookie: RequestCookie::new(hex!("000102030405060708090a0b0c0d0e0f")),
            secret: ContactSecret::new(*b"sixteen byte str"),
            nickname: "ada".to_owned(),
            message: "it's me".to_owned(),
        }
    }

    fn keypair() -> ServiceKeypair {
        ServiceKeypair::from_secret_key_bytes(hex!(
            "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb"
        ))
    }

    #[test]
    fn introduction() {
        let intro = Introduction::new(Purpose::CONTACT_REQUEST);
        assert_eq!(intro.encode(), [0x01, 0x80]);
        assert_eq!(
            Introduction::new(Purpose::PRIMARY).encode(),
            [0x01, 0x00]
        );
    }

    #[test]
    fn status_codes() {
        assert_eq!(u8::from(ResponseStatus::ACKNOWLEDGED), 0x00);
        assert_eq!(u8::from(ResponseStatus::ACCEPTED), 0x01);
        assert_eq!(u8::from(ResponseStatus::REJECTED), 0x40);
        assert_eq!(u8::from(ResponseStatus::VERSION_REJECTED), 0x90);

        let odd: ResponseStatus = 0x77.into();
        assert!(!odd.is_recognized());
        assert_eq!(format!("{}", odd), "119");
        assert_eq!(format!("{}", ResponseStatus::REJECTED), "REJECTED");
    }

    #[test]
    fn frame_layout() {
        let kp = keypair();
        let frame = body().encode_signed(&kp).unwrap();

        // The leading u16 counts everything after itself.
        let declared = u16::from_be_bytes([frame[0], frame[1]]);
        assert_eq!(usize::from(declared), frame.len() - 2);

        // Fixed-width fields sit at their assigned offsets.
        assert_eq!(&frame[2..18], b"abcdefghijklmnop");
        assert_eq!(&frame[18..34], &hex!("000102030405060708090a0b0c0d0e0f"));
        assert_eq!(&frame[34..50], b"sixteen byte str");
        // The public key is the first variable field.
        assert_eq!(&frame[50..52], &[0, 32]);
    }

    #[test]
    fn parse_round_trip() {
        let kp = keypair();
        let source = body();
        let frame = source.encode_signed(&kp).unwrap();

        let parsed = ParsedContactRequest::parse(&frame).unwrap();
        assert_eq!(&parsed.hostname, b"abcdefghijklmnop");
        assert_eq!(parsed.cookie, source.cookie);
        assert_eq!(&parsed.secret, source.secret.as_bytes());
        assert_eq!(parsed.nickname, "ada");
        assert_eq!(parsed.message, "it's me");
        assert_eq!(parsed.public_key, kp.public_encoding().unwrap());
    }

    #[test]
    fn signature_verifies() {
        let kp = keypair();
        let frame = body().encode_signed(&kp).unwrap();
        let parsed = ParsedContactRequest::parse(&frame).unwrap();

        assert!(ServiceKeypair::verify(
            &parsed.public_key,
            parsed.signed_region(&frame),
            &parsed.signature,
        ));

        // Any bit flip in the signed region kills the signature.
        let mut tampered = frame.clone();
        tampered[40] ^= 1;
        let reparsed = ParsedContactRequest::parse(&tampered).unwrap();
        assert!(!ServiceKeypair::verify(
            &reparsed.public_key,
            reparsed.signed_region(&tampered),
            &reparsed.signature,
        ));
    }

    #[test]
    fn parse_rejects_bad_frames() {
        let kp = keypair();
        let frame = body().encode_signed(&kp).unwrap();

        // Truncation.
        assert!(ParsedContactRequest::parse(&frame[..frame.len() - 1]).is_err());
        // Wrong declared length.
        let mut wrong = frame.clone();
        wrong[1] ^= 1;
        assert!(ParsedContactRequest::parse(&wrong).is_err());
        // Trailing garbage.
        let mut long = frame.clone();
        long.push(0);
        assert!(ParsedContactRequest::parse(&long).is_err());
        // Bad UTF-8 in the nickname.
        let mut bad_utf8 = frame;
        bad_utf8[54 + 32] = 0xff; // first nickname byte, after the 32-byte key
        assert!(ParsedContactRequest::parse(&bad_utf8).is_err());
    }
}
