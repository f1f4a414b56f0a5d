//! Contact identifiers: parsing, validation, and hostname conversions.
//!
//! A contact identifier is the textual form `torsion:<base32>`, where
//! `<base32>` is exactly [`HOSTNAME_LEN`](crate::HOSTNAME_LEN) characters
//! from the lowercase alphabet `a-z2-7`: the hostname of the peer's hidden
//! service with `.onion` stripped.

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use crate::err::ParseError;
use crate::{HOSTNAME_LEN, ID_PREFIX};

/// The `.onion` suffix on a hidden service hostname.
const ONION_SUFFIX: &str = ".onion";

/// Return true if `c` may appear in the base32 portion of an identifier.
fn is_base32_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '2'..='7')
}

/// Return true if `s` is a well-formed base32 service name: exactly
/// [`HOSTNAME_LEN`] characters of `a-z2-7`.
fn is_service_name(s: &str) -> bool {
    s.len() == HOSTNAME_LEN && s.chars().all(is_base32_char)
}

/// A validated contact identifier.
///
/// A `ContactId` can only be constructed through parsing, so holding one
/// is proof that the text is canonical: trimmed, lowercase, and of the
/// form `torsion:<base32>`.
///
/// # Example
///
/// ```
/// use torsion_identity::ContactId;
///
/// let id: ContactId = "torsion:abcdefghijklmnop".parse().unwrap();
/// assert_eq!(id.base32(), "abcdefghijklmnop");
/// assert_eq!(id.hostname(), "abcdefghijklmnop.onion");
///
/// let same = ContactId::from_hostname("ABCDEFGHIJKLMNOP.ONION").unwrap();
/// assert_eq!(id, same);
/// ```
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ContactId {
    /// The canonical textual form, `torsion:` included.
    text: String,
}

impl ContactId {
    /// Return the canonical textual form of this identifier.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Return the base32 service name portion of this identifier.
    pub fn base32(&self) -> &str {
        &self.text[ID_PREFIX.len()..]
    }

    /// Return the hidden service hostname for this identifier:
    /// `<base32>.onion`.
    pub fn hostname(&self) -> String {
        format!("{}{}", self.base32(), ONION_SUFFIX)
    }

    /// Try to build a `ContactId` from a hostname.
    ///
    /// Accepts either the bare 16-character base32 service name or the
    /// 22-character `<base32>.onion` form, in any case.  Returns `None` for
    /// anything else.
    pub fn from_hostname(hostname: &str) -> Option<Self> {
        let h = hostname.trim().to_lowercase();
        let name = h.strip_suffix(ONION_SUFFIX).unwrap_or(&h);
        if !is_service_name(name) {
            return None;
        }
        Some(ContactId {
            text: format!("{}{}", ID_PREFIX, name),
        })
    }
}

impl FromStr for ContactId {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, ParseError> {
        let text = s.trim().to_lowercase();
        let name = text.strip_prefix(ID_PREFIX).ok_or(ParseError::BadContactId)?;
        if !is_service_name(name) {
            return Err(ParseError::BadContactId);
        }
        Ok(ContactId { text })
    }
}

impl Display for ContactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Debug for ContactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ContactId({})", self.text)
    }
}

impl serde::Serialize for ContactId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> serde::Deserialize<'de> for ContactId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        /// Helper for deserialization
        struct ContactIdVisitor;
        impl serde::de::Visitor<'_> for ContactIdVisitor {
            type Value = ContactId;
            fn expecting(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
                fmt.write_str("a torsion: contact identifier")
            }
            fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                s.parse().map_err(E::custom)
            }
        }
        deserializer.deserialize_str(ContactIdVisitor)
    }
}

/// The base32 hostname of the *local* hidden service.
///
/// This is the same 16 characters that appear in a [`ContactId`], but kept
/// as its own type because the contact request protocol writes it on the
/// wire as a literal 16-byte string.  Hostnames of any other length are a
/// configuration error and refuse to parse.
#[derive(Clone, Copy, Hash, Eq, PartialEq)]
pub struct ServiceHostname {
    /// The 16 base32 bytes, lowercase ASCII.
    name: [u8; HOSTNAME_LEN],
}

impl ServiceHostname {
    /// Return the literal bytes written on the wire for this hostname.
    pub fn as_wire_bytes(&self) -> &[u8; HOSTNAME_LEN] {
        &self.name
    }

    /// Return this hostname as a string, without its `.onion` suffix.
    pub fn as_str(&self) -> &str {
        // The parser only accepts ASCII, so this cannot fail.
        std::str::from_utf8(&self.name[..]).unwrap_or("????????????????")
    }
}

impl FromStr for ServiceHostname {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, ParseError> {
        let h = s.trim().to_lowercase();
        let name = h.strip_suffix(ONION_SUFFIX).unwrap_or(&h);
        if !is_service_name(name) {
            return Err(ParseError::BadHostname);
        }
        let mut bytes = [0_u8; HOSTNAME_LEN];
        bytes.copy_from_slice(name.as_bytes());
        Ok(ServiceHostname { name: bytes })
    }
}

impl Display for ServiceHostname {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.as_str(), ONION_SUFFIX)
    }
}

impl Debug for ServiceHostname {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceHostname({})", self)
    }
}

impl From<&ContactId> for ServiceHostname {
    fn from(id: &ContactId) -> ServiceHostname {
        let mut bytes = [0_u8; HOSTNAME_LEN];
        bytes.copy_from_slice(id.base32().as_bytes());
        ServiceHostname { name: bytes }
    }
}

/// The result of classifying one partial input string.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum IdValidity {
    /// The input is a complete, well-formed identifier.
    Accepted,
    /// The input could become a well-formed identifier with more typing,
    /// or it names a contact that already exists.
    Intermediate,
    /// No continuation of the input can be a well-formed identifier.
    Rejected,
}

/// What a [`ContactIdValidator`] concluded about one input string.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Validation<C> {
    /// How the normalised input was classified.
    pub validity: IdValidity,
    /// The contact this input already names, if any.
    ///
    /// Only set when a complete identifier matched a known contact; in that
    /// case `validity` is downgraded to [`IdValidity::Intermediate`] so that
    /// the UI does not treat the input as a new contact.
    pub existing: Option<C>,
}

/// A directory of known contacts, as supplied by the identity layer.
pub trait ContactLookup {
    /// A reference to a known contact.
    type Contact;

    /// Return the known contact with identifier `id`, if there is one.
    fn by_id(&self, id: &ContactId) -> Option<Self::Contact>;
}

/// The trivial directory that knows no contacts; used by validators that
/// only check syntax.
impl ContactLookup for () {
    type Contact = std::convert::Infallible;
    fn by_id(&self, _id: &ContactId) -> Option<Self::Contact> {
        None
    }
}

/// Incremental validator for contact identifier input fields.
///
/// Classifies partially-typed identifiers so a UI can give continuous
/// feedback, and (when constructed with a [`ContactLookup`]) flags
/// identifiers that already name an existing contact.
pub struct ContactIdValidator<L> {
    /// Where to look up already-known contacts, if anywhere.
    lookup: Option<L>,
}

impl ContactIdValidator<()> {
    /// Make a validator that only checks syntax.
    pub fn new() -> Self {
        ContactIdValidator { lookup: None }
    }
}

impl Default for ContactIdValidator<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ContactLookup> ContactIdValidator<L> {
    /// Make a validator that also reports identifiers already present in
    /// `lookup`.
    pub fn with_lookup(lookup: L) -> Self {
        ContactIdValidator {
            lookup: Some(lookup),
        }
    }
}

impl<L> ContactIdValidator<L> {
    /// Normalise an input string the way [`validate`](Self::validate) will:
    /// trimmed and lowercased.
    pub fn fixup(&self, text: &str) -> String {
        text.trim().to_lowercase()
    }

    /// Return true if `text` could grow into a well-formed identifier.
    fn is_prefix(text: &str) -> bool {
        if text.len() <= ID_PREFIX.len() {
            return ID_PREFIX.starts_with(text);
        }
        match text.strip_prefix(ID_PREFIX) {
            Some(name) => name.len() <= HOSTNAME_LEN && name.chars().all(is_base32_char),
            None => false,
        }
    }
}

impl<L: ContactLookup> ContactIdValidator<L> {
    /// Classify `text` after normalisation.
    ///
    /// The empty string and every proper prefix of a valid identifier are
    /// [`IdValidity::Intermediate`]; a complete identifier is
    /// [`IdValidity::Accepted`] unless it names a known contact, in which
    /// case the result is downgraded to `Intermediate` and the existing
    /// contact is returned in [`Validation::existing`].
    pub fn validate(&self, text: &str) -> Validation<L::Contact> {
        let text = self.fixup(text);

        match text.parse::<ContactId>() {
            Ok(id) => {
                if let Some(existing) = self.lookup.as_ref().and_then(|l| l.by_id(&id)) {
                    return Validation {
                        validity: IdValidity::Intermediate,
                        existing: Some(existing),
                    };
                }
                Validation {
                    validity: IdValidity::Accepted,
                    existing: None,
                }
            }
            Err(_) => {
                let validity = if Self::is_prefix(&text) {
                    IdValidity::Intermediate
                } else {
                    IdValidity::Rejected
                };
                Validation {
                    validity,
                    existing: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    /// A lookup backed by a map, for tests.
    struct Directory(HashMap<ContactId, u32>);
    impl ContactLookup for Directory {
        type Contact = u32;
        fn by_id(&self, id: &ContactId) -> Option<u32> {
            self.0.get(id).copied()
        }
    }

    fn valid() -> &'static str {
        "torsion:abcdefghijklmnop"
    }

    #[test]
    fn parse_ok() {
        let id: ContactId = valid().parse().unwrap();
        assert_eq!(id.as_str(), valid());
        assert_eq!(id.base32(), "abcdefghijklmnop");
        assert_eq!(id.to_string(), valid());

        // Uppercase and surrounding whitespace are fixed up.
        let id2: ContactId = "  TORSION:ABCDEFGHIJKLMNOP ".parse().unwrap();
        assert_eq!(id, id2);
    }

    #[test]
    fn parse_bad() {
        // '1' is not in the base32 alphabet.
        assert!("torsion:1bcdefghijklmnop".parse::<ContactId>().is_err());
        // Wrong lengths.
        assert!("torsion:abcdefghijklmno".parse::<ContactId>().is_err());
        assert!("torsion:abcdefghijklmnopq".parse::<ContactId>().is_err());
        // Wrong scheme.
        assert!("ricochet:abcdefghijklmnop".parse::<ContactId>().is_err());
        assert!("abcdefghijklmnop".parse::<ContactId>().is_err());
    }

    #[test]
    fn hostname_round_trip() {
        let id: ContactId = valid().parse().unwrap();
        let hostname = id.hostname();
        assert_eq!(hostname, "abcdefghijklmnop.onion");
        assert_eq!(hostname.len(), 22);
        let back = ContactId::from_hostname(&hostname).unwrap();
        assert_eq!(back, id);

        // The bare 16-character form works too.
        assert_eq!(ContactId::from_hostname("abcdefghijklmnop").unwrap(), id);
        assert_eq!(
            ContactId::from_hostname("ABCDEFGHIJKLMNOP.ONION").unwrap(),
            id
        );

        assert!(ContactId::from_hostname("abcdefghijklmnop.org").is_none());
        assert!(ContactId::from_hostname("1bcdefghijklmnop.onion").is_none());
        assert!(ContactId::from_hostname("").is_none());
    }

    #[test]
    fn service_hostname() {
        let h: ServiceHostname = "abcdefghijklmnop.onion".parse().unwrap();
        assert_eq!(h.as_str(), "abcdefghijklmnop");
        assert_eq!(h.as_wire_bytes(), b"abcdefghijklmnop");
        assert_eq!(h.to_string(), "abcdefghijklmnop.onion");

        let bare: ServiceHostname = "abcdefghijklmnop".parse().unwrap();
        assert_eq!(h, bare);

        // Anything but exactly 16 base32 characters is a configuration
        // error.
        assert!("abcdefghijklmno.onion".parse::<ServiceHostname>().is_err());
        assert!("".parse::<ServiceHostname>().is_err());
        assert!("abcdefghijklmnopq".parse::<ServiceHostname>().is_err());
    }

    #[test]
    fn validator_syntax() {
        let v = ContactIdValidator::with_lookup(Directory(HashMap::new()));

        assert_eq!(v.validate("").validity, IdValidity::Intermediate);
        assert_eq!(v.validate("tors").validity, IdValidity::Intermediate);
        assert_eq!(v.validate("torsion:").validity, IdValidity::Intermediate);
        assert_eq!(
            v.validate("torsion:abcdefg").validity,
            IdValidity::Intermediate
        );
        assert_eq!(v.validate(valid()).validity, IdValidity::Accepted);
        // Fixup makes uppercase acceptable.
        assert_eq!(
            v.validate("TORSION:ABCDEFGHIJKLMNOP").validity,
            IdValidity::Accepted
        );

        assert_eq!(v.validate("torsion:1").validity, IdValidity::Rejected);
        assert_eq!(v.validate("xorsion:").validity, IdValidity::Rejected);
        assert_eq!(
            v.validate("torsion:abcdefghijklmnopq").validity,
            IdValidity::Rejected
        );
    }

    #[test]
    fn validator_existing_contact() {
        let id: ContactId = valid().parse().unwrap();
        let mut contacts = HashMap::new();
        contacts.insert(id, 44_u32);
        let v = ContactIdValidator::with_lookup(Directory(contacts));

        let result = v.validate(valid());
        assert_eq!(result.validity, IdValidity::Intermediate);
        assert_eq!(result.existing, Some(44));

        let result = v.validate("torsion:ponmlkjihgfedcba");
        assert_eq!(result.validity, IdValidity::Accepted);
        assert_eq!(result.existing, None);
    }

    #[test]
    fn serde_round_trip() {
        let id: ContactId = valid().parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", valid()));
        let back: ContactId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<ContactId>("\"torsion:nope\"").is_err());
    }
}
