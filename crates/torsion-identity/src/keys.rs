//! Identity key material: the signing capability and the local secret.
//!
//! The protocol layer never touches raw key types.  It signs through the
//! [`SigningKey`] trait, so tests can substitute a fixed key and so the
//! identity layer can keep key storage concerns to itself.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use ed25519_dalek::{Signature, Signer, SigningKey as EdSigningKey, Verifier, VerifyingKey};
use subtle::{Choice, ConstantTimeEq};

use crate::contact_id::ServiceHostname;
use crate::err::{KeyError, ParseError};

/// The length of a contact secret, in bytes.
pub const CONTACT_SECRET_LEN: usize = 16;

/// A 16-byte secret binding a contact request to a local contact record.
///
/// The local identity issues one of these when a contact is created; the
/// request carries it on the wire so the two ends can agree they are
/// talking about the same relationship.  Comparison is constant-time, and
/// the value is never printed.
#[derive(Clone)]
pub struct ContactSecret {
    /// The secret bytes.
    secret: [u8; CONTACT_SECRET_LEN],
}

impl ContactSecret {
    /// Wrap a 16-byte value as a contact secret.
    pub fn new(secret: [u8; CONTACT_SECRET_LEN]) -> Self {
        ContactSecret { secret }
    }

    /// Try to build a contact secret from a slice.
    ///
    /// Returns an error unless the slice is exactly
    /// [`CONTACT_SECRET_LEN`] bytes long.
    pub fn from_slice(slice: &[u8]) -> Result<Self, ParseError> {
        let secret: [u8; CONTACT_SECRET_LEN] =
            slice.try_into().map_err(|_| ParseError::BadSecretLen {
                expected: CONTACT_SECRET_LEN,
            })?;
        Ok(ContactSecret { secret })
    }

    /// Return the bytes written on the wire for this secret.
    pub fn as_bytes(&self) -> &[u8; CONTACT_SECRET_LEN] {
        &self.secret
    }
}

impl ConstantTimeEq for ContactSecret {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.secret.ct_eq(&other.secret)
    }
}

impl PartialEq for ContactSecret {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}
impl Eq for ContactSecret {}

impl Debug for ContactSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ContactSecret(..)")
    }
}

/// The capability to sign on behalf of the local hidden service identity.
///
/// Both operations may fail with [`KeyError::NotLoaded`] when the identity
/// layer has not (or not yet) loaded key material; protocol code treats
/// that as a caller-side error, not a network fault.
pub trait SigningKey: Send + Sync {
    /// Return the encoding of the identity's public key as written on the
    /// wire.
    ///
    /// The encoding must be byte-exact across both peers: the responder
    /// verifies the request signature against exactly these bytes.
    fn public_encoding(&self) -> Result<Vec<u8>, KeyError>;

    /// Sign `data`, returning a signature verifiable with the key that
    /// [`public_encoding`](Self::public_encoding) describes.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyError>;
}

/// The local hidden service keypair: an Ed25519 [`SigningKey`]
/// implementation.
pub struct ServiceKeypair {
    /// The underlying Ed25519 keypair.
    keypair: EdSigningKey,
}

impl ServiceKeypair {
    /// Generate a new random service keypair.
    pub fn generate<R>(rng: &mut R) -> Self
    where
        R: rand::CryptoRng + rand::RngCore,
    {
        ServiceKeypair {
            keypair: EdSigningKey::generate(rng),
        }
    }

    /// Reconstruct a service keypair from its 32 secret key bytes.
    pub fn from_secret_key_bytes(bytes: [u8; 32]) -> Self {
        ServiceKeypair {
            keypair: EdSigningKey::from_bytes(&bytes),
        }
    }

    /// Return the public half of this keypair.
    pub fn public(&self) -> VerifyingKey {
        self.keypair.verifying_key()
    }

    /// Verify `signature` over `data` against a public key encoding as
    /// produced by [`SigningKey::public_encoding`].
    ///
    /// Returns false for malformed encodings or signatures as well as for
    /// honest verification failures.
    pub fn verify(public_encoding: &[u8], data: &[u8], signature: &[u8]) -> bool {
        let Ok(key_bytes) = <&[u8; 32]>::try_from(public_encoding) else {
            return false;
        };
        let Ok(public) = VerifyingKey::from_bytes(key_bytes) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(signature) else {
            return false;
        };
        public.verify(data, &sig).is_ok()
    }
}

impl Debug for ServiceKeypair {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKeypair(..)")
    }
}

impl SigningKey for ServiceKeypair {
    fn public_encoding(&self) -> Result<Vec<u8>, KeyError> {
        Ok(self.keypair.verifying_key().as_bytes().to_vec())
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        Ok(self.keypair.sign(data).to_bytes().to_vec())
    }
}

/// Everything a contact request needs to know about the local identity:
/// the service hostname, the contact secret bound to the target, and a
/// handle for signing.
#[derive(Clone)]
pub struct LocalIdentity {
    /// The hostname of the local hidden service.
    hostname: ServiceHostname,
    /// The secret issued for the target contact.
    secret: ContactSecret,
    /// The signing capability for the service key.
    key: Arc<dyn SigningKey>,
}

impl LocalIdentity {
    /// Bundle up the local identity material for one contact request.
    pub fn new(hostname: ServiceHostname, secret: ContactSecret, key: Arc<dyn SigningKey>) -> Self {
        LocalIdentity {
            hostname,
            secret,
            key,
        }
    }

    /// Return the local service hostname.
    pub fn hostname(&self) -> &ServiceHostname {
        &self.hostname
    }

    /// Return the contact secret.
    pub fn secret(&self) -> &ContactSecret {
        &self.secret
    }

    /// Return the signing capability.
    pub fn signing_key(&self) -> &dyn SigningKey {
        &*self.key
    }
}

impl Debug for LocalIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("hostname", &self.hostname)
            .finish_non_exhaustive()
    }
}
