//! Configuration for contact requests.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// The port a Torsion hidden service listens on for the contact protocol.
pub(crate) const DEFAULT_CONTACT_PORT: u16 = 9878;

/// Configuration for a [`ContactRequest`](crate::ContactRequest).
///
/// The defaults are correct for talking to any stock Torsion peer; the
/// port override exists for tests and for services deliberately published
/// on a nonstandard port.
#[derive(Debug, Clone, Builder, Eq, PartialEq, Serialize, Deserialize)]
#[builder(derive(Debug))]
pub struct ContactRequestConfig {
    /// The port to connect to on the peer's hidden service.
    #[builder(default = "DEFAULT_CONTACT_PORT")]
    #[serde(default = "default_contact_port")]
    pub(crate) contact_port: u16,
}

/// Helper: the serde default for [`ContactRequestConfig::contact_port`].
fn default_contact_port() -> u16 {
    DEFAULT_CONTACT_PORT
}

impl Default for ContactRequestConfig {
    fn default() -> Self {
        ContactRequestConfig {
            contact_port: DEFAULT_CONTACT_PORT,
        }
    }
}

impl ContactRequestConfig {
    /// Return a new builder for this configuration.
    pub fn builder() -> ContactRequestConfigBuilder {
        ContactRequestConfigBuilder::default()
    }

    /// Return the configured contact port.
    pub fn contact_port(&self) -> u16 {
        self.contact_port
    }
}
