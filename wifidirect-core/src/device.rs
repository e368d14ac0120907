//! Device addressing, discovered devices, and the group passphrase.

use std::fmt;
use std::str::FromStr;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Shortest passphrase the platform accepts for a P2P group.
pub const MIN_PASSPHRASE_LEN: usize = 8;
/// Longest passphrase the platform accepts for a P2P group.
pub const MAX_PASSPHRASE_LEN: usize = 63;
/// Length of passphrases produced by [`Passphrase::generate`].
pub const GENERATED_PASSPHRASE_LEN: usize = 8;

/// Platform device address (a MAC address on Android).
///
/// Normalized on construction: trimmed, upper-cased, `-` separators turned into `:`.
/// Any non-empty address without whitespace is accepted so transports that report
/// short or synthetic identifiers still key the discovery set consistently.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(AddressError::Invalid(raw.to_string()));
        }
        let normalized = trimmed
            .chars()
            .map(|c| if c == '-' { ':' } else { c.to_ascii_uppercase() })
            .collect();
        Ok(DeviceAddress(normalized))
    }

    /// Random locally administered unicast MAC, for transports without a radio.
    pub fn random_local() -> Self {
        let mut octets: [u8; 6] = rand::random();
        octets[0] = (octets[0] & 0xfc) | 0x02;
        let text = octets
            .iter()
            .map(|o| format!("{:02X}", o))
            .collect::<Vec<_>>()
            .join(":");
        DeviceAddress(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceAddress::parse(s)
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DeviceAddress::parse(&value)
    }
}

impl From<DeviceAddress> for String {
    fn from(value: DeviceAddress) -> Self {
        value.0
    }
}

/// Error parsing a device address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("device address is empty")]
    Empty,
    #[error("invalid device address: {0:?}")]
    Invalid(String),
}

/// A nearby device reported by discovery. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub address: DeviceAddress,
    pub display_name: String,
}

impl Device {
    pub fn new(address: DeviceAddress, display_name: impl Into<String>) -> Self {
        Self {
            address,
            display_name: display_name.into(),
        }
    }
}

/// Shared secret for a P2P group: 8 to 63 printable ASCII characters.
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(String);

impl Passphrase {
    pub fn new(raw: &str) -> Result<Self, PassphraseError> {
        let len = raw.chars().count();
        if len < MIN_PASSPHRASE_LEN {
            return Err(PassphraseError::TooShort(len));
        }
        if len > MAX_PASSPHRASE_LEN {
            return Err(PassphraseError::TooLong(len));
        }
        if !raw.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
            return Err(PassphraseError::NotPrintableAscii);
        }
        Ok(Passphrase(raw.to_string()))
    }

    /// Random alphanumeric passphrase for a host to display to the joining player.
    pub fn generate() -> Self {
        let text: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_PASSPHRASE_LEN)
            .map(char::from)
            .collect();
        Passphrase(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

/// Error validating a passphrase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassphraseError {
    #[error("passphrase has {0} characters, at least 8 required")]
    TooShort(usize),
    #[error("passphrase has {0} characters, at most 63 allowed")]
    TooLong(usize),
    #[error("passphrase must be printable ASCII")]
    NotPrintableAscii,
}
