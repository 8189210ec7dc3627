//! Account address parsing, network validation and aliasing.
//!
//! Encoding and checksums are delegated to [`TonAddress`]; this module adds
//! the wallet rules on top: flag inspection, network checks and the
//! bounceable/non-bounceable aliasing used for display.

use crate::{WalletError, WalletResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use tonlib_core::TonAddress;

/// Length of a user-friendly address string.
const FRIENDLY_TEXT_LEN: usize = 48;

/// Rendering helpers for [`TonAddress`].
pub trait AddressExt {
    /// Render in user-friendly form (URL-safe base64).
    fn to_friendly(&self, bounceable: bool, test_only: bool) -> String;

    /// Render in raw form (`0:abcd...`).
    fn to_raw(&self) -> String;
}

impl AddressExt for TonAddress {
    fn to_friendly(&self, bounceable: bool, test_only: bool) -> String {
        self.to_base64_url_flags(!bounceable, test_only)
    }

    fn to_raw(&self) -> String {
        self.to_hex()
    }
}

/// Address on `workchain` with account hash `hash`.
pub fn address_from_parts(workchain: i32, hash: [u8; 32]) -> TonAddress {
    TonAddress {
        workchain,
        hash_part: hash,
    }
}

/// Parse either the raw or the user-friendly form, ignoring flags.
pub fn parse_address(text: &str) -> WalletResult<TonAddress> {
    if text.contains(':') {
        TonAddress::from_hex_str(text).map_err(|_| WalletError::InvalidAddress(text.to_string()))
    } else {
        ParsedAddress::parse(text).map(|parsed| parsed.address)
    }
}

/// A user-friendly address together with the flags it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    /// The decoded account address.
    pub address: TonAddress,
    /// Written in bounceable form.
    pub bounceable: bool,
    /// Written with the test-only flag.
    pub test_only: bool,
}

impl ParsedAddress {
    /// Parse a user-friendly address (URL-safe or standard base64).
    pub fn parse(text: &str) -> WalletResult<Self> {
        if text.len() != FRIENDLY_TEXT_LEN {
            return Err(WalletError::InvalidAddress(text.to_string()));
        }
        let (address, non_bounceable, non_production) = TonAddress::from_base64_url_flags(text)
            .or_else(|_| TonAddress::from_base64_std_flags(text))
            .map_err(|_| WalletError::InvalidAddress(text.to_string()))?;
        Ok(Self {
            address,
            bounceable: !non_bounceable,
            test_only: non_production,
        })
    }

    /// Reject addresses whose network flag disagrees with the environment.
    pub fn validate_network(&self, text: &str, development: bool) -> WalletResult<()> {
        if self.test_only != development {
            return Err(WalletError::InvalidNetworkAddress(text.to_string()));
        }
        Ok(())
    }

    /// Render with the flags this address was parsed with.
    pub fn to_friendly(&self) -> String {
        self.address.to_friendly(self.bounceable, self.test_only)
    }
}

impl FromStr for ParsedAddress {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Canonical rendering of an address with its optional alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalAddress {
    /// Bounceable rendering.
    pub primary: String,
    /// The non-bounceable text the caller supplied, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Canonicalize an address for display.
///
/// Bounceable input is returned as-is with no alias. Non-bounceable input
/// yields the bounceable rendering as primary and the input as alias.
/// Unparseable input yields `None`.
pub fn canonicalize(text: &str) -> Option<CanonicalAddress> {
    let parsed = ParsedAddress::parse(text).ok()?;
    if parsed.bounceable {
        return Some(CanonicalAddress {
            primary: text.to_string(),
            alias: None,
        });
    }
    Some(CanonicalAddress {
        primary: parsed.address.to_friendly(true, parsed.test_only),
        alias: Some(text.to_string()),
    })
}

/// True when both strings parse and denote the same account.
pub fn addresses_equal(a: &str, b: &str) -> bool {
    match (ParsedAddress::parse(a), ParsedAddress::parse(b)) {
        (Ok(a), Ok(b)) => a.address == b.address,
        _ => false,
    }
}

/// Serde adapter rendering an address in raw form.
pub(crate) mod raw {
    use super::{parse_address, AddressExt, TonAddress};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(address: &TonAddress, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&address.to_raw())
    }

    #[allow(dead_code)]
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TonAddress, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_address(&text).map_err(serde::de::Error::custom)
    }
}
