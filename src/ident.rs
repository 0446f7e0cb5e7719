//! Identifiers shared by every component
//! -------------------------------------
//! Accounts, analysed entities and stable instance addresses all use the
//! 20-byte `Address`. Roles and logic units carry opaque 128-bit ids derived
//! with xxh3, rendered as `0x`-prefixed lowercase hex everywhere (logs,
//! JSON, snapshots).

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use xxhash_rust::const_xxh3;
use xxhash_rust::xxh3::{xxh3_128, xxh3_64_with_seed};

use crate::error::{AppResult, RegistryError};

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0[xX][0-9a-fA-F]{40}$").unwrap());
static ID128_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0[xX][0-9a-fA-F]{1,32}$").unwrap());

fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

/// 20-byte identity of an account, an analysed entity or a deployed instance.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The null identity. Never accepted as a record key or role holder.
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self { Address(bytes) }

    pub fn as_bytes(&self) -> &[u8; 20] { &self.0 }

    pub fn is_zero(&self) -> bool { self.0 == [0u8; 20] }

    /// Parse `0x` + 40 hex digits. Malformed text maps to `InvalidEntity`.
    pub fn parse(text: &str) -> AppResult<Self> {
        let t = text.trim();
        if !ADDRESS_RE.is_match(t) {
            return Err(RegistryError::invalid_entity(format!("malformed address '{}'", t)));
        }
        let digits = &t.as_bytes()[2..];
        let mut out = [0u8; 20];
        for (i, pair) in digits.chunks(2).enumerate() {
            out[i] = (hex_nibble(pair[0]) << 4) | hex_nibble(pair[1]);
        }
        Ok(Address(out))
    }

    /// Deterministically derive an address from arbitrary seed bytes.
    /// Used for stable instance addresses (deployer + salt).
    pub fn derive(seed: &[u8]) -> Self {
        let head = xxh3_128(seed).to_be_bytes();
        let tail = xxh3_64_with_seed(seed, 0x1f).to_be_bytes();
        let mut out = [0u8; 20];
        out[..16].copy_from_slice(&head);
        out[16..].copy_from_slice(&tail[..4]);
        Address(out)
    }

    /// Reject the null identity.
    pub fn ensure_entity(&self) -> AppResult<()> {
        if self.is_zero() {
            return Err(RegistryError::invalid_entity("null address"));
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for b in self.0.iter() { write!(f, "{:02x}", b)?; }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(self, f) }
}

impl FromStr for Address {
    type Err = RegistryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Address::parse(s) }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(&self.to_string()) }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        Address::parse(&text).map_err(serde::de::Error::custom)
    }
}

fn parse_id128(text: &str, what: &str) -> AppResult<u128> {
    let t = text.trim();
    if !ID128_RE.is_match(t) {
        return Err(RegistryError::invalid_input(what, format!("expected 0x-prefixed hex, got '{}'", t)));
    }
    u128::from_str_radix(&t[2..], 16).map_err(|e| RegistryError::invalid_input(what, e.to_string()))
}

// RoleId and LogicId share representation and text form.
macro_rules! id128 {
    ($name:ident, $what:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(u128);

        impl $name {
            pub const fn from_raw(raw: u128) -> Self { $name(raw) }
            pub const fn raw(&self) -> u128 { self.0 }
            pub fn parse_hex(text: &str) -> AppResult<Self> { parse_id128(text, $what).map($name) }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "0x{:032x}", self.0) }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(self, f) }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(&self.to_string()) }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let text = String::deserialize(d)?;
                $name::parse_hex(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

id128!(RoleId, "role");
id128!(LogicId, "logic id");

impl RoleId {
    /// Derive a role id from its canonical name, e.g. `"ANALYZER_ROLE"`.
    pub const fn from_name(name: &str) -> Self { RoleId(const_xxh3::xxh3_128(name.as_bytes())) }
}

impl LogicId {
    /// Content id of a logic unit's canonical description.
    pub fn of_bytes(bytes: &[u8]) -> Self { LogicId(xxh3_128(bytes)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_and_display() {
        let a = Address::parse("0x00000000000000000000000000000000000000Ab").unwrap();
        assert_eq!(a.to_string(), "0x00000000000000000000000000000000000000ab");
        assert!(!a.is_zero());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("00000000000000000000000000000000000000ab").is_err());
        let err = Address::parse("0xzz000000000000000000000000000000000000ab").unwrap_err();
        assert_eq!(err.code_str(), "invalid_entity");
    }

    #[test]
    fn null_address_is_rejected_as_entity() {
        assert!(Address::ZERO.ensure_entity().is_err());
        assert!(Address::derive(b"x").ensure_entity().is_ok());
    }

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(Address::derive(b"deployer/1"), Address::derive(b"deployer/1"));
        assert_ne!(Address::derive(b"deployer/1"), Address::derive(b"deployer/2"));
    }

    #[test]
    fn role_ids_are_stable_and_render_as_hex() {
        let a = RoleId::from_name("ANALYZER_ROLE");
        assert_eq!(a, RoleId::from_name("ANALYZER_ROLE"));
        assert_ne!(a, RoleId::from_name("ANALYZER"));
        let text = a.to_string();
        assert_eq!(text.len(), 34);
        assert_eq!(RoleId::parse_hex(&text).unwrap(), a);
        assert_eq!(RoleId::from_raw(0).to_string(), format!("0x{}", "0".repeat(32)));
    }

    #[test]
    fn ids_serialize_as_strings() {
        let a = Address::derive(b"serde");
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", a));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
