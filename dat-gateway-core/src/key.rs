use std::fmt;

use data_encoding::BASE32_NOPAD;

use crate::error::GatewayError;

/// 32-byte public key identifying a Dat archive.
///
/// Canonical textual form is 64 lowercase hex characters; equality is
/// byte-equality. `ArchiveKey` is the sole identity used by the registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveKey([u8; 32]);

impl ArchiveKey {
    pub const HEX_LEN: usize = 64;
    pub const BASE32_LEN: usize = 52;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a lowercase-or-mixed-case 64 hex character key.
    pub fn from_hex(s: &str) -> Result<Self, GatewayError> {
        if s.len() != Self::HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(GatewayError::Resolution(format!(
                "not a 64-character hex key: {s}"
            )));
        }
        let mut out = [0u8; 32];
        for i in 0..32 {
            out[i] = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| GatewayError::Resolution(format!("invalid hex key: {s}")))?;
        }
        Ok(Self(out))
    }

    /// Decode a 52-character unpadded base32 address into a key.
    ///
    /// The length sentinel (52) is fixed: it is the exact unpadded base32
    /// encoding length of 32 bytes. Labels of any other length must not be
    /// treated as keys.
    pub fn from_base32(s: &str) -> Result<Self, GatewayError> {
        if s.len() != Self::BASE32_LEN {
            return Err(GatewayError::Resolution(format!(
                "not a {}-character base32 key: {s}",
                Self::BASE32_LEN
            )));
        }
        let decoded = BASE32_NOPAD
            .decode(s.to_uppercase().as_bytes())
            .map_err(|e| GatewayError::Resolution(format!("invalid base32 key: {e}")))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| GatewayError::Resolution(format!("base32 key is not 32 bytes: {s}")))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for b in &self.0 {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }

    pub fn to_base32(&self) -> String {
        BASE32_NOPAD.encode(&self.0).to_lowercase()
    }
}

impl fmt::Display for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchiveKey({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let key = ArchiveKey::from_bytes([0x42; 32]);
        let hex = key.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(ArchiveKey::from_hex(&hex).unwrap(), key);
    }

    #[test]
    fn hex_rejects_wrong_length() {
        assert!(ArchiveKey::from_hex("abcd").is_err());
    }

    #[test]
    fn hex_rejects_non_hex_chars() {
        let bad = "g".repeat(64);
        assert!(ArchiveKey::from_hex(&bad).is_err());
    }

    #[test]
    fn base32_round_trip_is_identity() {
        let key = ArchiveKey::from_bytes([0x17; 32]);
        let b32 = key.to_base32();
        assert_eq!(b32.len(), 52);
        let back = ArchiveKey::from_base32(&b32).unwrap();
        assert_eq!(back, key);
        assert_eq!(back.to_hex(), key.to_hex());
    }

    #[test]
    fn base32_rejects_wrong_length() {
        assert!(ArchiveKey::from_base32("tooshort").is_err());
    }

    #[test]
    fn hex_is_lowercased_on_display() {
        let key = ArchiveKey::from_bytes([0xab; 32]);
        assert_eq!(key.to_string(), key.to_hex());
        assert!(key.to_hex().chars().all(|c| !c.is_ascii_uppercase()));
    }
}
