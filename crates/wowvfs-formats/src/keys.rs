//! MD5 keys identifying content and encoded blobs

use binrw::{BinRead, BinWrite};
use std::fmt;

/// Content key: MD5 of the decoded file payload.
///
/// Root manifests map files to content keys; the encoding table maps
/// content keys to the encoding keys that address stored blobs.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey([u8; 16]);

impl ContentKey {
    /// Create a content key from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Compute the content key of a payload
    pub fn from_data(data: &[u8]) -> Self {
        Self(md5::compute(data).0)
    }

    /// Parse a content key from a 32 character hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Raw bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Encoding key: MD5 of the BLTE-encoded blob as stored in archives.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodingKey([u8; 16]);

impl EncodingKey {
    /// Create an encoding key from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Compute the encoding key of an encoded blob
    pub fn from_data(data: &[u8]) -> Self {
        Self(md5::compute(data).0)
    }

    /// Parse an encoding key from a 32 character hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Raw bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 9 bytes, the form stored in local `.idx` journals
    pub fn truncated(&self) -> [u8; 9] {
        let mut result = [0u8; 9];
        result.copy_from_slice(&self.0[..9]);
        result
    }
}

impl fmt::Display for EncodingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_key_from_data() {
        // MD5("") is a well known constant
        let key = ContentKey::from_data(b"");
        assert_eq!(key.to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_hex_round_trip() {
        let hex = "0123456789abcdef0123456789abcdef";
        let key = EncodingKey::from_hex(hex).expect("valid hex");
        assert_eq!(key.to_hex(), hex);
        assert_eq!(format!("{key}"), hex);
        assert_eq!(
            key.truncated(),
            [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01]
        );
    }

    #[test]
    fn test_invalid_hex() {
        assert!(ContentKey::from_hex("not hex").is_err());
        assert!(ContentKey::from_hex("0123").is_err());
    }
}
