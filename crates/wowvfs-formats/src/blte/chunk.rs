//! BLTE chunks and compression modes

use super::compression::decompress_chunk;
use super::error::{BlteError, BlteResult};
use super::header::ChunkInfo;

/// BLTE compression modes, stored as the first byte of every chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMode {
    /// No compression (mode 'N')
    None = b'N',
    /// `ZLib` compression (mode 'Z')
    ZLib = b'Z',
    /// LZ4 compression (mode '4')
    LZ4 = b'4',
    /// Encrypted (mode 'E')
    Encrypted = b'E',
    /// Recursive BLTE (mode 'F'), not produced by current clients
    Frame = b'F',
}

impl CompressionMode {
    /// Parse compression mode from byte
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'N' => Some(Self::None),
            b'Z' => Some(Self::ZLib),
            b'4' => Some(Self::LZ4),
            b'E' => Some(Self::Encrypted),
            b'F' => Some(Self::Frame),
            _ => None,
        }
    }

    /// Get the byte representation
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A chunk borrowed from an encoded blob
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    /// Compression mode
    pub mode: CompressionMode,
    /// Encoded bytes including the mode byte
    pub raw: &'a [u8],
    /// Chunk table entry, absent for single-chunk blobs
    pub info: Option<ChunkInfo>,
}

impl<'a> Chunk<'a> {
    /// Wrap encoded chunk bytes (mode byte first)
    pub fn new(raw: &'a [u8], info: Option<ChunkInfo>) -> BlteResult<Self> {
        let (&mode_byte, _) = raw.split_first().ok_or(BlteError::EmptyChunk)?;
        let mode = CompressionMode::from_byte(mode_byte)
            .ok_or(BlteError::UnknownCompressionMode(mode_byte))?;
        Ok(Self { mode, raw, info })
    }

    /// Payload without the mode byte
    pub fn payload(&self) -> &'a [u8] {
        &self.raw[1..]
    }

    /// Verify the chunk MD5 when the table carries one
    pub fn verify(&self, index: usize) -> BlteResult<()> {
        let Some(info) = self.info else {
            return Ok(());
        };
        if info.checksum == [0u8; 16] {
            return Ok(());
        }

        let actual = md5::compute(self.raw).0;
        if actual != info.checksum {
            return Err(BlteError::ChecksumMismatch {
                index,
                expected: hex::encode(info.checksum),
                actual: hex::encode(actual),
            });
        }
        Ok(())
    }

    /// Decode the chunk
    pub fn decompress(&self, index: usize) -> BlteResult<Vec<u8>> {
        self.verify(index)?;

        let decoded = match self.mode {
            CompressionMode::Encrypted => {
                // key name size byte, then the 8-byte key name
                let payload = self.payload();
                let key_name = payload
                    .get(1..9)
                    .and_then(|bytes| bytes.try_into().ok())
                    .map(u64::from_le_bytes)
                    .unwrap_or_default();
                return Err(BlteError::EncryptedChunk { index, key_name });
            }
            mode => decompress_chunk(self.payload(), mode)?,
        };

        if let Some(info) = self.info
            && decoded.len() != info.decompressed_size as usize
        {
            return Err(BlteError::SizeMismatch {
                index,
                expected: info.decompressed_size as usize,
                actual: decoded.len(),
            });
        }

        Ok(decoded)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_mode_conversion() {
        let modes = [
            (b'N', CompressionMode::None),
            (b'Z', CompressionMode::ZLib),
            (b'4', CompressionMode::LZ4),
            (b'E', CompressionMode::Encrypted),
            (b'F', CompressionMode::Frame),
        ];

        for (byte, mode) in modes {
            assert_eq!(CompressionMode::from_byte(byte), Some(mode));
            assert_eq!(mode.as_byte(), byte);
        }
        assert_eq!(CompressionMode::from_byte(b'X'), None);
    }

    #[test]
    fn test_empty_chunk_rejected() {
        assert!(matches!(Chunk::new(&[], None), Err(BlteError::EmptyChunk)));
    }

    #[test]
    fn test_encrypted_chunk_reports_key() {
        let mut raw = vec![b'E', 8];
        raw.extend_from_slice(&0x1122_3344_5566_7788_u64.to_le_bytes());
        raw.extend_from_slice(&[0; 8]);
        let chunk = Chunk::new(&raw, None).expect("chunk");
        match chunk.decompress(3) {
            Err(BlteError::EncryptedChunk { index, key_name }) => {
                assert_eq!(index, 3);
                assert_eq!(key_name, 0x1122_3344_5566_7788);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_checksum_mismatch() {
        let raw = b"Nabc";
        let info = ChunkInfo {
            compressed_size: 4,
            decompressed_size: 3,
            checksum: [0xAA; 16],
        };
        let chunk = Chunk::new(raw, Some(info)).expect("chunk");
        assert!(matches!(
            chunk.decompress(0),
            Err(BlteError::ChecksumMismatch { index: 0, .. })
        ));
    }
}
