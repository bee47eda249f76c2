//! Chunk compression and decompression

use super::chunk::CompressionMode;
use super::error::{BlteError, BlteResult};
use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::io::Read;

/// Maximum allowed decompression size (1 GiB)
///
/// Limits decoder output so a corrupt size field or a compression bomb
/// cannot exhaust memory.
pub const MAX_DECOMPRESSION_SIZE: usize = 1024 * 1024 * 1024;

/// Compress data using the given mode
pub fn compress_chunk(data: &[u8], mode: CompressionMode) -> BlteResult<Vec<u8>> {
    match mode {
        CompressionMode::None => Ok(data.to_vec()),
        CompressionMode::ZLib => {
            let mut encoder = ZlibEncoder::new(data, Compression::default());
            let mut compressed = Vec::new();
            encoder.read_to_end(&mut compressed).map_err(|e| {
                BlteError::CompressionError(format!("ZLib compression failed: {e}"))
            })?;
            Ok(compressed)
        }
        CompressionMode::LZ4 => {
            // 8-byte LE decoded size, then a single LZ4 block
            let max_compressed_size = lz4_flex::block::get_maximum_output_size(data.len());
            let mut result = vec![0u8; 8 + max_compressed_size];
            result[0..8].copy_from_slice(&(data.len() as u64).to_le_bytes());

            let compressed_len = lz4_flex::block::compress_into(data, &mut result[8..])
                .map_err(|e| BlteError::CompressionError(format!("LZ4 compression failed: {e}")))?;
            result.truncate(8 + compressed_len);
            Ok(result)
        }
        CompressionMode::Encrypted | CompressionMode::Frame => {
            Err(BlteError::UnsupportedCompressionMode(mode.as_byte()))
        }
    }
}

/// Decompress a chunk payload (mode byte already stripped)
pub fn decompress_chunk(data: &[u8], mode: CompressionMode) -> BlteResult<Vec<u8>> {
    match mode {
        CompressionMode::None => Ok(data.to_vec()),
        CompressionMode::ZLib => {
            let mut decoder = ZlibDecoder::new(data);
            let mut decompressed = Vec::new();

            // Read in blocks to enforce the size limit
            let mut buffer = [0u8; 8192];
            loop {
                let bytes_read = decoder.read(&mut buffer).map_err(|e| {
                    BlteError::CompressionError(format!("ZLib decompression failed: {e}"))
                })?;
                if bytes_read == 0 {
                    break;
                }
                if decompressed.len() + bytes_read > MAX_DECOMPRESSION_SIZE {
                    return Err(BlteError::CompressionError(format!(
                        "decompressed size exceeds limit of {MAX_DECOMPRESSION_SIZE} bytes"
                    )));
                }
                decompressed.extend_from_slice(&buffer[..bytes_read]);
            }

            Ok(decompressed)
        }
        CompressionMode::LZ4 => {
            let Some((size_header, compressed)) = data.split_first_chunk::<8>() else {
                return Err(BlteError::CompressionError(
                    "LZ4 data too short - missing size header".to_string(),
                ));
            };

            let decompressed_size = usize::try_from(u64::from_le_bytes(*size_header))
                .ok()
                .filter(|size| *size <= MAX_DECOMPRESSION_SIZE)
                .ok_or_else(|| {
                    BlteError::CompressionError(format!(
                        "LZ4 decompressed size exceeds limit of {MAX_DECOMPRESSION_SIZE} bytes"
                    ))
                })?;

            let decompressed = lz4_flex::block::decompress(compressed, decompressed_size)
                .map_err(|e| {
                    BlteError::CompressionError(format!("LZ4 decompression failed: {e}"))
                })?;

            if decompressed.len() != decompressed_size {
                return Err(BlteError::CompressionError(format!(
                    "LZ4 decompression size mismatch: expected {decompressed_size}, got {}",
                    decompressed.len()
                )));
            }

            Ok(decompressed)
        }
        CompressionMode::Encrypted | CompressionMode::Frame => {
            Err(BlteError::UnsupportedCompressionMode(mode.as_byte()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_zlib_round_trip() {
        let data = b"The quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = compress_chunk(&data, CompressionMode::ZLib).expect("compress");
        assert!(compressed.len() < data.len());
        let decompressed = decompress_chunk(&compressed, CompressionMode::ZLib).expect("decompress");
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_lz4_size_prefix() {
        let data = b"Hello, BLTE! This is a test of LZ4 compression.";
        let compressed = compress_chunk(data, CompressionMode::LZ4).expect("compress");
        let stored = u64::from_le_bytes(compressed[0..8].try_into().expect("8 bytes"));
        assert_eq!(stored, data.len() as u64);

        let decompressed = decompress_chunk(&compressed, CompressionMode::LZ4).expect("decompress");
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_lz4_missing_header() {
        assert!(decompress_chunk(&[1, 2, 3], CompressionMode::LZ4).is_err());
    }

    #[test]
    fn test_lz4_oversized_header_rejected() {
        let mut data = (u64::MAX).to_le_bytes().to_vec();
        data.extend_from_slice(&[0; 4]);
        assert!(matches!(
            decompress_chunk(&data, CompressionMode::LZ4),
            Err(BlteError::CompressionError(_))
        ));
    }

    #[test]
    fn test_corrupt_zlib() {
        let result = decompress_chunk(b"definitely not zlib", CompressionMode::ZLib);
        assert!(result.is_err());
    }
}
