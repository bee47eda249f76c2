//! BLTE (Block Table Encoded) container
//!
//! Every blob stored in a local archive is BLTE encoded: a small header,
//! an optional chunk table and one or more chunks, each starting with a
//! compression mode byte.
//!
//! Encrypted chunks are recognised and reported with their key name; no key
//! store is consulted.

mod chunk;
mod compression;
mod error;
mod header;

pub use chunk::{Chunk, CompressionMode};
pub use compression::{MAX_DECOMPRESSION_SIZE, compress_chunk, decompress_chunk};
pub use error::{BlteError, BlteResult};
pub use header::{BLTE_MAGIC, BlteHeader, ChunkInfo, TableFlags};

/// A parsed BLTE blob borrowing its chunks from the input
#[derive(Debug, Clone)]
pub struct BlteFile<'a> {
    /// BLTE header
    pub header: BlteHeader,
    /// Chunks in storage order
    pub chunks: Vec<Chunk<'a>>,
}

impl<'a> BlteFile<'a> {
    /// Parse a BLTE blob without decoding it
    pub fn parse(data: &'a [u8]) -> BlteResult<Self> {
        let header = BlteHeader::parse(data)?;
        let mut offset = header.data_offset();

        let chunks = if header.is_single_chunk() {
            let rest = data.get(offset..).unwrap_or_default();
            if rest.is_empty() {
                Vec::new()
            } else {
                vec![Chunk::new(rest, None)?]
            }
        } else {
            let mut chunks = Vec::with_capacity(header.chunks.len());
            for (index, info) in header.chunks.iter().enumerate() {
                let size = info.compressed_size as usize;
                let raw = data
                    .get(offset..offset + size)
                    .ok_or(BlteError::TruncatedChunk {
                        index,
                        needed: size,
                        available: data.len().saturating_sub(offset),
                    })?;
                chunks.push(Chunk::new(raw, Some(*info))?);
                offset += size;
            }
            chunks
        };

        Ok(Self { header, chunks })
    }

    /// Decode all chunks into one buffer
    pub fn decompress(&self) -> BlteResult<Vec<u8>> {
        let total: usize = self
            .header
            .chunks
            .iter()
            .map(|info| info.decompressed_size as usize)
            .sum();
        let mut result = Vec::with_capacity(total.min(MAX_DECOMPRESSION_SIZE));

        for (index, chunk) in self.chunks.iter().enumerate() {
            let decoded = chunk.decompress(index)?;
            if result.len() + decoded.len() > MAX_DECOMPRESSION_SIZE {
                return Err(BlteError::CompressionError(format!(
                    "decoded blob exceeds limit of {MAX_DECOMPRESSION_SIZE} bytes"
                )));
            }
            result.extend_from_slice(&decoded);
        }
        Ok(result)
    }
}

impl BlteFile<'_> {
    /// Parse and decode a BLTE blob in one step
    pub fn decode(data: &[u8]) -> BlteResult<Vec<u8>> {
        BlteFile::parse(data)?.decompress()
    }

    /// Encode `data` as a single-chunk blob
    pub fn encode(data: &[u8], mode: CompressionMode) -> BlteResult<Vec<u8>> {
        let header = BlteHeader {
            header_size: 0,
            flags: None,
            chunks: Vec::new(),
        };
        let mut out = header.to_bytes()?;
        out.push(mode.as_byte());
        out.extend_from_slice(&compress_chunk(data, mode)?);
        Ok(out)
    }

    /// Encode `data` with a chunk table, splitting every `chunk_size` bytes
    pub fn encode_chunked(
        data: &[u8],
        chunk_size: usize,
        mode: CompressionMode,
    ) -> BlteResult<Vec<u8>> {
        if chunk_size == 0 || data.is_empty() {
            return Err(BlteError::InvalidChunkCount(0));
        }

        let mut infos = Vec::new();
        let mut bodies = Vec::new();
        for piece in data.chunks(chunk_size) {
            let mut body = vec![mode.as_byte()];
            body.extend_from_slice(&compress_chunk(piece, mode)?);
            infos.push(ChunkInfo {
                compressed_size: body.len() as u32,
                decompressed_size: piece.len() as u32,
                checksum: md5::compute(&body).0,
            });
            bodies.push(body);
        }

        let flags = TableFlags::Standard;
        let header = BlteHeader {
            header_size: (header::PREAMBLE_SIZE + 4 + infos.len() * flags.entry_size()) as u32,
            flags: Some(flags),
            chunks: infos,
        };

        let mut out = header.to_bytes()?;
        for body in bodies {
            out.extend_from_slice(&body);
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk_modes() {
        let data = b"Single chunk payload with some repetition repetition repetition";
        for mode in [CompressionMode::None, CompressionMode::ZLib, CompressionMode::LZ4] {
            let encoded = BlteFile::encode(data, mode).expect("encode");
            let blte = BlteFile::parse(&encoded).expect("parse");
            assert_eq!(blte.chunks.len(), 1);
            assert_eq!(blte.chunks[0].mode, mode);
            assert_eq!(blte.decompress().expect("decode"), data);
        }
    }

    #[test]
    fn test_multi_chunk_decode() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let encoded =
            BlteFile::encode_chunked(&data, 4096, CompressionMode::ZLib).expect("encode");
        let blte = BlteFile::parse(&encoded).expect("parse");
        assert_eq!(blte.chunks.len(), 3);
        assert_eq!(blte.header.flags, Some(TableFlags::Standard));
        assert_eq!(blte.decompress().expect("decode"), data);
    }

    #[test]
    fn test_truncated_chunk_table() {
        let data = vec![7u8; 100];
        let mut encoded =
            BlteFile::encode_chunked(&data, 40, CompressionMode::None).expect("encode");
        encoded.truncate(encoded.len() - 5);
        assert!(matches!(
            BlteFile::parse(&encoded),
            Err(BlteError::TruncatedChunk { index: 2, .. })
        ));
    }

    #[test]
    fn test_corrupted_chunk_detected() {
        let data = vec![1u8; 64];
        let mut encoded =
            BlteFile::encode_chunked(&data, 32, CompressionMode::None).expect("encode");
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        assert!(matches!(
            BlteFile::decode(&encoded),
            Err(BlteError::ChecksumMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn test_empty_single_chunk() {
        let blte = BlteFile::parse(b"BLTE\0\0\0\0").expect("parse");
        assert!(blte.chunks.is_empty());
        assert!(blte.decompress().expect("decode").is_empty());
    }
}
