//! BLTE header and chunk table

use binrw::io::{Cursor, Write};
use binrw::{BinRead, BinReaderExt, BinWrite};

use super::error::{BlteError, BlteResult};

/// BLTE magic bytes
pub const BLTE_MAGIC: [u8; 4] = *b"BLTE";

/// Size of the magic plus the header size field
pub const PREAMBLE_SIZE: usize = 8;

/// Chunk table flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TableFlags {
    /// 24 bytes per chunk: sizes and MD5 of the encoded chunk
    Standard = 0x0F,
    /// 40 bytes per chunk: adds a 16-byte decoded checksum
    Extended = 0x10,
}

impl TableFlags {
    /// Parse from byte value
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0F => Some(Self::Standard),
            0x10 => Some(Self::Extended),
            _ => None,
        }
    }

    /// Size of one chunk table entry
    pub const fn entry_size(self) -> usize {
        match self {
            Self::Standard => 24,
            Self::Extended => 40,
        }
    }
}

/// One chunk table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct ChunkInfo {
    /// Encoded size including the mode byte
    pub compressed_size: u32,
    /// Size after decoding
    pub decompressed_size: u32,
    /// MD5 of the encoded chunk (mode byte included); zero when unchecked
    pub checksum: [u8; 16],
}

/// Parsed BLTE header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlteHeader {
    /// On-disk header size; 0 means one chunk spanning the rest of the blob
    pub header_size: u32,
    /// Table flavour, present for chunked blobs
    pub flags: Option<TableFlags>,
    /// Chunk table, empty for single-chunk blobs
    pub chunks: Vec<ChunkInfo>,
}

impl BlteHeader {
    /// Parse the header at the start of `data`
    pub fn parse(data: &[u8]) -> BlteResult<Self> {
        let mut cursor = Cursor::new(data);

        let magic: [u8; 4] = cursor.read_be()?;
        if magic != BLTE_MAGIC {
            return Err(BlteError::InvalidMagic(magic));
        }

        let header_size: u32 = cursor.read_be()?;
        if header_size == 0 {
            return Ok(Self {
                header_size,
                flags: None,
                chunks: Vec::new(),
            });
        }

        let flag_byte: u8 = cursor.read_be()?;
        let flags =
            TableFlags::from_byte(flag_byte).ok_or(BlteError::InvalidTableFlags(flag_byte))?;

        let count_bytes: [u8; 3] = cursor.read_be()?;
        let chunk_count = u32::from_be_bytes([0, count_bytes[0], count_bytes[1], count_bytes[2]]);
        if chunk_count == 0 {
            return Err(BlteError::InvalidChunkCount(0));
        }

        // header_size includes the 8-byte preamble
        let expected = PREAMBLE_SIZE + 4 + chunk_count as usize * flags.entry_size();
        if header_size as usize != expected {
            return Err(BlteError::InvalidHeaderSize(header_size));
        }

        let mut chunks = Vec::with_capacity(chunk_count as usize);
        for _ in 0..chunk_count {
            let info = ChunkInfo::read(&mut cursor)?;
            if flags == TableFlags::Extended {
                let _decoded_checksum: [u8; 16] = cursor.read_be()?;
            }
            chunks.push(info);
        }

        Ok(Self {
            header_size,
            flags: Some(flags),
            chunks,
        })
    }

    /// Check if this is a single-chunk blob
    pub const fn is_single_chunk(&self) -> bool {
        self.header_size == 0
    }

    /// Offset of the first chunk
    pub fn data_offset(&self) -> usize {
        if self.is_single_chunk() {
            PREAMBLE_SIZE
        } else {
            self.header_size as usize
        }
    }

    /// Serialize the header followed by nothing else
    pub fn to_bytes(&self) -> BlteResult<Vec<u8>> {
        let mut out = Cursor::new(Vec::with_capacity(self.data_offset()));
        BLTE_MAGIC.write_be(&mut out)?;
        self.header_size.write_be(&mut out)?;

        if let Some(flags) = self.flags {
            (flags as u8).write_be(&mut out)?;
            let count = (self.chunks.len() as u32).to_be_bytes();
            out.write_all(&count[1..])?;
            for info in &self.chunks {
                info.write(&mut out)?;
                if flags == TableFlags::Extended {
                    out.write_all(&[0u8; 16])?;
                }
            }
        }

        Ok(out.into_inner())
    }
}
