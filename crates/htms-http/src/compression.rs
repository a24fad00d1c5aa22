//! Streaming response compression.

use std::io::{self, Write};

use brotli::CompressorWriter;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::encoding::Encoding;

const ZLIB_LEVEL: u32 = 6;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_WINDOW: u32 = 22;
const BROTLI_BUFFER: usize = 4096;

/// Compresses a response body one chunk at a time.
///
/// Each chunk is flushed on its own, so a client can decode and render it
/// before the next one is produced.
pub enum Compressor {
    Gzip(GzEncoder<Vec<u8>>),
    /// `deflate` is the zlib format on the wire.
    Deflate(ZlibEncoder<Vec<u8>>),
    Brotli(Box<CompressorWriter<Vec<u8>>>),
}

impl Compressor {
    /// Compressor for `encoding`; `None` for `identity`.
    pub fn new(encoding: Encoding) -> Option<Self> {
        let level = Compression::new(ZLIB_LEVEL);
        match encoding {
            Encoding::Gzip => Some(Self::Gzip(GzEncoder::new(Vec::new(), level))),
            Encoding::Deflate => Some(Self::Deflate(ZlibEncoder::new(Vec::new(), level))),
            Encoding::Brotli => Some(Self::Brotli(Box::new(CompressorWriter::new(
                Vec::new(),
                BROTLI_BUFFER,
                BROTLI_QUALITY,
                BROTLI_WINDOW,
            )))),
            Encoding::Identity => None,
        }
    }

    /// Encoding this compressor produces.
    pub fn encoding(&self) -> Encoding {
        match self {
            Self::Gzip(_) => Encoding::Gzip,
            Self::Deflate(_) => Encoding::Deflate,
            Self::Brotli(_) => Encoding::Brotli,
        }
    }

    /// Compress `data` and flush, returning the bytes produced.
    pub fn compress(&mut self, data: &[u8]) -> io::Result<Vec<u8>> {
        let output = match self {
            Self::Gzip(encoder) => {
                encoder.write_all(data)?;
                encoder.flush()?;
                encoder.get_mut()
            }
            Self::Deflate(encoder) => {
                encoder.write_all(data)?;
                encoder.flush()?;
                encoder.get_mut()
            }
            Self::Brotli(encoder) => {
                encoder.write_all(data)?;
                encoder.flush()?;
                encoder.get_mut()
            }
        };
        Ok(std::mem::take(output))
    }

    /// End the compressed stream, returning its trailer.
    pub fn finish(self) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip(encoder) => encoder.finish(),
            Self::Deflate(encoder) => encoder.finish(),
            Self::Brotli(encoder) => Ok((*encoder).into_inner()),
        }
    }
}
