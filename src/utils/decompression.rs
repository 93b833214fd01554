//! Magic-byte detection and decompression of downloaded playlists

use crate::errors::{SourceError, SourceResult};

/// Compression formats recognised by their leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Uncompressed,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub struct DecompressionService;

impl DecompressionService {
    pub fn detect_compression_format(data: &[u8]) -> CompressionFormat {
        if data.starts_with(&GZIP_MAGIC) {
            CompressionFormat::Gzip
        } else {
            CompressionFormat::Uncompressed
        }
    }

    /// Decompress `data` if it is compressed; `location` is only used in errors
    pub fn decompress(data: Vec<u8>, location: &str) -> SourceResult<Vec<u8>> {
        match Self::detect_compression_format(&data) {
            CompressionFormat::Gzip => Self::decompress_gzip(&data, location),
            CompressionFormat::Uncompressed => Ok(data),
        }
    }

    #[cfg(feature = "compression-gzip")]
    fn decompress_gzip(data: &[u8], location: &str) -> SourceResult<Vec<u8>> {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| SourceError::decode(location, format!("gzip: {e}")))?;
        Ok(decompressed)
    }

    #[cfg(not(feature = "compression-gzip"))]
    fn decompress_gzip(_data: &[u8], location: &str) -> SourceResult<Vec<u8>> {
        Err(SourceError::decode(
            location,
            "gzip body received but the compression-gzip feature is disabled",
        ))
    }

    /// Decompress if needed and decode as UTF-8 (lossy, playlists in the
    /// wild are not always clean)
    pub fn decode_text(data: Vec<u8>, location: &str) -> SourceResult<String> {
        let bytes = Self::decompress(data, location)?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }
}
