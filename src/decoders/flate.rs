//! FlateDecode (zlib/deflate) implementation.
//!
//! The most common PDF stream filter. Most streams carry a proper zlib
//! header, but broken generators sometimes emit raw deflate data, so a
//! raw-deflate pass is attempted before giving up.

use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => {
                log::warn!("zlib inflate failed ({}), retrying as raw deflate", e);
            },
        }
        output.clear();
        DeflateDecoder::new(input)
            .read_to_end(&mut output)
            .map_err(|e| Error::Stream(format!("FlateDecode: {}", e)))?;
        Ok(output)
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_flate_roundtrip() {
        let original = b"The quick brown fox jumps over the lazy dog.";
        let compressed = deflate(original);
        let decoded = FlateDecoder.decode(&compressed).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_flate_raw_deflate_fallback() {
        use flate2::write::DeflateEncoder;
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"headerless").unwrap();
        let raw = enc.finish().unwrap();
        let decoded = FlateDecoder.decode(&raw).unwrap();
        assert_eq!(decoded, b"headerless");
    }

    #[test]
    fn test_flate_invalid_data() {
        assert!(FlateDecoder.decode(b"definitely not deflate").is_err());
    }
}
