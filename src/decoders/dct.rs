//! DCTDecode pass-through.
//!
//! A DCT-encoded stream is a JPEG image. Decoding it to pixels is a
//! rendering concern; this engine hands the JPEG bytes to the consumer
//! untouched.

use crate::decoders::StreamDecoder;
use crate::error::Result;

/// DCTDecode filter implementation (pass-through).
pub struct DctDecoder;

impl StreamDecoder for DctDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn name(&self) -> &str {
        "DCTDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dct_is_pass_through() {
        let jpeg_magic = b"\xff\xd8\xff\xe0rest of jpeg";
        assert_eq!(DctDecoder.decode(jpeg_magic).unwrap(), jpeg_magic);
    }
}
