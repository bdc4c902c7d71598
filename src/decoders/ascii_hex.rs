//! ASCIIHexDecode implementation.
//!
//! Each pair of hexadecimal digits produces one byte. Whitespace is
//! ignored, '>' terminates the data, and an odd number of digits behaves
//! as if a trailing 0 followed the last digit.

use crate::decoders::StreamDecoder;
use crate::error::Result;

/// ASCIIHexDecode filter implementation.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut pending: Option<u8> = None;
        for &byte in input {
            if byte == b'>' {
                break;
            }
            if byte.is_ascii_whitespace() {
                continue;
            }
            let digit = match (byte as char).to_digit(16) {
                Some(d) => d as u8,
                None => {
                    log::warn!("ASCIIHexDecode: skipping non-hex byte 0x{:02x}", byte);
                    continue;
                },
            };
            match pending.take() {
                Some(high) => output.push((high << 4) | digit),
                None => pending = Some(digit),
            }
        }
        if let Some(high) = pending {
            output.push(high << 4);
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asciihex_with_whitespace() {
        let decoded = AsciiHexDecoder.decode(b"61 62 2e6364   65").unwrap();
        assert_eq!(decoded, b"ab.cde");
    }

    #[test]
    fn test_asciihex_odd_digit_padded_with_zero() {
        let decoded = AsciiHexDecoder.decode(b"7>").unwrap();
        assert_eq!(decoded, b"p");
    }

    #[test]
    fn test_asciihex_terminates_at_angle_bracket() {
        let decoded = AsciiHexDecoder.decode(b"48656C6C6F>6A756E6B").unwrap();
        assert_eq!(decoded, b"Hello");
    }

    #[test]
    fn test_asciihex_empty() {
        assert_eq!(AsciiHexDecoder.decode(b">").unwrap(), b"");
    }
}
