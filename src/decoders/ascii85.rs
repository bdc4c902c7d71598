//! ASCII85Decode (Base85, Adobe variant) implementation.
//!
//! Every four bytes are encoded as five characters in the range '!'..='u'.
//! 'z' is shorthand for four zero bytes. Both the bare form and the
//! Adobe-delimited form (`<~ ... ~>`) are accepted; a final partial group
//! is completed by padding with 'u' and emitting one byte fewer than the
//! number of characters present.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCII85Decode filter implementation.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut data = input;
        while let [first, rest @ ..] = data {
            if first.is_ascii_whitespace() {
                data = rest;
            } else {
                break;
            }
        }
        if data.starts_with(b"<~") {
            data = &data[2..];
        }

        let mut output = Vec::new();
        let mut acc: u64 = 0;
        let mut count = 0usize;
        for &byte in data {
            match byte {
                b'~' => break, // start of the '~>' end marker
                b'z' => {
                    if count != 0 {
                        return Err(Error::Stream(
                            "ASCII85Decode: 'z' inside a group".to_string(),
                        ));
                    }
                    output.extend_from_slice(&[0, 0, 0, 0]);
                },
                b'!'..=b'u' => {
                    acc = acc * 85 + (byte - b'!') as u64;
                    count += 1;
                    if count == 5 {
                        output.extend_from_slice(&(acc as u32).to_be_bytes());
                        acc = 0;
                        count = 0;
                    }
                },
                // Whitespace and any other byte are skipped; PDF producers
                // wrap and occasionally pollute these streams.
                _ => {},
            }
        }
        flush_partial(&mut output, acc, count);
        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}

/// Complete a trailing partial group by padding with 'u' (84).
fn flush_partial(output: &mut Vec<u8>, mut acc: u64, count: usize) {
    if count < 2 {
        if count == 1 {
            log::warn!("ASCII85Decode: dangling single character in final group");
        }
        return;
    }
    for _ in count..5 {
        acc = acc * 85 + 84;
    }
    let bytes = (acc as u32).to_be_bytes();
    output.extend_from_slice(&bytes[..count - 1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii85_wikipedia_sample() {
        let decoded = Ascii85Decoder.decode(b"9jqo^BlbD-BleB1DJ+*+F(f,q").unwrap();
        assert_eq!(decoded, b"Man is distinguished");
    }

    #[test]
    fn test_ascii85_adobe_delimited_form() {
        let decoded = Ascii85Decoder.decode(b"<~9jqo^BlbD-BleB1DJ+*+F(f,q~>").unwrap();
        assert_eq!(decoded, b"Man is distinguished");
    }

    #[test]
    fn test_ascii85_z_shorthand() {
        let decoded = Ascii85Decoder.decode(b"z").unwrap();
        assert_eq!(decoded, b"\x00\x00\x00\x00");
        let decoded = Ascii85Decoder.decode(b"zz").unwrap();
        assert_eq!(decoded.len(), 8);
    }

    #[test]
    fn test_ascii85_z_inside_group_is_an_error() {
        assert!(Ascii85Decoder.decode(b"!z").is_err());
    }

    #[test]
    fn test_ascii85_whitespace_ignored() {
        let decoded = Ascii85Decoder.decode(b"9jqo^ Blb D-BleB1DJ+*+F(f,q").unwrap();
        assert_eq!(decoded, b"Man is distinguished");
    }

    #[test]
    fn test_ascii85_partial_group_padded() {
        // "Test" + one extra byte: "s8W-!" is a 5-group; "<+U,m" -> Test.
        let decoded = Ascii85Decoder.decode(b"<+U,m").unwrap();
        assert_eq!(decoded, b"Test");
        // Two characters decode to a single byte.
        let decoded = Ascii85Decoder.decode(b"/c").unwrap();
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn test_ascii85_empty() {
        assert_eq!(Ascii85Decoder.decode(b"").unwrap(), b"");
    }
}
