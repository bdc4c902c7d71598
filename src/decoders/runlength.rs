//! RunLengthDecode implementation.
//!
//! The standard PackBits-style scheme: a length byte `l` followed by data.
//! `l` in 0..=127 copies the next `l + 1` bytes literally; `l` in 129..=255
//! repeats the next byte `257 - l` times; 128 is end-of-data. Truncated
//! input stops decoding without error.

use crate::decoders::StreamDecoder;
use crate::error::Result;

/// RunLengthDecode filter implementation.
pub struct RunLengthDecoder;

impl StreamDecoder for RunLengthDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut i = 0;
        while i < input.len() {
            let length = input[i];
            i += 1;
            match length {
                0..=127 => {
                    let n = length as usize + 1;
                    let end = (i + n).min(input.len());
                    output.extend_from_slice(&input[i..end]);
                    i = end;
                },
                128 => break,
                129..=255 => {
                    if i >= input.len() {
                        break;
                    }
                    let n = 257 - length as usize;
                    output.extend(std::iter::repeat(input[i]).take(n));
                    i += 1;
                },
            }
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "RunLengthDecode"
    }
}
