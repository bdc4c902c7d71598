//! LZWDecode implementation.
//!
//! PDF's LZW variant (PDF Reference, Section 7.4.4):
//! - MSB-first bit ordering, codes start at 9 bits
//! - code size grows to 10/11/12 bits when the table reaches 511/1023/2047
//!   entries (EarlyChange=1, one code earlier than GIF)
//! - code 256 resets the table, code 257 is end-of-data
//!
//! The well-tested `weezl` decoder (in TIFF mode, which shares PDF's
//! early-change behavior) is tried first. Real-world streams with trailing
//! garbage or mid-stream corruption fall back to the custom decoder, which
//! stops gracefully at the first invalid code and returns everything decoded
//! so far.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

const CLEAR_CODE: u16 = 256;
const EOD_CODE: u16 = 257;
const MAX_TABLE: usize = 4096;

/// LZWDecode filter implementation.
pub struct LzwDecoder;

impl StreamDecoder for LzwDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        match decode_weezl(input) {
            Ok(data) => Ok(data),
            Err(_) => Ok(decode_custom(input)),
        }
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}

/// Fast path via the weezl crate.
///
/// TIFF mode switches the code size one code early, matching PDF's
/// EarlyChange=1 default.
fn decode_weezl(input: &[u8]) -> Result<Vec<u8>> {
    use weezl::{decode::Decoder as WeezlDecoder, BitOrder};

    let mut decoder = WeezlDecoder::with_tiff_size_switch(BitOrder::Msb, 8);
    decoder.decode(input).map_err(|e| {
        log::debug!("weezl LZW decode failed: {:?}, using fallback", e);
        Error::Stream(format!("LZWDecode: {:?}", e))
    })
}

/// Custom decoder implementing the lenient termination semantics.
///
/// A code that is not covered by the current table, or any code arriving
/// before the initial clear code, terminates decoding; the output produced
/// up to that point is returned. Truly invalid input therefore decodes to
/// empty output, and trailing garbage after EOD never extends it.
fn decode_custom(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::new();
    let mut reader = BitReader::new(input);
    let mut nbits = 9u8;
    let mut table: Option<Vec<Vec<u8>>> = None;
    let mut prev: Option<Vec<u8>> = None;

    while let Some(code) = reader.read_bits(nbits) {
        let code = code as u16;
        if code == CLEAR_CODE {
            table = Some(init_table());
            prev = None;
            nbits = 9;
            continue;
        }
        if code == EOD_CODE {
            break;
        }
        let t = match table.as_mut() {
            Some(t) => t,
            // Data before the first clear code is not LZW at all.
            None => break,
        };
        let entry = match &prev {
            None => {
                if (code as usize) < t.len() {
                    t[code as usize].clone()
                } else {
                    break;
                }
            },
            Some(p) => {
                if (code as usize) < t.len() {
                    let entry = t[code as usize].clone();
                    if t.len() < MAX_TABLE {
                        let mut new = p.clone();
                        new.push(entry[0]);
                        t.push(new);
                    }
                    entry
                } else if code as usize == t.len() {
                    let mut entry = p.clone();
                    entry.push(p[0]);
                    if t.len() < MAX_TABLE {
                        t.push(entry.clone());
                    }
                    entry
                } else {
                    // Index beyond the table is invalid data.
                    break;
                }
            },
        };
        // EarlyChange=1: grow the code size one entry before the table fills.
        nbits = match t.len() {
            511 => 10,
            1023 => 11,
            2047 => 12,
            _ => nbits,
        };
        output.extend_from_slice(&entry);
        prev = Some(entry);
    }
    output
}

fn init_table() -> Vec<Vec<u8>> {
    let mut table: Vec<Vec<u8>> = (0u16..256).map(|i| vec![i as u8]).collect();
    table.push(Vec::new()); // 256: clear
    table.push(Vec::new()); // 257: EOD
    table
}

/// MSB-first bit reader.
struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    fn read_bits(&mut self, n: u8) -> Option<u32> {
        let mut result = 0u32;
        let mut remaining = n;
        while remaining > 0 {
            if self.byte_pos >= self.data.len() {
                return None;
            }
            let avail = 8 - self.bit_pos;
            let take = remaining.min(avail);
            let byte = self.data[self.byte_pos];
            let shift = avail - take;
            let mask = if take == 8 { 0xFF } else { ((1u8 << take) - 1) << shift };
            result = (result << take) | (((byte & mask) >> shift) as u32);
            self.bit_pos += take;
            if self.bit_pos >= 8 {
                self.byte_pos += 1;
                self.bit_pos = 0;
            }
            remaining -= take;
        }
        Some(result)
    }
}
