//! PNG predictor support.
//!
//! Xref streams and many image streams post-process their filter output
//! with a PNG row predictor (DecodeParms `Predictor` 10..=15). Each row is
//! one algorithm byte followed by `colors * columns * bpc / 8` data bytes;
//! the row is reconstructed from the previous decoded row using the
//! sub/up/average/paeth rules.
//!
//! Only 8 bits per component is supported; other depths fail with
//! `PredictorUnsupported`. In lenient mode a corrupt row yields empty
//! output instead of a hard failure.

use crate::error::{Error, Result};

/// Decode parameters relevant to the predictor stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 10..=15 = PNG)
    pub predictor: i64,
    /// Samples per pixel
    pub colors: usize,
    /// Samples per row
    pub columns: usize,
    /// Bits per component
    pub bits_per_component: i64,
}

/// Apply the predictor named by `params` to already-unfiltered data.
pub fn apply_predictor(data: &[u8], params: &DecodeParams, strict: bool) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        10..=15 => {
            if params.bits_per_component != 8 {
                return Err(Error::PredictorUnsupported(params.predictor));
            }
            match apply_png_predictor(data, params.colors, params.columns) {
                Ok(out) => Ok(out),
                Err(e) if strict => Err(e),
                Err(e) => {
                    log::warn!("corrupt predictor row: {}", e);
                    Ok(Vec::new())
                },
            }
        },
        other => Err(Error::PredictorUnsupported(other)),
    }
}

/// Reconstruct rows using the per-row PNG filter byte.
fn apply_png_predictor(data: &[u8], colors: usize, columns: usize) -> Result<Vec<u8>> {
    let nbytes = colors * columns;
    if nbytes == 0 {
        return Ok(Vec::new());
    }
    // Byte distance to the "left" neighbor within a row.
    let pixel_bytes = colors.max(1);
    let mut output = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; nbytes];
    let mut i = 0;
    while i < data.len() {
        let filter = data[i];
        i += 1;
        let end = (i + nbytes).min(data.len());
        let mut row = data[i..end].to_vec();
        row.resize(nbytes, 0);
        i = end;
        match filter {
            0 => {},
            1 => {
                // sub
                for k in pixel_bytes..nbytes {
                    row[k] = row[k].wrapping_add(row[k - pixel_bytes]);
                }
            },
            2 => {
                // up
                for k in 0..nbytes {
                    row[k] = row[k].wrapping_add(prev_row[k]);
                }
            },
            3 => {
                // average
                for k in 0..nbytes {
                    let left = if k >= pixel_bytes { row[k - pixel_bytes] as u16 } else { 0 };
                    let up = prev_row[k] as u16;
                    row[k] = row[k].wrapping_add(((left + up) / 2) as u8);
                }
            },
            4 => {
                // paeth
                for k in 0..nbytes {
                    let left = if k >= pixel_bytes { row[k - pixel_bytes] as i16 } else { 0 };
                    let up = prev_row[k] as i16;
                    let up_left = if k >= pixel_bytes {
                        prev_row[k - pixel_bytes] as i16
                    } else {
                        0
                    };
                    row[k] = row[k].wrapping_add(paeth(left, up, up_left));
                }
            },
            other => {
                return Err(Error::Stream(format!("invalid PNG filter byte {}", other)));
            },
        }
        output.extend_from_slice(&row);
        prev_row = row;
    }
    Ok(output)
}

fn paeth(a: i16, b: i16, c: i16) -> u8 {
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}
