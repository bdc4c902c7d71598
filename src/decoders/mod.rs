//! Stream decoder implementations for PDF filters.
//!
//! This module provides decoders for the PDF compression and encoding
//! filters the engine supports:
//! - FlateDecode (zlib/deflate) - most common
//! - LZWDecode - LZW compression with early code-size change
//! - ASCII85Decode - base85 encoding
//! - ASCIIHexDecode - hexadecimal encoding
//! - RunLengthDecode - PackBits-style run-length encoding
//! - DCTDecode - JPEG (pass-through; the consumer receives JPEG bytes)
//!
//! CCITTFaxDecode and Crypt are recognized but unsupported. Decoders are
//! chained in a filter pipeline; the PNG predictor is applied after all
//! filters when `DecodeParms` requests it.
//!
//! Inline images use abbreviated filter names (`Fl`, `LZW`, `A85`, `AHx`,
//! `RL`, `DCT`, `CCF`); both spellings dispatch identically.

use crate::error::{Error, Result};

mod ascii85;
mod ascii_hex;
mod dct;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use ascii85::Ascii85Decoder;
pub use ascii_hex::AsciiHexDecoder;
pub use dct::DctDecoder;
pub use flate::FlateDecoder;
pub use lzw::LzwDecoder;
pub use predictor::{apply_predictor, DecodeParams};
pub use runlength::RunLengthDecoder;

/// Trait for PDF stream decoders.
///
/// Each decoder implements a specific PDF filter algorithm.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// The canonical name of this decoder (e.g. "FlateDecode").
    fn name(&self) -> &str;
}

/// Look up a decoder by filter name (canonical or abbreviated).
///
/// Returns `Err(FilterUnsupported)` for CCITTFaxDecode, Crypt, and any
/// unrecognized name.
pub fn decoder_for(name: &str) -> Result<Box<dyn StreamDecoder>> {
    match name {
        "FlateDecode" | "Fl" => Ok(Box::new(FlateDecoder)),
        "LZWDecode" | "LZW" => Ok(Box::new(LzwDecoder)),
        "ASCII85Decode" | "A85" => Ok(Box::new(Ascii85Decoder)),
        "ASCIIHexDecode" | "AHx" => Ok(Box::new(AsciiHexDecoder)),
        "RunLengthDecode" | "RL" => Ok(Box::new(RunLengthDecoder)),
        "DCTDecode" | "DCT" => Ok(Box::new(DctDecoder)),
        _ => Err(Error::FilterUnsupported(name.to_string())),
    }
}

/// Decode stream data through a filter pipeline.
///
/// Filters apply in order; after all filters, the PNG predictor runs if
/// `params` requests one. In lenient mode a corrupt predictor row decodes
/// to empty output instead of failing.
pub fn apply_filters(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    strict: bool,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for name in filters {
        current = decoder_for(name)?.decode(&current)?;
    }
    if let Some(params) = params {
        if params.predictor != 1 {
            current = apply_predictor(&current, params, strict)?;
        }
    }
    Ok(current)
}
