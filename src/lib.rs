// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::match_like_matches_macro)]

//! # pdf_sift
//!
//! A PDF reading and text-extraction engine: turns raw PDF bytes into a
//! logical sequence of pages, each decomposed into positioned text and
//! graphical primitives, then clustered into lines, text boxes and
//! reading-order groups.
//!
//! ## Pipeline
//!
//! raw bytes → lexer → object parser → (xref, document) → page iterator →
//! content interpreter → device → layout analysis.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_sift::{extract_pages, ExtractOptions};
//!
//! # fn main() -> pdf_sift::Result<()> {
//! let data = std::fs::read("paper.pdf")?;
//! for page in extract_pages(data, &ExtractOptions::default())? {
//!     print!("{}", page.get_text());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Lower-level access is available at every layer: [`Document`] for
//! objects, pages and outlines, [`content::Interpreter`] with a custom
//! [`device::Device`] for raw positioned primitives, and the decoders and
//! cipher primitives individually.
//!
//! The engine is single-threaded and fully synchronous; a [`Document`]
//! must not be shared across threads without external serialization, but
//! independent documents are fully isolated and can be processed in
//! parallel.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// Encryption support
pub mod encryption;

// Character maps and fonts
pub mod cmap;
pub mod fonts;

// Content-stream interpretation
pub mod content;
pub mod device;

// Layout analysis
pub mod geometry;
pub mod layout;

// Top-level pipeline
pub mod extract;

// Re-exports
pub use document::{Document, OutlineItem, Page};
pub use error::{Error, Result};
pub use extract::{extract_pages, process_document, ExtractOptions};
pub use layout::{LAParams, LayoutItem, LayoutPage, TextBox, TextLine};

// Internal utilities
pub(crate) mod utils {
    //! Internal utility functions for the library.

    use std::cmp::Ordering;

    /// Compare two floats, never panicking on NaN.
    ///
    /// NaN values compare equal to each other and greater than all other
    /// values, so sorting with this comparator is total.
    #[inline]
    pub fn safe_float_cmp(a: f32, b: f32) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.partial_cmp(&b).expect("neither is NaN"),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_safe_float_cmp_normal() {
            assert_eq!(safe_float_cmp(1.0, 2.0), Ordering::Less);
            assert_eq!(safe_float_cmp(2.0, 1.0), Ordering::Greater);
            assert_eq!(safe_float_cmp(1.5, 1.5), Ordering::Equal);
        }

        #[test]
        fn test_safe_float_cmp_nan() {
            assert_eq!(safe_float_cmp(f32::NAN, f32::NAN), Ordering::Equal);
            assert_eq!(safe_float_cmp(f32::NAN, 0.0), Ordering::Greater);
            assert_eq!(safe_float_cmp(0.0, f32::NAN), Ordering::Less);
        }
    }
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
