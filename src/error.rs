//! Error types for the PDF engine.
//!
//! This module defines all error types that can occur during PDF parsing,
//! decoding, decryption and layout analysis.

/// Result type alias for PDF engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed token at a specific byte offset
    #[error("Lex error at byte {offset}: {reason}")]
    Lex {
        /// Byte offset where the error occurred
        offset: usize,
        /// Reason for the failure
        reason: String,
    },

    /// Unexpected operator or malformed construct
    #[error("Syntax error at byte {offset}: {reason}")]
    Syntax {
        /// Byte offset where the error occurred
        offset: usize,
        /// Reason for the failure
        reason: String,
    },

    /// Object has wrong type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected object type
        expected: &'static str,
        /// Actual object type found
        found: &'static str,
    },

    /// Out-of-range integer, bad length, or similar value problem
    #[error("Value error: {0}")]
    Value(String),

    /// Unexpected end of input
    #[error("Unexpected end of input")]
    Eof,

    /// Stream structure error (missing endstream, bad filter data)
    #[error("Stream error: {0}")]
    Stream(String),

    /// Stream filter is recognized but not supported
    #[error("Unsupported filter: {0}")]
    FilterUnsupported(String),

    /// Predictor configuration is not supported
    #[error("Unsupported predictor: {0}")]
    PredictorUnsupported(i64),

    /// Encryption dictionary is malformed or uses an unsupported scheme
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// The supplied password failed authentication
    #[error("Incorrect password")]
    PasswordIncorrect,

    /// No cross-reference table could be located or synthesized
    #[error("No valid xref: {0}")]
    NoValidXref(String),

    /// Referenced object not found
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// A CID has no Unicode mapping in the font
    #[error("No Unicode mapping for cid {0}")]
    UnicodeNotDefined(u32),

    /// The document permission bits forbid text extraction
    #[error("Text extraction is not allowed by the document permissions")]
    TextExtractionNotAllowed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a syntax error at a byte offset.
    pub(crate) fn syntax(offset: usize, reason: impl Into<String>) -> Error {
        Error::Syntax {
            offset,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_carries_offset() {
        let err = Error::syntax(1234, "unbalanced dictionary");
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("unbalanced dictionary"));
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = Error::TypeMismatch {
            expected: "Dictionary",
            found: "Array",
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Dictionary"));
        assert!(msg.contains("Array"));
    }

    #[test]
    fn test_object_not_found_message() {
        let err = Error::ObjectNotFound(10, 0);
        assert!(format!("{}", err).contains("10 0 R"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
