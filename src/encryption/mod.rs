//! Encryption support for the standard security handler.
//!
//! Covers the Standard filter with V 1-2 and revisions 2-3, i.e. RC4 with
//! 40-128 bit keys. AES and revision 4+ documents are rejected.

mod handler;
mod rc4;

pub use handler::{Permissions, StandardSecurityHandler};
pub use rc4::{rc4_crypt, Rc4};
