//! Standard security handler (V 1-2, revisions 2-3).
//!
//! Implements the key derivation and user-password authentication of the
//! PDF standard security handler (PDF Ref 1.7, Algorithms 3.2, 3.4 and
//! 3.5), plus per-object key derivation for RC4 decryption.

use md5::{Digest, Md5};

use crate::encryption::rc4::rc4_crypt;
use crate::error::{Error, Result};
use crate::object::Dict;

/// The 32-byte password padding string (PDF Ref 1.7, Algorithm 3.2).
const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xbf, 0x4e, 0x5e, 0x4e, 0x75, 0x8a, 0x41, 0x64, 0x00, 0x4e, 0x56, 0xff, 0xfa, 0x01,
    0x08, 0x2e, 0x2e, 0x00, 0xb6, 0xd0, 0x68, 0x3e, 0x80, 0x2f, 0x0c, 0xa9, 0xfe, 0x64, 0x53,
    0x69, 0x7a,
];

bitflags::bitflags! {
    /// Document permission bits (the `P` entry of the encryption dict).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        /// Printing
        const PRINT = 1 << 2;
        /// Modifying contents
        const MODIFY = 1 << 3;
        /// Copying text and graphics
        const EXTRACT = 1 << 4;
        /// Adding or modifying annotations
        const ANNOTATE = 1 << 5;
    }
}

/// Authenticated decryption state for a document.
#[derive(Debug)]
pub struct StandardSecurityHandler {
    key: Vec<u8>,
    revision: i64,
    permissions: Permissions,
}

impl StandardSecurityHandler {
    /// Authenticate against the encryption dictionary with the given user
    /// password.
    ///
    /// Fails with [`Error::Encryption`] for non-Standard filters, V
    /// outside {1,2}, or revision 4+; fails with
    /// [`Error::PasswordIncorrect`] when the password does not verify.
    pub fn new(encrypt: &Dict, doc_id: &[u8], password: &str) -> Result<Self> {
        let filter = encrypt.get("Filter").and_then(|o| o.as_name()).unwrap_or("");
        if filter != "Standard" {
            return Err(Error::Encryption(format!("unknown security filter {:?}", filter)));
        }
        let v = encrypt.get("V").and_then(|o| o.as_integer()).unwrap_or(0);
        if v != 1 && v != 2 {
            return Err(Error::Encryption(format!("unsupported algorithm V={}", v)));
        }
        let revision = encrypt
            .get("R")
            .and_then(|o| o.as_integer())
            .ok_or_else(|| Error::Encryption("missing revision".to_string()))?;
        if revision >= 4 {
            return Err(Error::Encryption(format!(
                "revision {} encryption is unsupported",
                revision
            )));
        }
        let length_bits = encrypt.get("Length").and_then(|o| o.as_integer()).unwrap_or(40);
        let key_len = (length_bits / 8).clamp(5, 16) as usize;
        let o_entry = encrypt
            .get("O")
            .and_then(|o| o.as_string())
            .ok_or_else(|| Error::Encryption("missing O entry".to_string()))?;
        let u_entry = encrypt
            .get("U")
            .and_then(|o| o.as_string())
            .ok_or_else(|| Error::Encryption("missing U entry".to_string()))?;
        let p = encrypt
            .get("P")
            .and_then(|o| o.as_integer())
            .ok_or_else(|| Error::Encryption("missing P entry".to_string()))?;
        let permissions = Permissions::from_bits_truncate(p as u32);

        // Algorithm 3.2: derive the file encryption key.
        let key = derive_key(password.as_bytes(), o_entry, p as i32, doc_id, revision, key_len);

        // Algorithms 3.4 / 3.5: recompute U and compare.
        let authenticated = match revision {
            2 => {
                let u1 = rc4_crypt(&key, &PASSWORD_PADDING);
                u1 == u_entry
            },
            3 => {
                let mut h = Md5::new();
                h.update(PASSWORD_PADDING);
                h.update(doc_id);
                let base = h.finalize();
                let mut x = rc4_crypt(&key, &base[..16]);
                for i in 1u8..=19 {
                    let k: Vec<u8> = key.iter().map(|c| c ^ i).collect();
                    x = rc4_crypt(&k, &x);
                }
                u_entry.len() >= 16 && x[..16] == u_entry[..16]
            },
            other => {
                return Err(Error::Encryption(format!("unsupported revision {}", other)));
            },
        };
        if !authenticated {
            return Err(Error::PasswordIncorrect);
        }
        Ok(Self {
            key,
            revision,
            permissions,
        })
    }

    /// The permission bits granted by the document.
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// The security handler revision.
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Decrypt a string or stream payload owned by object `(id, gen)`.
    pub fn decrypt(&self, id: u32, gen: u16, data: &[u8]) -> Vec<u8> {
        let mut h = Md5::new();
        h.update(&self.key);
        h.update(&id.to_le_bytes()[..3]);
        h.update(&(gen as u32).to_le_bytes()[..2]);
        let digest = h.finalize();
        let obj_key_len = (self.key.len() + 5).min(16);
        rc4_crypt(&digest[..obj_key_len], data)
    }
}

/// Algorithm 3.2: compute the file encryption key.
fn derive_key(
    password: &[u8],
    o_entry: &[u8],
    p: i32,
    doc_id: &[u8],
    revision: i64,
    key_len: usize,
) -> Vec<u8> {
    let mut padded = Vec::with_capacity(32);
    padded.extend_from_slice(password);
    padded.extend_from_slice(&PASSWORD_PADDING);
    padded.truncate(32);

    let mut h = Md5::new();
    h.update(&padded);
    h.update(o_entry);
    h.update(p.to_le_bytes());
    h.update(doc_id);
    let mut digest = h.finalize().to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            digest = Md5::digest(&digest[..key_len]).to_vec();
        }
    }
    digest.truncate(key_len);
    digest
}
