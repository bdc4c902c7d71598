//! RC4 (Arcfour) stream cipher.
//!
//! Used by the standard security handler in revisions 2 and 3. RC4 is a
//! keystream generator: the KSA permutes a 256-byte state from the key and
//! the PRGA produces keystream bytes that are XORed with the data.
//! Encryption and decryption are the same operation.

/// Stateful RC4 cipher.
///
/// Successive [`process`](Rc4::process) calls continue the keystream.
pub struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Initialize the cipher state from a key.
    pub fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (i, v) in s.iter_mut().enumerate() {
            *v = i as u8;
        }
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
        Self { s, i: 0, j: 0 }
    }

    /// XOR the data with the keystream.
    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .map(|&byte| {
                self.i = self.i.wrapping_add(1);
                self.j = self.j.wrapping_add(self.s[self.i as usize]);
                self.s.swap(self.i as usize, self.j as usize);
                let k = self.s
                    [self.s[self.i as usize].wrapping_add(self.s[self.j as usize]) as usize];
                byte ^ k
            })
            .collect()
    }
}

/// One-shot convenience: encrypt or decrypt `data` with `key`.
pub fn rc4_crypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    Rc4::new(key).process(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_rc4_published_vectors() {
        assert_eq!(rc4_crypt(b"Key", b"Plaintext"), hex("bbf316e8d940af0ad3"));
        assert_eq!(rc4_crypt(b"Wiki", b"pedia"), hex("1021bf0420"));
        assert_eq!(
            rc4_crypt(b"Secret", b"Attack at dawn"),
            hex("45a01f645fc35b383552544b9bf5")
        );
    }

    #[test]
    fn test_rc4_is_involutive() {
        let key = b"testkey";
        let plaintext = b"Hello, World!";
        let ciphertext = rc4_crypt(key, plaintext);
        assert_ne!(&ciphertext[..], &plaintext[..]);
        assert_eq!(rc4_crypt(key, &ciphertext), plaintext);
    }

    #[test]
    fn test_rc4_keystream_is_stateful() {
        // Processing in two chunks must equal processing at once.
        let mut cipher = Rc4::new(b"Secret");
        let mut out = cipher.process(b"Attack ");
        out.extend(cipher.process(b"at dawn"));
        assert_eq!(out, rc4_crypt(b"Secret", b"Attack at dawn"));
    }

    #[test]
    fn test_rc4_empty_input() {
        assert!(rc4_crypt(b"key", b"").is_empty());
    }
}
