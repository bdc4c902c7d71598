//! Property-based checks for the lexer and the cipher.

use pdf_sift::encryption::{rc4_crypt, Rc4};
use pdf_sift::lexer::Lexer;
use proptest::prelude::*;

/// A strategy producing syntactically valid PDF token text.
fn token_text() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i32>().prop_map(|n| n.to_string()),
        (-1000.0f64..1000.0).prop_map(|r| format!("{:.3}", r)),
        "[a-zA-Z][a-zA-Z0-9]{0,8}".prop_map(|w| format!("/{}", w)),
        "[a-zA-Z]{1,8}",
        "[a-zA-Z0-9 ]{0,12}".prop_map(|s| format!("({})", s)),
        "[0-9a-fA-F]{2,8}".prop_map(|h| format!("<{}>", h)),
        Just("<<".to_string()),
        Just(">>".to_string()),
        Just("[".to_string()),
        Just("]".to_string()),
        Just("true".to_string()),
        Just("false".to_string()),
    ]
}

proptest! {
    /// Re-lexing from any recorded token offset reproduces the token.
    #[test]
    fn lexer_restartable_from_any_offset(words in prop::collection::vec(token_text(), 1..40)) {
        let data = words.join(" ").into_bytes();
        let mut lexer = Lexer::new(data);
        let mut seen = Vec::new();
        while let Ok(tok) = lexer.next_token() {
            seen.push(tok);
        }
        for (offset, token) in &seen {
            lexer.seek(*offset).unwrap();
            let (pos, tok) = lexer.next_token().unwrap();
            prop_assert_eq!(pos, *offset);
            prop_assert_eq!(&tok, token);
        }
    }

    /// Arcfour is involutive for any key and message.
    #[test]
    fn rc4_involution(
        key in prop::collection::vec(any::<u8>(), 1..64),
        msg in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let encrypted = rc4_crypt(&key, &msg);
        prop_assert_eq!(rc4_crypt(&key, &encrypted), msg);
    }

    /// Chunked processing equals one-shot processing.
    #[test]
    fn rc4_chunking_irrelevant(
        key in prop::collection::vec(any::<u8>(), 1..32),
        msg in prop::collection::vec(any::<u8>(), 1..128),
        split in 0usize..128,
    ) {
        let split = split.min(msg.len());
        let mut cipher = Rc4::new(&key);
        let mut chunked = cipher.process(&msg[..split]);
        chunked.extend(cipher.process(&msg[split..]));
        prop_assert_eq!(chunked, rc4_crypt(&key, &msg));
    }

    /// Lexing never panics on arbitrary bytes.
    #[test]
    fn lexer_total_on_garbage(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut lexer = Lexer::new(data);
        let mut guard = 0;
        while lexer.next_token().is_ok() {
            guard += 1;
            if guard > 2048 {
                break;
            }
        }
    }
}
