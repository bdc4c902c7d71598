//! PDF lexer (tokenizer).
//!
//! Low-level tokenization of the PostScript-like PDF syntax. The lexer owns
//! a position cursor over the whole file bytes and can be restarted from any
//! byte offset, which is what xref-driven random access requires.
//!
//! # PDF Syntax Overview
//!
//! - Numbers: integers (42, -123) and reals (3.14, -2.5, .5, 1.2e3)
//! - Strings: literal ((Hello)) and hexadecimal (<48656C6C6F>)
//! - Names: identifiers starting with / (/Type, /A#20B)
//! - Keywords: any other delimited word; `true`/`false` lex as booleans
//! - Structural delimiters: `[`, `]`, `<<`, `>>`, `{`, `}`
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are
//! skipped. Escape sequences in literal strings and `#XX` sequences in
//! names are decoded here, at the lexer level.

use bytes::Bytes;
use nom::{
    character::complete::{digit1, one_of},
    combinator::opt,
    sequence::preceded,
    IResult,
};

use crate::error::{Error, Result};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    /// Integer number
    Integer(i64),
    /// Real (floating-point) number
    Real(f64),
    /// Hexadecimal string, already decoded to bytes
    HexString(Vec<u8>),
    /// Literal string, escape sequences already decoded
    LitString(Vec<u8>),
    /// Name (without the leading /), `#XX` escapes already decoded
    Name(String),
    /// Boolean keyword (`true` / `false`)
    Bool(bool),
    /// Any other delimited word (`obj`, `stream`, `R`, operators, ...)
    Keyword(String),
    /// `[`
    ArrayBegin,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictBegin,
    /// `>>`
    DictEnd,
    /// `{`
    ProcBegin,
    /// `}`
    ProcEnd,
}

/// PDF whitespace characters (PDF Ref 1.7, Table 3.1).
pub(crate) fn is_pdf_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters.
pub(crate) fn is_pdf_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn ends_token(input: &[u8]) -> bool {
    match input.first() {
        None => true,
        Some(&c) => is_pdf_whitespace(c) || is_pdf_delimiter(c),
    }
}

/// Parse an integer or real number, requiring a delimiter afterwards.
///
/// Reals carry a mandatory decimal point and an optional non-negative
/// exponent; anything else (e.g. `1e5`, `12abc`) falls through and lexes
/// as a keyword.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token> {
    let (rest, sign) = opt(one_of("+-"))(input)?;
    let (rest, int_part) = opt(digit1)(rest)?;
    let (rest, frac_part) = opt(preceded(nom::character::complete::char('.'), opt(digit1)))(rest)?;
    if int_part.is_none() && frac_part.is_none() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    if let Some(frac) = frac_part {
        // Real: optional exponent of the form (e|E)[0-9]+
        let (rest, exp) = opt(preceded(one_of("eE"), digit1))(rest)?;
        if !ends_token(rest) {
            return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
        }
        let mut s = String::new();
        if sign == Some('-') {
            s.push('-');
        }
        s.push_str(std::str::from_utf8(int_part.unwrap_or(b"0")).unwrap_or("0"));
        s.push('.');
        s.push_str(std::str::from_utf8(frac.unwrap_or(b"0")).unwrap_or("0"));
        if let Some(exp) = exp {
            s.push('e');
            s.push_str(std::str::from_utf8(exp).unwrap_or("0"));
        }
        let value: f64 = s.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        Ok((rest, Token::Real(value)))
    } else {
        if !ends_token(rest) {
            return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
        }
        let digits = std::str::from_utf8(int_part.unwrap()).unwrap_or("0");
        let mut value: i64 = digits.parse().unwrap_or(0);
        if sign == Some('-') {
            value = -value;
        }
        Ok((rest, Token::Integer(value)))
    }
}

/// Decode `#XX` escape sequences in a raw name.
///
/// Valid two-digit hex escapes become the named byte; any leftover lone
/// `#` characters are dropped.
fn decode_name(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' {
            if i + 2 < raw.len() {
                let pair = String::from_utf8_lossy(&raw[i + 1..i + 3]).into_owned();
                if let Ok(byte) = u8::from_str_radix(&pair, 16) {
                    out.push(byte as char);
                    i += 3;
                    continue;
                }
            }
            i += 1; // lone '#', dropped
        } else {
            out.push(raw[i] as char);
            i += 1;
        }
    }
    out
}

/// Decode a literal string body, resolving escapes and balancing parens.
///
/// Returns the decoded bytes and the number of input bytes consumed,
/// counting from just after the opening parenthesis and including the
/// closing one.
fn scan_literal_string(input: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::new();
    let mut depth = 1usize;
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'\\' => {
                i += 1;
                if i >= input.len() {
                    break;
                }
                match input[i] {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'\\' => out.push(b'\\'),
                    b'(' => out.push(b'('),
                    b')' => out.push(b')'),
                    b'0'..=b'7' => {
                        let start = i;
                        let mut value: u32 = 0;
                        let mut ndigits = 0;
                        while ndigits < 3 && i < input.len() && (b'0'..=b'7').contains(&input[i]) {
                            value = value * 8 + (input[i] - b'0') as u32;
                            i += 1;
                            ndigits += 1;
                        }
                        if value > 0xFF {
                            // An octal above one byte is unencodable; keep
                            // the escape literally.
                            out.push(b'\\');
                            out.extend_from_slice(&input[start..i]);
                        } else {
                            out.push(value as u8);
                        }
                        continue;
                    },
                    b'\r' => {
                        // line continuation, swallow an optional \n too
                        if input.get(i + 1) == Some(&b'\n') {
                            i += 1;
                        }
                    },
                    b'\n' => {},
                    other => {
                        out.push(b'\\');
                        out.push(other);
                    },
                }
                i += 1;
            },
            b'(' => {
                depth += 1;
                out.push(b'(');
                i += 1;
            },
            b')' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return (out, i);
                }
                out.push(b')');
            },
            other => {
                out.push(other);
                i += 1;
            },
        }
    }
    (out, i)
}

/// Decode a hex string body up to (and including) the closing `>`.
///
/// Whitespace is ignored; a trailing unpaired digit contributes its own
/// value as the final byte.
fn scan_hex_string(input: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::new();
    let mut pending: Option<u8> = None;
    let mut i = 0;
    while i < input.len() {
        let c = input[i];
        i += 1;
        if c == b'>' {
            break;
        }
        if is_pdf_whitespace(c) {
            continue;
        }
        match (c as char).to_digit(16) {
            Some(d) => match pending.take() {
                Some(high) => out.push((high << 4) | d as u8),
                None => pending = Some(d as u8),
            },
            None => log::warn!("non-hex byte 0x{:02x} inside hex string", c),
        }
    }
    if let Some(last) = pending {
        out.push(last);
    }
    (out, i)
}

/// Tokenizer over whole-file bytes with a seekable position cursor.
#[derive(Debug, Clone)]
pub struct Lexer {
    data: Bytes,
    pos: usize,
}

impl Lexer {
    /// Create a lexer over the given bytes, positioned at offset 0.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// The underlying bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Current byte offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the cursor to an absolute byte offset.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::Value(format!(
                "seek to {} beyond end of data ({})",
                pos,
                self.data.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn skip_whitespace_and_comments(&mut self) {
        while self.pos < self.data.len() {
            let c = self.data[self.pos];
            if is_pdf_whitespace(c) {
                self.pos += 1;
            } else if c == b'%' {
                while self.pos < self.data.len() && !matches!(self.data[self.pos], b'\r' | b'\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Produce the next token and its starting byte offset.
    ///
    /// Bytes that cannot start any token are skipped with a warning;
    /// `Err(Eof)` signals the end of input.
    pub fn next_token(&mut self) -> Result<(usize, Token)> {
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.data.len() {
                return Err(Error::Eof);
            }
            let start = self.pos;
            let rest = &self.data[self.pos..];
            match rest[0] {
                b'/' => {
                    let body = &rest[1..];
                    let len = body
                        .iter()
                        .position(|&c| is_pdf_whitespace(c) || is_pdf_delimiter(c))
                        .unwrap_or(body.len());
                    self.pos += 1 + len;
                    return Ok((start, Token::Name(decode_name(&body[..len]))));
                },
                b'(' => {
                    let (bytes, consumed) = scan_literal_string(&rest[1..]);
                    self.pos += 1 + consumed;
                    return Ok((start, Token::LitString(bytes)));
                },
                b'<' => {
                    if rest.get(1) == Some(&b'<') {
                        self.pos += 2;
                        return Ok((start, Token::DictBegin));
                    }
                    let (bytes, consumed) = scan_hex_string(&rest[1..]);
                    self.pos += 1 + consumed;
                    return Ok((start, Token::HexString(bytes)));
                },
                b'>' => {
                    if rest.get(1) == Some(&b'>') {
                        self.pos += 2;
                        return Ok((start, Token::DictEnd));
                    }
                    log::warn!("stray '>' at offset {}", start);
                    self.pos += 1;
                },
                b'[' => {
                    self.pos += 1;
                    return Ok((start, Token::ArrayBegin));
                },
                b']' => {
                    self.pos += 1;
                    return Ok((start, Token::ArrayEnd));
                },
                b'{' => {
                    self.pos += 1;
                    return Ok((start, Token::ProcBegin));
                },
                b'}' => {
                    self.pos += 1;
                    return Ok((start, Token::ProcEnd));
                },
                b')' => {
                    log::warn!("stray ')' at offset {}", start);
                    self.pos += 1;
                },
                _ => {
                    if let Ok((remaining, token)) = parse_number(rest) {
                        self.pos += rest.len() - remaining.len();
                        return Ok((start, token));
                    }
                    // Keyword: everything up to the next delimiter.
                    let len = rest
                        .iter()
                        .position(|&c| is_pdf_whitespace(c) || is_pdf_delimiter(c))
                        .unwrap_or(rest.len());
                    if len == 0 {
                        log::warn!("unlexable byte 0x{:02x} at offset {}", rest[0], start);
                        self.pos += 1;
                        continue;
                    }
                    self.pos += len;
                    let word = String::from_utf8_lossy(&rest[..len]).into_owned();
                    let token = match word.as_str() {
                        "true" => Token::Bool(true),
                        "false" => Token::Bool(false),
                        _ => Token::Keyword(word),
                    };
                    return Ok((start, token));
                },
            }
        }
    }

    /// Fetch the next line, up to and including its EOL marker.
    ///
    /// A `\r\n` pair counts as a single line ending.
    pub fn next_line(&mut self) -> Result<(usize, Vec<u8>)> {
        if self.pos >= self.data.len() {
            return Err(Error::Eof);
        }
        let start = self.pos;
        let mut end = self.pos;
        while end < self.data.len() {
            match self.data[end] {
                b'\n' => {
                    end += 1;
                    break;
                },
                b'\r' => {
                    end += 1;
                    if self.data.get(end) == Some(&b'\n') {
                        end += 1;
                    }
                    break;
                },
                _ => end += 1,
            }
        }
        self.pos = end;
        Ok((start, self.data[start..end].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tokens(data: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(data.to_vec());
        let mut out = Vec::new();
        while let Ok((_, tok)) = lexer.next_token() {
            out.push(tok);
        }
        out
    }

    // ========================================================================
    // Numbers
    // ========================================================================

    #[test]
    fn test_integers() {
        assert_eq!(all_tokens(b"42 -123 +17 0"), vec![
            Token::Integer(42),
            Token::Integer(-123),
            Token::Integer(17),
            Token::Integer(0),
        ]);
    }

    #[test]
    fn test_reals() {
        assert_eq!(all_tokens(b"3.14 -2.5 .5 5. -.002"), vec![
            Token::Real(3.14),
            Token::Real(-2.5),
            Token::Real(0.5),
            Token::Real(5.0),
            Token::Real(-0.002),
        ]);
    }

    #[test]
    fn test_real_with_exponent() {
        assert_eq!(all_tokens(b"1.5e3"), vec![Token::Real(1500.0)]);
    }

    #[test]
    fn test_number_without_delimiter_is_a_keyword() {
        assert_eq!(all_tokens(b"12abc"), vec![Token::Keyword("12abc".to_string())]);
    }

    // ========================================================================
    // Strings
    // ========================================================================

    #[test]
    fn test_literal_string_simple() {
        assert_eq!(all_tokens(b"(Hello World)"), vec![Token::LitString(b"Hello World".to_vec())]);
    }

    #[test]
    fn test_literal_string_nested_parens() {
        assert_eq!(
            all_tokens(b"(abc ( def ) ghi)"),
            vec![Token::LitString(b"abc ( def ) ghi".to_vec())]
        );
    }

    #[test]
    fn test_literal_string_escapes() {
        assert_eq!(all_tokens(b"(foo\\nbaa)"), vec![Token::LitString(b"foo\nbaa".to_vec())]);
        assert_eq!(
            all_tokens(b"(def\\040\\0\\0404ghi)"),
            vec![Token::LitString(b"def \x00 4ghi".to_vec())]
        );
    }

    #[test]
    fn test_literal_string_escaped_parens() {
        // Escaped parens are detected and not counted for balancing.
        assert_eq!(all_tokens(br"(str1\(foo)(str2)"), vec![
            Token::LitString(b"str1(foo".to_vec()),
            Token::LitString(b"str2".to_vec()),
        ]);
    }

    #[test]
    fn test_literal_string_octal_above_byte_kept_literally() {
        assert_eq!(all_tokens(b"(\\500)"), vec![Token::LitString(b"\\500".to_vec())]);
    }

    #[test]
    fn test_literal_string_line_continuation() {
        assert_eq!(all_tokens(b"(foo\\\nbaa)"), vec![Token::LitString(b"foobaa".to_vec())]);
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(all_tokens(b"<feff>"), vec![Token::HexString(b"\xfe\xff".to_vec())]);
        assert_eq!(all_tokens(b"< 40 4020 >"), vec![Token::HexString(b"\x40\x40\x20".to_vec())]);
    }

    #[test]
    fn test_hex_string_trailing_digit() {
        assert_eq!(
            all_tokens(b"<abcd00\n12345>"),
            vec![Token::HexString(b"\xab\xcd\x00\x12\x34\x05".to_vec())]
        );
    }

    #[test]
    fn test_hex_string_needs_no_delimiter() {
        assert_eq!(all_tokens(b"<0042>foo"), vec![
            Token::HexString(b"\x00\x42".to_vec()),
            Token::Keyword("foo".to_string()),
        ]);
    }

    // ========================================================================
    // Names and keywords
    // ========================================================================

    #[test]
    fn test_names() {
        assert_eq!(all_tokens(b"/a/BCD /Some_Name"), vec![
            Token::Name("a".to_string()),
            Token::Name("BCD".to_string()),
            Token::Name("Some_Name".to_string()),
        ]);
    }

    #[test]
    fn test_name_hex_escape() {
        assert_eq!(all_tokens(b"/A#20B"), vec![Token::Name("A B".to_string())]);
        // Invalid escape: the lone '#' is dropped.
        assert_eq!(all_tokens(b"/foo#5f#xbaa"), vec![Token::Name("foo_xbaa".to_string())]);
    }

    #[test]
    fn test_bool_keywords() {
        assert_eq!(all_tokens(b"true false"), vec![Token::Bool(true), Token::Bool(false)]);
    }

    #[test]
    fn test_structural_tokens() {
        assert_eq!(all_tokens(b"[]<<>>{}"), vec![
            Token::ArrayBegin,
            Token::ArrayEnd,
            Token::DictBegin,
            Token::DictEnd,
            Token::ProcBegin,
            Token::ProcEnd,
        ]);
    }

    #[test]
    fn test_comment_skipped() {
        assert_eq!(all_tokens(b"% a comment\n42"), vec![Token::Integer(42)]);
        assert_eq!(
            all_tokens(b"(this % is not a comment.)"),
            vec![Token::LitString(b"this % is not a comment.".to_vec())]
        );
    }

    #[test]
    fn test_pdf_snippet() {
        let toks = all_tokens(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj");
        assert_eq!(toks, vec![
            Token::Integer(1),
            Token::Integer(0),
            Token::Keyword("obj".to_string()),
            Token::DictBegin,
            Token::Name("Type".to_string()),
            Token::Name("Catalog".to_string()),
            Token::Name("Pages".to_string()),
            Token::Integer(2),
            Token::Integer(0),
            Token::Keyword("R".to_string()),
            Token::DictEnd,
            Token::Keyword("endobj".to_string()),
        ]);
    }

    // ========================================================================
    // Cursor behavior
    // ========================================================================

    #[test]
    fn test_token_offsets() {
        let mut lexer = Lexer::new(&b"  42 /Type (Hi)"[..]);
        assert_eq!(lexer.next_token().unwrap().0, 2);
        assert_eq!(lexer.next_token().unwrap().0, 5);
        assert_eq!(lexer.next_token().unwrap().0, 11);
    }

    #[test]
    fn test_seek_and_relex() {
        let data = b"1 0 obj << /Length 5 >>";
        let mut lexer = Lexer::new(&data[..]);
        let mut seen = Vec::new();
        while let Ok(t) = lexer.next_token() {
            seen.push(t);
        }
        // Re-lexing from any recorded offset reproduces the same token.
        for (offset, token) in &seen {
            lexer.seek(*offset).unwrap();
            let (pos, tok) = lexer.next_token().unwrap();
            assert_eq!(pos, *offset);
            assert_eq!(&tok, token);
        }
    }

    #[test]
    fn test_seek_out_of_range() {
        let mut lexer = Lexer::new(&b"abc"[..]);
        assert!(lexer.seek(4).is_err());
        assert!(lexer.seek(3).is_ok());
    }

    #[test]
    fn test_next_line() {
        let mut lexer = Lexer::new(&b"first\r\nsecond\rthird\nlast"[..]);
        assert_eq!(lexer.next_line().unwrap(), (0, b"first\r\n".to_vec()));
        assert_eq!(lexer.next_line().unwrap(), (7, b"second\r".to_vec()));
        assert_eq!(lexer.next_line().unwrap(), (14, b"third\n".to_vec()));
        assert_eq!(lexer.next_line().unwrap(), (20, b"last".to_vec()));
        assert!(matches!(lexer.next_line(), Err(Error::Eof)));
    }

    #[test]
    fn test_eof() {
        let mut lexer = Lexer::new(&b"   % only a comment"[..]);
        assert!(matches!(lexer.next_token(), Err(Error::Eof)));
    }
}
