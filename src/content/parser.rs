//! Content-stream parser.
//!
//! Content streams use a postfix notation: operands come first, then the
//! operator keyword. This parser yields operands and operators in stream
//! order and handles the one construct that breaks the grammar: inline
//! images, whose raw binary payload sits between `ID` and `EI`.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::lexer::{is_pdf_whitespace, Lexer};
use crate::object::{Object, Stream};
use crate::parser::{dict_from_pairs, Composite, ObjectStack};

/// One item of a content stream, in source order.
#[derive(Debug)]
pub enum ContentToken {
    /// An operand (number, string, name, array, dictionary)
    Object(Object),
    /// An operator keyword
    Operator(String),
    /// An inline image (`BI ... ID <data> EI`), as a synthesized stream
    InlineImage(Stream),
}

/// Streaming parser over decoded content bytes.
pub struct ContentParser {
    lexer: Lexer,
    stack: ObjectStack,
    queue: VecDeque<ContentToken>,
}

impl ContentParser {
    /// Create a parser over (already decoded) content bytes.
    pub fn new(data: impl Into<bytes::Bytes>) -> Self {
        Self {
            lexer: Lexer::new(data),
            stack: ObjectStack::new(false),
            queue: VecDeque::new(),
        }
    }

    /// The next token, or `None` at end of stream.
    ///
    /// Malformed constructs are skipped; content parsing never fails hard.
    pub fn next(&mut self) -> Result<Option<ContentToken>> {
        loop {
            if let Some(token) = self.queue.pop_front() {
                return Ok(Some(token));
            }
            let (pos, token) = match self.lexer.next_token() {
                Ok(t) => t,
                Err(Error::Eof) => {
                    for (_, obj) in self.stack.popall() {
                        self.queue.push_back(ContentToken::Object(obj));
                    }
                    return Ok(self.queue.pop_front());
                },
                Err(e) => return Err(e),
            };
            match self.stack.handle_token(pos, token) {
                Ok(Some((kw_pos, keyword))) => match keyword.as_str() {
                    "BI" => self.stack.start(kw_pos, Composite::Inline),
                    "ID" => {
                        if let Err(e) = self.finish_inline_image() {
                            log::warn!("malformed inline image: {}", e);
                        }
                    },
                    _ => self.queue.push_back(ContentToken::Operator(keyword)),
                },
                Ok(None) => {},
                Err(e) => log::warn!("content parse error: {}", e),
            }
            if !self.stack.in_composite() {
                for (_, obj) in self.stack.popall() {
                    self.queue.push_back(ContentToken::Object(obj));
                }
            }
        }
    }

    /// Consume the raw image bytes between `ID` and `EI` and emit the
    /// synthesized stream followed by the `EI` operator.
    fn finish_inline_image(&mut self) -> Result<()> {
        let (pos, entries) = self.stack.end(Composite::Inline)?;
        let dict = dict_from_pairs(pos, entries, false)?;

        let data = self.lexer.data().clone();
        // One separator byte follows `ID`.
        let mut start = self.lexer.pos();
        if start < data.len() && is_pdf_whitespace(data[start]) {
            start += 1;
        }
        // The payload runs to an `EI` followed by whitespace (or EOF).
        let mut end = None;
        let mut i = start;
        while i + 1 < data.len() {
            if data[i] == b'E'
                && data[i + 1] == b'I'
                && (i + 2 >= data.len() || is_pdf_whitespace(data[i + 2]))
            {
                end = Some(i);
                break;
            }
            i += 1;
        }
        let end = end.ok_or_else(|| Error::Stream("inline image with no EI".to_string()))?;
        let mut payload_end = end;
        // Strip one trailing EOL.
        if payload_end > start && data[payload_end - 1] == b'\n' {
            payload_end -= 1;
        }
        if payload_end > start && data[payload_end - 1] == b'\r' {
            payload_end -= 1;
        }
        let payload = data.slice(start..payload_end);
        self.lexer.seek(end + 2)?;
        self.queue
            .push_back(ContentToken::InlineImage(Stream::new(dict, payload)));
        self.queue
            .push_back(ContentToken::Operator("EI".to_string()));
        Ok(())
    }
}
