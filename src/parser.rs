//! PDF object parser.
//!
//! Two layers live here:
//!
//! - [`ObjectStack`]: the stack machine shared by every parser in the
//!   engine. Structural tokens (`[`, `]`, `<<`, `>>`, `{`, `}`) open and
//!   close composite contexts; value tokens push onto the current stack;
//!   keyword tokens are handed back to the owning parser.
//! - [`PdfParser`]: the document-level parser. It resolves the PDF-specific
//!   keywords: `R` builds indirect references, `null` pushes Null,
//!   `stream` captures the raw payload using the dictionary's `Length`
//!   (with a regex hunt for `endstream` when the length lies), and
//!   `endobj`/`startxref` flush finished objects.
//!
//! The content-stream and CMap parsers build on [`ObjectStack`] with their
//! own keyword sets.

use std::collections::VecDeque;

use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::error::{Error, Result};
use crate::lexer::{Lexer, Token};
use crate::object::{Dict, Object, ObjectRef, Stream};

lazy_static! {
    static ref ENDSTREAM_RE: Regex = Regex::new(r"(\r\n|\r|\n)endstream").unwrap();
}

/// Kinds of composite construct a parser can be inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composite {
    /// `[ ... ]`
    Array,
    /// `<< ... >>`
    Dict,
    /// `{ ... }` (used by CMap files, ignored for page content)
    Proc,
    /// `BI ... ID` inline-image dictionary entries
    Inline,
}

impl Composite {
    fn name(self) -> &'static str {
        match self {
            Composite::Array => "array",
            Composite::Dict => "dictionary",
            Composite::Proc => "procedure",
            Composite::Inline => "inline image",
        }
    }
}

/// The shared stack machine.
///
/// Holds the pending `(offset, object)` stack and the saved stacks of the
/// enclosing composite constructs.
#[derive(Debug, Default)]
pub struct ObjectStack {
    stack: Vec<(usize, Object)>,
    context: Vec<(usize, Composite, Vec<(usize, Object)>)>,
    strict: bool,
}

impl ObjectStack {
    /// Create a stack machine with the given strictness.
    pub fn new(strict: bool) -> Self {
        Self {
            stack: Vec::new(),
            context: Vec::new(),
            strict,
        }
    }

    /// Push a value.
    pub fn push(&mut self, pos: usize, obj: Object) {
        self.stack.push((pos, obj));
    }

    /// Pop up to `n` values, preserving their order.
    pub fn pop(&mut self, n: usize) -> Vec<(usize, Object)> {
        let at = self.stack.len().saturating_sub(n);
        self.stack.split_off(at)
    }

    /// Pop every pending value.
    pub fn popall(&mut self) -> Vec<(usize, Object)> {
        std::mem::take(&mut self.stack)
    }

    /// Whether any composite construct is open.
    pub fn in_composite(&self) -> bool {
        !self.context.is_empty()
    }

    /// Whether the value stack is empty.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Open a composite construct at `pos`.
    pub fn start(&mut self, pos: usize, kind: Composite) {
        let saved = std::mem::take(&mut self.stack);
        self.context.push((pos, kind, saved));
    }

    /// Close the innermost composite construct, which must be `kind`.
    pub fn end(&mut self, kind: Composite) -> Result<(usize, Vec<Object>)> {
        match self.context.last() {
            Some((_, open, _)) if *open == kind => {},
            Some((pos, open, _)) => {
                return Err(Error::syntax(
                    *pos,
                    format!("expected end of {}, found end of {}", open.name(), kind.name()),
                ));
            },
            None => {
                return Err(Error::syntax(0, format!("unmatched end of {}", kind.name())));
            },
        }
        let (pos, _, saved) = self.context.pop().expect("checked above");
        let objs = std::mem::replace(&mut self.stack, saved)
            .into_iter()
            .map(|(_, obj)| obj)
            .collect();
        Ok((pos, objs))
    }

    /// Feed one token through the structural rules.
    ///
    /// Value tokens are pushed; composite delimiters open and close
    /// contexts; keywords are returned to the caller. A structural error in
    /// lenient mode is logged and the token dropped.
    pub fn handle_token(&mut self, pos: usize, token: Token) -> Result<Option<(usize, String)>> {
        match token {
            Token::Integer(i) => self.push(pos, Object::Integer(i)),
            Token::Real(r) => self.push(pos, Object::Real(r)),
            Token::Bool(b) => self.push(pos, Object::Boolean(b)),
            Token::HexString(s) | Token::LitString(s) => self.push(pos, Object::String(s)),
            Token::Name(n) => self.push(pos, Object::Name(n)),
            Token::ArrayBegin => self.start(pos, Composite::Array),
            Token::ArrayEnd => match self.end(Composite::Array) {
                Ok((pos, objs)) => self.push(pos, Object::Array(objs)),
                Err(e) => self.recover(e)?,
            },
            Token::DictBegin => self.start(pos, Composite::Dict),
            Token::DictEnd => match self.end(Composite::Dict) {
                Ok((pos, objs)) => {
                    let dict = self.build_dict(pos, objs)?;
                    self.push(pos, Object::Dictionary(dict));
                },
                Err(e) => self.recover(e)?,
            },
            Token::ProcBegin => self.start(pos, Composite::Proc),
            Token::ProcEnd => match self.end(Composite::Proc) {
                Ok((pos, objs)) => self.push(pos, Object::Array(objs)),
                Err(e) => self.recover(e)?,
            },
            Token::Keyword(kw) => return Ok(Some((pos, kw))),
        }
        Ok(None)
    }

    fn build_dict(&self, pos: usize, objs: Vec<Object>) -> Result<Dict> {
        dict_from_pairs(pos, objs, self.strict)
    }

    fn recover(&mut self, e: Error) -> Result<()> {
        if self.strict {
            return Err(e);
        }
        log::warn!("{}", e);
        Ok(())
    }
}

/// The document-level parser: lexer + stack machine + PDF keywords.
pub struct PdfParser {
    lexer: Lexer,
    stack: ObjectStack,
    results: VecDeque<(usize, Object)>,
    strict: bool,
}

impl PdfParser {
    /// Create a parser over the given bytes.
    pub fn new(data: impl Into<bytes::Bytes>, strict: bool) -> Self {
        Self {
            lexer: Lexer::new(data),
            stack: ObjectStack::new(strict),
            results: VecDeque::new(),
            strict,
        }
    }

    /// Access the underlying lexer (for line reads and seeks).
    pub fn lexer_mut(&mut self) -> &mut Lexer {
        &mut self.lexer
    }

    /// Move the cursor and discard any half-built state.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        self.lexer.seek(pos)?;
        self.stack = ObjectStack::new(self.strict);
        self.results.clear();
        Ok(())
    }

    /// Read the next token, bypassing object assembly.
    pub fn next_token(&mut self) -> Result<(usize, Token)> {
        self.lexer.next_token()
    }

    /// Assemble and return the next complete object.
    ///
    /// Objects are released by the flushing keywords (`endobj`,
    /// `startxref`, `xref`); at end of input a pending completed object is
    /// returned before `Eof` is reported.
    pub fn next_object(&mut self) -> Result<(usize, Object)> {
        loop {
            if let Some(result) = self.results.pop_front() {
                return Ok(result);
            }
            let (pos, token) = match self.lexer.next_token() {
                Ok(t) => t,
                Err(Error::Eof) => {
                    if !self.stack.in_composite() {
                        if let Some(last) = self.stack.popall().pop() {
                            return Ok(last);
                        }
                    }
                    return Err(Error::Eof);
                },
                Err(e) => return Err(e),
            };
            if let Some((kw_pos, kw)) = self.stack.handle_token(pos, token)? {
                self.do_keyword(kw_pos, &kw)?;
            }
        }
    }

    /// Assemble the next object, releasing each one as soon as it is
    /// structurally complete (no flushing keyword required).
    ///
    /// This is the mode object-stream bodies need: they are bare
    /// concatenations of objects with no `endobj` markers.
    pub fn next_standalone(&mut self) -> Result<(usize, Object)> {
        loop {
            if let Some(result) = self.results.pop_front() {
                return Ok(result);
            }
            let (pos, token) = self.lexer.next_token()?;
            if let Some((kw_pos, kw)) = self.stack.handle_token(pos, token)? {
                self.do_keyword(kw_pos, &kw)?;
            }
            if !self.stack.in_composite() {
                self.results.extend(self.stack.popall());
            }
        }
    }

    fn do_keyword(&mut self, pos: usize, keyword: &str) -> Result<()> {
        match keyword {
            "R" => {
                let mut args = self.stack.pop(2);
                let gen = args.pop().and_then(|(_, o)| o.as_integer());
                let id = args.pop().and_then(|(_, o)| o.as_integer());
                match (id, gen) {
                    (Some(id), Some(gen)) if id > 0 && id <= u32::MAX as i64 => {
                        self.stack
                            .push(pos, Object::Reference(ObjectRef::new(id as u32, gen as u16)));
                    },
                    _ => {
                        let e = Error::Value(format!("invalid reference operands at {}", pos));
                        if self.strict {
                            return Err(e);
                        }
                        log::warn!("{}", e);
                        self.stack.push(pos, Object::Null);
                    },
                }
            },
            "null" => self.stack.push(pos, Object::Null),
            "stream" => self.read_stream(pos)?,
            "endobj" => {
                let objs = self.stack.pop(4);
                self.results.extend(objs);
            },
            "xref" | "startxref" => {
                let objs = self.stack.popall();
                self.results.extend(objs);
            },
            "obj" | "endstream" | "trailer" => {
                log::debug!("structural keyword '{}' at {} ignored", keyword, pos);
            },
            other => {
                log::warn!("unexpected keyword '{}' at offset {}", other, pos);
            },
        }
        Ok(())
    }

    /// Consume a stream body following the `stream` keyword at `kw_pos`.
    ///
    /// The preceding dictionary supplies `Length`. When the byte after the
    /// declared length is not `endstream`, the payload boundary is
    /// recovered by searching for an EOL followed by `endstream`.
    fn read_stream(&mut self, kw_pos: usize) -> Result<()> {
        let dict = match self.stack.pop(1).pop() {
            Some((_, Object::Dictionary(d))) => d,
            Some((pos, other)) => {
                let e = Error::syntax(
                    pos,
                    format!("stream preceded by {} instead of a dictionary", other.type_name()),
                );
                if self.strict {
                    return Err(e);
                }
                log::warn!("{}", e);
                Dict::new()
            },
            None => {
                let e = Error::syntax(kw_pos, "stream with no dictionary");
                if self.strict {
                    return Err(e);
                }
                log::warn!("{}", e);
                Dict::new()
            },
        };
        let length = match dict.get("Length") {
            Some(Object::Integer(n)) if *n >= 0 => *n as usize,
            other => {
                // An indirect /Length cannot be resolved from inside the
                // parser; the endstream search below recovers the boundary.
                log::warn!("stream /Length is {:?}, relying on endstream search", other);
                0
            },
        };
        self.lexer.seek(kw_pos)?;
        let (line_pos, line) = self.lexer.next_line()?;
        let data_start = line_pos + line.len();
        let data = self.lexer.data().clone();
        let mut data_end = data_start + length;

        let window_end = (data_end + b"endstream".len() + 2).min(data.len());
        let looks_right = data_end <= data.len()
            && find_subslice(&data[data_end.min(data.len())..window_end], b"endstream").is_some();
        if !looks_right {
            match ENDSTREAM_RE.find(&data[data_start..]) {
                Some(m) => data_end = data_start + m.start(),
                None => {
                    return Err(Error::Stream(format!(
                        "stream at {} has no endstream",
                        kw_pos
                    )))
                },
            }
        }
        let payload = data.slice(data_start..data_end);
        self.lexer.seek(data_end)?;
        match self.lexer.next_token() {
            Ok((_, Token::Keyword(kw))) if kw == "endstream" => {},
            Ok((pos, other)) => {
                log::warn!("expected endstream at {}, found {:?}", pos, other);
            },
            Err(Error::Eof) => log::warn!("stream at {} runs to end of input", kw_pos),
            Err(e) => return Err(e),
        }
        self.stack
            .push(kw_pos, Object::Stream(Stream::new(dict, payload)));
        Ok(())
    }
}

/// Build a dictionary from an even-length key/value sequence.
///
/// Non-name keys and an odd trailing item are recoverable; entries with
/// Null values are dropped.
pub(crate) fn dict_from_pairs(pos: usize, objs: Vec<Object>, strict: bool) -> Result<Dict> {
    if objs.len() % 2 != 0 {
        let e = Error::syntax(pos, format!("dictionary with {} items", objs.len()));
        if strict {
            return Err(e);
        }
        log::warn!("{}", e);
    }
    let mut dict = Dict::with_capacity(objs.len() / 2);
    let mut iter = objs.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        let name = match key {
            Object::Name(n) => n,
            other => {
                if strict {
                    return Err(Error::TypeMismatch {
                        expected: "Name",
                        found: other.type_name(),
                    });
                }
                log::warn!("dictionary key is {} instead of a name", other.type_name());
                continue;
            },
        };
        if !value.is_null() {
            dict.insert(name, value);
        }
    }
    Ok(dict)
}

/// Find a byte needle inside a haystack.
pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
