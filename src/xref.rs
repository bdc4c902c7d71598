//! Cross-reference tables.
//!
//! The xref machinery maps object ids to byte offsets. Two on-disk forms
//! exist: the classic textual table (`xref` ... `trailer`) and, since PDF
//! 1.5, xref streams (`Type /XRef`) with packed big-endian entries.
//! Sections chain through the trailer's `Prev` and `XRefStm` entries; all
//! sections are collected newest-first and lookups take the first match.
//!
//! When no xref can be located at all, the file is scanned for
//! `N G obj` headers and a synthetic section is built from them.

use std::collections::{HashMap, HashSet};

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::error::{Error, Result};
use crate::lexer::Token;
use crate::object::{Dict, Object};
use crate::parser::PdfParser;

lazy_static! {
    static ref STARTXREF_RE: Regex = Regex::new(r"startxref\s*[\r\n]+\s*(\d+)").unwrap();
    static ref OBJ_HEADER_RE: Regex = Regex::new(r"(?m)^(\d+)\s+(\d+)\s+obj\b").unwrap();
    static ref TRAILER_RE: Regex = Regex::new(r"(?m)^trailer\b").unwrap();
}

/// One cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Object stored uncompressed at a byte offset
    InUse {
        /// Byte offset of the object header
        offset: u64,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object id of the containing object stream
        objstm_id: u32,
        /// Index of the object within the stream
        index: u32,
    },
    /// Free entry
    Free,
}

/// One xref section (classic table or xref stream) plus its trailer.
#[derive(Debug, Default)]
pub struct XrefSection {
    entries: HashMap<u32, XrefEntry>,
    trailer: Dict,
}

impl XrefSection {
    /// The trailer dictionary attached to this section.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Look up an entry. Free entries are reported as such.
    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }

    /// All object ids this section covers.
    pub fn object_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the section is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Unpack a 0-4 byte big-endian integer, with a default for empty input.
pub(crate) fn nunpack(b: &[u8], default: u64) -> Result<u64> {
    match b.len() {
        0 => Ok(default),
        1..=4 => Ok(BigEndian::read_uint(b, b.len())),
        n => Err(Error::Value(format!("invalid field length: {}", n))),
    }
}

/// Locate the `startxref` offset.
///
/// Searches the last 4 KiB first, then the whole file; the last match
/// wins (the file may have been incrementally updated).
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let tail_start = data.len().saturating_sub(4096);
    let m = STARTXREF_RE
        .captures_iter(&data[tail_start..])
        .last()
        .map(|c| c.get(1).unwrap().as_bytes().to_vec())
        .or_else(|| {
            STARTXREF_RE
                .captures_iter(data)
                .last()
                .map(|c| c.get(1).unwrap().as_bytes().to_vec())
        })
        .ok_or_else(|| Error::NoValidXref("no startxref marker".to_string()))?;
    String::from_utf8_lossy(&m)
        .parse()
        .map_err(|_| Error::NoValidXref("unparsable startxref offset".to_string()))
}

/// Read the whole xref chain, falling back to a file scan when no valid
/// xref exists.
pub fn read_xref_chain(data: &Bytes, strict: bool) -> Result<Vec<XrefSection>> {
    let chain = find_startxref(data).and_then(|start| {
        let mut sections = Vec::new();
        let mut visited = HashSet::new();
        read_xref_from(data, start, &mut sections, &mut visited, strict)?;
        Ok(sections)
    });
    match chain {
        Ok(sections) => Ok(sections),
        Err(Error::NoValidXref(reason)) => {
            log::warn!("no valid xref ({}), scanning file for objects", reason);
            let section = load_fallback(data, strict)?;
            Ok(vec![section])
        },
        Err(e) => Err(e),
    }
}

/// Read the xref section at `start` and recurse through `XRefStm`/`Prev`.
fn read_xref_from(
    data: &Bytes,
    start: usize,
    sections: &mut Vec<XrefSection>,
    visited: &mut HashSet<usize>,
    strict: bool,
) -> Result<()> {
    if !visited.insert(start) {
        log::warn!("xref chain loops back to offset {}", start);
        return Ok(());
    }
    let mut parser = PdfParser::new(data.clone(), strict);
    parser
        .seek(start)
        .map_err(|_| Error::NoValidXref(format!("xref offset {} out of range", start)))?;
    let (pos, token) = parser
        .next_token()
        .map_err(|_| Error::NoValidXref("unexpected EOF at xref offset".to_string()))?;

    let section = match token {
        Token::Integer(_) => {
            // An object header here means an xref stream (PDF 1.5+).
            parser.seek(pos)?;
            load_xref_stream(&mut parser, strict)?
        },
        Token::Keyword(ref kw) if kw == "xref" => {
            parser.lexer_mut().next_line()?;
            load_classic_table(&mut parser, strict)?
        },
        other => {
            return Err(Error::NoValidXref(format!(
                "unexpected token {:?} at xref offset {}",
                other, start
            )));
        },
    };

    let xrefstm = section
        .trailer
        .get("XRefStm")
        .and_then(|o| o.as_integer());
    let prev = section.trailer.get("Prev").and_then(|o| o.as_integer());
    sections.push(section);
    if let Some(pos) = xrefstm {
        read_xref_from(data, pos as usize, sections, visited, strict)?;
    }
    if let Some(pos) = prev {
        read_xref_from(data, pos as usize, sections, visited, strict)?;
    }
    Ok(())
}

/// Load a classic textual xref table. The parser is positioned at the
/// first subsection header line.
fn load_classic_table(parser: &mut PdfParser, strict: bool) -> Result<XrefSection> {
    let mut section = XrefSection::default();
    loop {
        let (pos, line) = parser
            .lexer_mut()
            .next_line()
            .map_err(|_| Error::NoValidXref("unexpected EOF in xref table".to_string()))?;
        let text = String::from_utf8_lossy(&line);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("trailer") {
            parser.seek(pos)?;
            break;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(Error::NoValidXref(format!(
                "expected subsection header, got {:?}",
                trimmed
            )));
        }
        let (start, count): (u32, u32) = match (fields[0].parse(), fields[1].parse()) {
            (Ok(s), Ok(c)) => (s, c),
            _ => {
                return Err(Error::NoValidXref(format!(
                    "invalid subsection header {:?}",
                    trimmed
                )))
            },
        };
        for id in start..start.saturating_add(count) {
            let (_, line) = parser
                .lexer_mut()
                .next_line()
                .map_err(|_| Error::NoValidXref("unexpected EOF in xref subsection".to_string()))?;
            let text = String::from_utf8_lossy(&line);
            let fields: Vec<&str> = text.trim().split_whitespace().collect();
            if fields.len() != 3 {
                return Err(Error::NoValidXref(format!("invalid xref entry {:?}", text.trim())));
            }
            match fields[2] {
                "n" => {
                    let offset: u64 = fields[0].parse().unwrap_or(0);
                    let gen: u16 = fields[1].parse().unwrap_or(0);
                    section.entries.insert(id, XrefEntry::InUse { offset, gen });
                },
                "f" => {
                    section.entries.insert(id, XrefEntry::Free);
                },
                other => {
                    let e = Error::NoValidXref(format!("invalid entry type {:?}", other));
                    if strict {
                        return Err(e);
                    }
                    log::warn!("{}", e);
                },
            }
        }
    }
    // Consume the `trailer` keyword, then the dictionary.
    match parser.next_token() {
        Ok((_, Token::Keyword(kw))) if kw == "trailer" => {},
        other => {
            return Err(Error::NoValidXref(format!("trailer not found: {:?}", other)));
        },
    }
    let (_, obj) = parser
        .next_object()
        .map_err(|e| Error::NoValidXref(format!("unreadable trailer: {}", e)))?;
    match obj {
        Object::Dictionary(dict) => section.trailer = dict,
        other => {
            return Err(Error::NoValidXref(format!(
                "trailer is {} instead of a dictionary",
                other.type_name()
            )));
        },
    }
    Ok(section)
}

/// Load an xref stream. The parser is positioned at the object header.
fn load_xref_stream(parser: &mut PdfParser, strict: bool) -> Result<XrefSection> {
    for _ in 0..3 {
        parser
            .next_token()
            .map_err(|_| Error::NoValidXref("truncated xref stream header".to_string()))?;
    }
    let (_, obj) = parser
        .next_object()
        .map_err(|e| Error::NoValidXref(format!("unreadable xref stream: {}", e)))?;
    let stream = match &obj {
        Object::Stream(s) if s.get("Type").and_then(|t| t.as_name()) == Some("XRef") => s,
        _ => return Err(Error::NoValidXref("invalid xref stream object".to_string())),
    };

    let size = stream
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::NoValidXref("xref stream without Size".to_string()))?;
    let widths: Vec<usize> = stream
        .get("W")
        .and_then(|o| o.as_array())
        .map(|arr| arr.iter().map(|o| o.as_integer().unwrap_or(0) as usize).collect())
        .ok_or_else(|| Error::NoValidXref("xref stream without W".to_string()))?;
    if widths.len() != 3 {
        return Err(Error::NoValidXref(format!("W has {} fields", widths.len())));
    }
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let entry_len = w1 + w2 + w3;
    if entry_len == 0 {
        return Err(Error::NoValidXref("zero-width xref entries".to_string()));
    }

    let index: Vec<i64> = match stream.get("Index").and_then(|o| o.as_array()) {
        Some(arr) => arr.iter().map(|o| o.as_integer().unwrap_or(0)).collect(),
        None => vec![0, size],
    };
    if index.len() % 2 != 0 {
        return Err(Error::NoValidXref("odd Index array".to_string()));
    }

    let data = stream
        .decoded_data(strict)
        .map_err(|e| Error::NoValidXref(format!("undecodable xref stream: {}", e)))?;

    let mut section = XrefSection::default();
    section.trailer = stream.dict.clone();
    let mut offset = 0usize;
    for range in index.chunks(2) {
        let (start, count) = (range[0] as u32, range[1].max(0) as u32);
        for i in 0..count {
            let begin = offset + (i as usize) * entry_len;
            if begin + entry_len > data.len() {
                log::warn!("xref stream data too short at entry {}", start + i);
                break;
            }
            let ent = &data[begin..begin + entry_len];
            // A missing first field defaults to "in use".
            let f1 = nunpack(&ent[..w1], 1)?;
            let f2 = nunpack(&ent[w1..w1 + w2], 0)?;
            let f3 = nunpack(&ent[w1 + w2..], 0)?;
            let entry = match f1 {
                0 => XrefEntry::Free,
                1 => XrefEntry::InUse {
                    offset: f2,
                    gen: f3 as u16,
                },
                2 => XrefEntry::Compressed {
                    objstm_id: f2 as u32,
                    index: f3 as u32,
                },
                other => {
                    log::warn!("unknown xref entry type {}", other);
                    continue;
                },
            };
            section.entries.insert(start + i, entry);
        }
        offset += (count as usize) * entry_len;
    }
    Ok(section)
}

/// Synthesize an xref by scanning the whole file for `N G obj` headers.
///
/// The first `trailer` found supplies the trailer dictionary (and thereby
/// the catalog); a file with neither xref nor trailer cannot be opened.
pub fn load_fallback(data: &Bytes, strict: bool) -> Result<XrefSection> {
    let mut section = XrefSection::default();
    for caps in OBJ_HEADER_RE.captures_iter(data) {
        let whole = caps.get(0).unwrap();
        let id: u32 = match String::from_utf8_lossy(caps.get(1).unwrap().as_bytes()).parse() {
            Ok(id) => id,
            Err(_) => continue,
        };
        section.entries.insert(
            id,
            XrefEntry::InUse {
                offset: whole.start() as u64,
                gen: 0,
            },
        );
    }
    if section.entries.is_empty() {
        return Err(Error::NoValidXref("no objects found in file scan".to_string()));
    }
    if let Some(m) = TRAILER_RE.find(data) {
        let mut parser = PdfParser::new(data.clone(), strict);
        parser.seek(m.start())?;
        if let Ok((_, Token::Keyword(kw))) = parser.next_token() {
            if kw == "trailer" {
                if let Ok((_, Object::Dictionary(dict))) = parser.next_object() {
                    section.trailer = dict;
                }
            }
        }
    }
    Ok(section)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSIC: &[u8] = b"xref\n0 3\n0000000000 65535 f \n0000000017 00000 n \n0000000081 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n0\n%%EOF";

    #[test]
    fn test_nunpack() {
        assert_eq!(nunpack(b"", 7).unwrap(), 7);
        assert_eq!(nunpack(b"\x05", 0).unwrap(), 5);
        assert_eq!(nunpack(b"\x01\x02", 0).unwrap(), 0x0102);
        assert_eq!(nunpack(b"\x01\x02\x03", 0).unwrap(), 0x010203);
        assert_eq!(nunpack(b"\x01\x02\x03\x04", 0).unwrap(), 0x01020304);
        assert!(nunpack(b"\x01\x02\x03\x04\x05", 0).is_err());
    }

    #[test]
    fn test_find_startxref() {
        let data = b"%PDF-1.4 junk startxref\n12345\n%%EOF";
        assert_eq!(find_startxref(data).unwrap(), 12345);
    }

    #[test]
    fn test_find_startxref_last_wins() {
        let data = b"startxref\n100\n%%EOF\nstartxref\n200\n%%EOF";
        assert_eq!(find_startxref(data).unwrap(), 200);
    }

    #[test]
    fn test_find_startxref_missing() {
        assert!(matches!(
            find_startxref(b"no marker here"),
            Err(Error::NoValidXref(_))
        ));
    }

    #[test]
    fn test_classic_table() {
        let data = Bytes::from_static(CLASSIC);
        let mut parser = PdfParser::new(data, false);
        // Skip the `xref` keyword line the chain reader consumes.
        parser.lexer_mut().next_line().unwrap();
        let section = load_classic_table(&mut parser, false).unwrap();
        assert_eq!(section.get(0), Some(&XrefEntry::Free));
        assert_eq!(section.get(1), Some(&XrefEntry::InUse { offset: 17, gen: 0 }));
        assert_eq!(section.get(2), Some(&XrefEntry::InUse { offset: 81, gen: 0 }));
        assert_eq!(section.trailer().get("Size").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn test_xref_stream_entries() {
        // W = [1 2 1]; three entries: free, in-use @ 0x0102 gen 0,
        // compressed in stream 5 index 2.
        let payload = b"\x00\x00\x00\x00\x01\x01\x02\x00\x02\x00\x05\x02";
        let mut body = Vec::new();
        body.extend_from_slice(b"7 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Length 12 >>\nstream\n");
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\nendstream\nendobj\n");
        let mut parser = PdfParser::new(Bytes::from(body), false);
        let section = load_xref_stream(&mut parser, false).unwrap();
        assert_eq!(section.get(0), Some(&XrefEntry::Free));
        assert_eq!(
            section.get(1),
            Some(&XrefEntry::InUse { offset: 0x0102, gen: 0 })
        );
        assert_eq!(
            section.get(2),
            Some(&XrefEntry::Compressed { objstm_id: 5, index: 2 })
        );
    }

    #[test]
    fn test_fallback_scan() {
        let data = Bytes::from_static(
            b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n2 0 obj\n42\nendobj\ntrailer\n<< /Root 1 0 R >>\n",
        );
        let section = load_fallback(&data, false).unwrap();
        assert_eq!(section.get(1), Some(&XrefEntry::InUse { offset: 9, gen: 0 }));
        assert!(section.get(2).is_some());
        assert!(section.trailer().get("Root").is_some());
    }

    #[test]
    fn test_fallback_no_objects() {
        let data = Bytes::from_static(b"not a pdf at all");
        assert!(matches!(load_fallback(&data, false), Err(Error::NoValidXref(_))));
    }

    #[test]
    fn test_chain_via_startxref() {
        let data = Bytes::from_static(CLASSIC);
        let sections = read_xref_chain(&data, false).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].len(), 3);
    }
}
