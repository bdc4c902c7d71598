//! The document model.
//!
//! A [`Document`] owns the whole file bytes, the xref chain, the
//! indirect-object cache and the decryption state. Everything else in the
//! engine reaches objects through [`Document::get_object`] /
//! [`Document::resolve`], which is how cyclic structures (page parents,
//! outline siblings) stay representable: edges are object ids, not owned
//! pointers.
//!
//! Recovery ladder for corrupt files: a broken xref chain falls back to a
//! whole-file header scan at load time; a failed object lookup triggers a
//! one-shot whole-file re-parse that also expands every object stream it
//! encounters.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use bytes::Bytes;

use crate::encryption::{Permissions, StandardSecurityHandler};
use crate::error::{Error, Result};
use crate::lexer::Token;
use crate::object::{Dict, Object, Stream};
use crate::parser::PdfParser;
use crate::xref::{read_xref_chain, XrefEntry, XrefSection};

/// Attributes a page inherits from its ancestors in the page tree.
const INHERITABLE_ATTRS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// A PDF document.
pub struct Document {
    data: Bytes,
    strict: bool,
    xrefs: Vec<XrefSection>,
    catalog: Dict,
    info: Vec<Dict>,
    security: Option<StandardSecurityHandler>,
    cache: RefCell<HashMap<u32, Object>>,
    objstm_cache: RefCell<HashMap<u32, Rc<Vec<Object>>>>,
    parsed_everything: Cell<bool>,
}

impl Document {
    /// Open a document from its file bytes with an empty password.
    pub fn new(data: impl Into<Bytes>) -> Result<Document> {
        Document::with_password(data, "")
    }

    /// Open a document, supplying the user password.
    pub fn with_password(data: impl Into<Bytes>, password: &str) -> Result<Document> {
        Document::with_options(data, password, false)
    }

    /// Open a document with full control over strictness.
    ///
    /// Initialization is mandatory even for unencrypted files: it locates
    /// the xref chain, the trailer and the catalog, and derives the
    /// decryption key when an `Encrypt` dictionary is present. Password
    /// failure and a completely missing xref are fatal; no partial
    /// document is returned.
    pub fn with_options(data: impl Into<Bytes>, password: &str, strict: bool) -> Result<Document> {
        let data = data.into();
        let xrefs = read_xref_chain(&data, strict)?;
        let mut doc = Document {
            data,
            strict,
            xrefs,
            catalog: Dict::new(),
            info: Vec::new(),
            security: None,
            cache: RefCell::new(HashMap::new()),
            objstm_cache: RefCell::new(HashMap::new()),
            parsed_everything: Cell::new(false),
        };

        let mut root: Option<Object> = None;
        let mut encrypt: Option<(Object, Vec<u8>)> = None;
        for i in 0..doc.xrefs.len() {
            let trailer = doc.xrefs[i].trailer();
            if trailer.is_empty() {
                continue;
            }
            if let Some(enc) = trailer.get("Encrypt") {
                let doc_id = trailer
                    .get("ID")
                    .and_then(|o| o.as_array())
                    .and_then(|a| a.first())
                    .and_then(|o| o.as_string())
                    .map(|s| s.to_vec())
                    .unwrap_or_else(|| {
                        log::warn!("encrypted document without /ID");
                        Vec::new()
                    });
                encrypt.get_or_insert((enc.clone(), doc_id));
            }
            if let Some(info) = trailer.get("Info") {
                let info = doc.resolve(info);
                if let Some(dict) = info.as_dict() {
                    doc.info.push(dict.clone());
                }
            }
            if let Some(r) = trailer.get("Root") {
                root = Some(r.clone());
                break;
            }
        }

        if let Some((enc, doc_id)) = encrypt {
            let enc = doc.resolve(&enc);
            let enc_dict = enc.expect_dict()?;
            doc.security = Some(StandardSecurityHandler::new(enc_dict, &doc_id, password)?);
        }

        let root = root.ok_or_else(|| {
            Error::NoValidXref("no /Root object - is this really a PDF?".to_string())
        })?;
        let catalog = doc.resolve(&root);
        match catalog.as_dict() {
            Some(dict) => {
                if dict.get("Type").and_then(|o| o.as_name()) != Some("Catalog") {
                    let e = Error::syntax(0, "catalog not found");
                    if strict {
                        return Err(e);
                    }
                    log::warn!("{}", e);
                }
                doc.catalog = dict.clone();
            },
            None => {
                return Err(Error::TypeMismatch {
                    expected: "Dictionary",
                    found: catalog.type_name(),
                })
            },
        }
        Ok(doc)
    }

    /// The raw file bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The catalog dictionary.
    pub fn catalog(&self) -> &Dict {
        &self.catalog
    }

    /// Document information dictionaries collected from the trailer chain.
    pub fn info(&self) -> &[Dict] {
        &self.info
    }

    /// Whether the document grants the given permission (unencrypted
    /// documents grant everything).
    pub fn is_allowed(&self, perm: Permissions) -> bool {
        match &self.security {
            Some(handler) => handler.permissions().contains(perm),
            None => true,
        }
    }

    /// Whether text extraction is permitted.
    pub fn is_extractable(&self) -> bool {
        self.is_allowed(Permissions::EXTRACT)
    }

    /// Resolve indirect references until a direct object remains.
    pub fn resolve(&self, obj: &Object) -> Object {
        let mut current = obj.clone();
        for _ in 0..32 {
            match current {
                Object::Reference(r) => current = self.get_object(r.id),
                other => return other,
            }
        }
        log::warn!("reference chain too deep, returning Null");
        Object::Null
    }

    /// Fetch an object by id.
    ///
    /// Results are cached; re-resolution always returns an object equal to
    /// the first resolution. On a broken xref entry the whole file is
    /// re-parsed once; afterwards unresolvable ids return Null.
    pub fn get_object(&self, id: u32) -> Object {
        if id == 0 {
            log::warn!("object id 0 is invalid");
            return Object::Null;
        }
        if let Some(obj) = self.cache.borrow().get(&id) {
            return obj.clone();
        }
        match self.load_object(id) {
            Ok(obj) => {
                self.cache.borrow_mut().insert(id, obj.clone());
                obj
            },
            Err(e) => {
                log::warn!("cannot load object {}: {}", id, e);
                if self.parse_everything().is_ok() {
                    if let Some(obj) = self.cache.borrow().get(&id) {
                        return obj.clone();
                    }
                }
                Object::Null
            },
        }
    }

    fn find_entry(&self, id: u32) -> Option<XrefEntry> {
        for section in &self.xrefs {
            match section.get(id) {
                Some(XrefEntry::Free) | None => continue,
                Some(entry) => return Some(*entry),
            }
        }
        None
    }

    fn load_object(&self, id: u32) -> Result<Object> {
        let entry = self
            .find_entry(id)
            .ok_or(Error::ObjectNotFound(id, 0))?;
        match entry {
            XrefEntry::InUse { offset, gen } => {
                let (obj, gen) = self.read_object_at(offset as usize, id, gen)?;
                Ok(self.decipher_all(id, gen, obj))
            },
            XrefEntry::Compressed { objstm_id, index } => {
                // Members of object streams are never encrypted; the
                // containing stream already was.
                self.read_compressed_object(id, objstm_id, index)
            },
            XrefEntry::Free => Err(Error::ObjectNotFound(id, 0)),
        }
    }

    /// Read an `id gen obj ... endobj` block at a byte offset.
    ///
    /// Mildly corrupt headers are tolerated: when the object number at the
    /// offset does not match, the parser scans forward for the next `obj`
    /// keyword.
    fn read_object_at(&self, offset: usize, expected_id: u32, gen: u16) -> Result<(Object, u16)> {
        let mut parser = PdfParser::new(self.data.clone(), self.strict);
        parser.seek(offset)?;
        let (_, tok_id) = parser.next_token()?;
        let (_, tok_gen) = parser.next_token()?;
        let (_, tok_kwd) = parser.next_token()?;
        let mut gen = gen;
        let mut matches = false;
        if let (Token::Integer(found_id), Token::Integer(found_gen), Token::Keyword(kwd)) =
            (&tok_id, &tok_gen, &tok_kwd)
        {
            if kwd == "obj" {
                matches = *found_id as u32 == expected_id;
                gen = *found_gen as u16;
            }
        }
        if !matches {
            // Corrupt header; hunt for the next `obj` keyword and take the
            // two integers before it as the actual id and generation.
            log::warn!(
                "object header at {} does not match id {}, scanning for 'obj'",
                offset,
                expected_id
            );
            let mut trailing: Vec<Token> = vec![tok_id, tok_gen, tok_kwd];
            loop {
                if let Some(Token::Keyword(kwd)) = trailing.last() {
                    if kwd == "obj" {
                        break;
                    }
                }
                let (_, tok) = parser
                    .next_token()
                    .map_err(|_| Error::ObjectNotFound(expected_id, 0))?;
                trailing.push(tok);
            }
            if trailing.len() >= 3 {
                if let Token::Integer(g) = &trailing[trailing.len() - 2] {
                    gen = *g as u16;
                }
            }
        }
        let (_, mut obj) = parser.next_object()?;
        if let Object::Stream(stream) = &mut obj {
            stream.obj_id = Some((expected_id, gen));
        }
        Ok((obj, gen))
    }

    /// Fetch a member of an object stream (`Type /ObjStm`).
    fn read_compressed_object(&self, id: u32, objstm_id: u32, index: u32) -> Result<Object> {
        let members = self.objstm_members(objstm_id)?;
        let n = members.0;
        let objs = &members.1;
        // The stream body starts with n (objid, offset) integer pairs;
        // member i is the i-th object after them.
        let i = 2 * n + index as usize;
        let obj = objs
            .get(i)
            .cloned()
            .ok_or_else(|| Error::Value(format!("object stream index {} out of range", index)))?;
        // Sanity-check the declared object id when available.
        if let Some(Object::Integer(declared)) = objs.get(2 * index as usize) {
            if *declared as u32 != id {
                log::warn!(
                    "object stream {} declares id {} at index {}, expected {}",
                    objstm_id,
                    declared,
                    index,
                    id
                );
            }
        }
        Ok(obj)
    }

    fn objstm_members(&self, objstm_id: u32) -> Result<(usize, Rc<Vec<Object>>)> {
        let container = self.get_object(objstm_id);
        let stream = container.expect_stream()?;
        if stream.get("Type").and_then(|o| o.as_name()) != Some("ObjStm") {
            let e = Error::syntax(0, format!("object {} is not an object stream", objstm_id));
            if self.strict {
                return Err(e);
            }
            log::warn!("{}", e);
        }
        let n = self
            .resolve(stream.get("N").unwrap_or(&Object::Null))
            .as_integer()
            .unwrap_or_else(|| {
                log::warn!("object stream {} has no N", objstm_id);
                0
            }) as usize;
        if let Some(cached) = self.objstm_cache.borrow().get(&objstm_id) {
            return Ok((n, cached.clone()));
        }
        let data = stream.decoded_data(self.strict)?;
        let mut parser = PdfParser::new(data, self.strict);
        let mut objs = Vec::new();
        loop {
            match parser.next_standalone() {
                Ok((_, obj)) => objs.push(obj),
                Err(Error::Eof) => break,
                Err(e) => {
                    log::warn!("object stream {} parse error: {}", objstm_id, e);
                    break;
                },
            }
        }
        let objs = Rc::new(objs);
        self.objstm_cache
            .borrow_mut()
            .insert(objstm_id, objs.clone());
        Ok((n, objs))
    }

    /// One-shot whole-file re-parse.
    ///
    /// Reads every `id gen obj ... endobj` block sequentially, priming the
    /// cache, and expands every object stream found along the way. Used
    /// when the xref tables are corrupt or wrong.
    fn parse_everything(&self) -> Result<()> {
        if self.parsed_everything.get() {
            return Err(Error::Value("file already re-parsed".to_string()));
        }
        self.parsed_everything.set(true);
        log::warn!("re-parsing the whole file to recover objects");
        let mut parser = PdfParser::new(self.data.clone(), false);
        loop {
            let mut header: Vec<Token> = Vec::new();
            loop {
                match parser.next_token() {
                    Ok((_, tok)) => {
                        if matches!(&tok, Token::Keyword(kwd) if kwd == "obj") {
                            break;
                        }
                        header.push(tok);
                    },
                    Err(Error::Eof) => return Ok(()),
                    Err(e) => return Err(e),
                }
            }
            let (id, gen) = match header.as_slice() {
                [.., Token::Integer(id), Token::Integer(gen)] => (*id as u32, *gen as u16),
                _ => continue,
            };
            let obj = match parser.next_object() {
                Ok((_, obj)) => obj,
                Err(Error::Eof) => return Ok(()),
                Err(e) => {
                    log::warn!("skipping unreadable object {}: {}", id, e);
                    continue;
                },
            };
            let mut obj = self.decipher_all(id, gen, obj);
            let mut is_objstm = false;
            if let Object::Stream(stream) = &mut obj {
                stream.obj_id = Some((id, gen));
                is_objstm = stream.get("Type").and_then(|o| o.as_name()) == Some("ObjStm");
            }
            self.cache.borrow_mut().insert(id, obj.clone());
            if is_objstm {
                if let Err(e) = self.expand_objstm_into_cache(id) {
                    log::warn!("cannot expand object stream {}: {}", id, e);
                }
            }
        }
    }

    fn expand_objstm_into_cache(&self, objstm_id: u32) -> Result<()> {
        let (n, objs) = self.objstm_members(objstm_id)?;
        for i in 0..n {
            let Some(Object::Integer(member_id)) = objs.get(2 * i) else {
                continue;
            };
            if let Some(obj) = objs.get(2 * n + i) {
                self.cache
                    .borrow_mut()
                    .entry(*member_id as u32)
                    .or_insert_with(|| obj.clone());
            }
        }
        Ok(())
    }

    /// Recursively decrypt every byte-typed leaf of an object.
    fn decipher_all(&self, id: u32, gen: u16, obj: Object) -> Object {
        let Some(handler) = &self.security else {
            return obj;
        };
        decipher_object(handler, id, gen, obj)
    }

    /// The effective xref entries, newest section first with
    /// first-match-wins deduplication.
    pub fn xref_entries(&self) -> impl Iterator<Item = (u32, XrefEntry)> + '_ {
        let mut seen = HashSet::new();
        self.xrefs.iter().flat_map(move |section| {
            let mut out = Vec::new();
            for id in section.object_ids() {
                if seen.insert(id) {
                    if let Some(entry) = section.get(id) {
                        out.push((id, *entry));
                    }
                }
            }
            out
        })
    }

    // ------------------------------------------------------------------
    // Page tree
    // ------------------------------------------------------------------

    /// Iterate the pages in catalog (document) order.
    ///
    /// Inheritance of Resources/MediaBox/CropBox/Rotate is resolved before
    /// each page is yielded. The iterator is not restartable; call again
    /// for a fresh pass.
    pub fn pages(&self) -> Pages<'_> {
        let mut stack = Vec::new();
        if let Some(pages_root) = self.catalog.get("Pages") {
            stack.push((pages_root.clone(), self.catalog.clone()));
        }
        Pages {
            doc: self,
            stack,
            visited: HashSet::new(),
        }
    }

    /// Iterate the outline (bookmark) tree depth-first.
    pub fn outlines(&self) -> Result<Outlines<'_>> {
        let root = self
            .catalog
            .get("Outlines")
            .ok_or_else(|| Error::Value("document has no outlines".to_string()))?;
        let root = self.resolve(root);
        let mut stack = Vec::new();
        if let Some(dict) = root.as_dict() {
            if let Some(first) = dict.get("First") {
                stack.push((first.clone(), 1));
            }
        }
        Ok(Outlines {
            doc: self,
            stack,
            visited: HashSet::new(),
        })
    }

    /// Look up a named destination.
    ///
    /// PDF 1.2+ documents use the `/Names/Dests` name tree; PDF 1.1 used a
    /// plain `/Dests` dictionary in the catalog.
    pub fn get_dest(&self, name: &[u8]) -> Result<Object> {
        if let Some(names) = self.catalog.get("Names") {
            let names = self.resolve(names);
            if let Some(dests) = names.as_dict().and_then(|d| d.get("Dests")) {
                let tree_root = self.resolve(dests);
                if let Some(found) = self.lookup_name_tree(&tree_root, name, 0) {
                    return Ok(found);
                }
            }
        }
        if let Some(dests) = self.catalog.get("Dests") {
            let dests = self.resolve(dests);
            if let Some(dict) = dests.as_dict() {
                let key: String = name.iter().map(|&b| b as char).collect();
                if let Some(found) = dict.get(&key) {
                    return Ok(found.clone());
                }
            }
        }
        Err(Error::Value(format!(
            "destination {:?} not found",
            String::from_utf8_lossy(name)
        )))
    }

    fn lookup_name_tree(&self, node: &Object, key: &[u8], depth: usize) -> Option<Object> {
        if depth > 64 {
            log::warn!("name tree too deep");
            return None;
        }
        let dict = node.as_dict()?;
        if let Some(limits) = dict.get("Limits").map(|o| self.resolve(o)) {
            if let Some(arr) = limits.as_array() {
                if arr.len() >= 2 {
                    let k1 = arr[0].as_string().unwrap_or(b"");
                    let k2 = arr[1].as_string().unwrap_or(b"");
                    if key < k1 || k2 < key {
                        return None;
                    }
                }
            }
        }
        if let Some(names) = dict.get("Names").map(|o| self.resolve(o)) {
            if let Some(arr) = names.as_array() {
                for pair in arr.chunks(2) {
                    if pair.len() == 2 && pair[0].as_string() == Some(key) {
                        return Some(pair[1].clone());
                    }
                }
            }
        }
        if let Some(kids) = dict.get("Kids").map(|o| self.resolve(o)) {
            if let Some(arr) = kids.as_array() {
                for kid in arr {
                    let kid = self.resolve(kid);
                    if let Some(found) = self.lookup_name_tree(&kid, key, depth + 1) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }
}

fn decipher_object(
    handler: &StandardSecurityHandler,
    id: u32,
    gen: u16,
    obj: Object,
) -> Object {
    match obj {
        Object::String(bytes) => Object::String(handler.decrypt(id, gen, &bytes)),
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|o| decipher_object(handler, id, gen, o))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(
            dict.into_iter()
                .map(|(k, v)| (k, decipher_object(handler, id, gen, v)))
                .collect(),
        ),
        Object::Stream(mut stream) => {
            let plain = handler.decrypt(id, gen, &stream.raw);
            stream.set_raw(plain);
            stream.dict = std::mem::take(&mut stream.dict)
                .into_iter()
                .map(|(k, v)| (k, decipher_object(handler, id, gen, v)))
                .collect();
            Object::Stream(stream)
        },
        other => other,
    }
}

// ----------------------------------------------------------------------
// Pages
// ----------------------------------------------------------------------

/// One page of a document, with inherited attributes resolved.
#[derive(Debug, Clone)]
pub struct Page {
    /// Object id of the page (0 when the page was an inline dictionary)
    pub id: u32,
    /// The merged page attribute dictionary
    pub attrs: Dict,
    /// Resources in effect on this page
    pub resources: Dict,
    /// Physical page bounds
    pub mediabox: (f32, f32, f32, f32),
    /// Crop rectangle (defaults to the mediabox)
    pub cropbox: (f32, f32, f32, f32),
    /// Page rotation, normalized to {0, 90, 180, 270}
    pub rotate: i32,
    /// The raw `Annots` entry, if any
    pub annots: Option<Object>,
    /// The raw article-bead entry (`B`), if any
    pub beads: Option<Object>,
    /// The page's content streams in order
    pub contents: Vec<Stream>,
}

impl Page {
    fn new(doc: &Document, id: u32, attrs: Dict) -> Page {
        let resources = attrs
            .get("Resources")
            .map(|o| doc.resolve(o))
            .as_ref()
            .and_then(|o| o.as_dict().cloned())
            .unwrap_or_else(|| {
                log::warn!("page {} has no Resources", id);
                Dict::new()
            });
        let mediabox = attrs
            .get("MediaBox")
            .map(|o| doc.resolve(o))
            .as_ref()
            .and_then(rect_of)
            .unwrap_or_else(|| {
                log::warn!("page {} has no MediaBox, assuming letter size", id);
                (0.0, 0.0, 612.0, 792.0)
            });
        let cropbox = attrs
            .get("CropBox")
            .map(|o| doc.resolve(o))
            .as_ref()
            .and_then(rect_of)
            .unwrap_or(mediabox);
        let rotate_raw = attrs
            .get("Rotate")
            .map(|o| doc.resolve(o))
            .and_then(|o| o.as_integer())
            .unwrap_or(0);
        let rotate = (rotate_raw.rem_euclid(360)) as i32;
        let rotate = if rotate % 90 == 0 {
            rotate
        } else {
            log::warn!("page {} has non-right-angle rotation {}", id, rotate);
            0
        };

        let mut contents = Vec::new();
        if let Some(c) = attrs.get("Contents") {
            let c = doc.resolve(c);
            match c {
                Object::Stream(s) => contents.push(s),
                Object::Array(items) => {
                    for item in items {
                        match doc.resolve(&item) {
                            Object::Stream(s) => contents.push(s),
                            other => {
                                log::warn!("page content is {}", other.type_name());
                            },
                        }
                    }
                },
                other => log::warn!("page Contents is {}", other.type_name()),
            }
        }

        Page {
            id,
            annots: attrs.get("Annots").cloned(),
            beads: attrs.get("B").cloned(),
            resources,
            mediabox,
            cropbox,
            rotate,
            contents,
            attrs,
        }
    }
}

fn rect_of(obj: &Object) -> Option<(f32, f32, f32, f32)> {
    let arr = obj.as_array()?;
    if arr.len() < 4 {
        return None;
    }
    let mut it = arr.iter().map(|o| o.as_number().unwrap_or(0.0) as f32);
    Some((it.next()?, it.next()?, it.next()?, it.next()?))
}

/// Depth-first page iterator.
pub struct Pages<'a> {
    doc: &'a Document,
    stack: Vec<(Object, Dict)>,
    visited: HashSet<u32>,
}

impl<'a> Iterator for Pages<'a> {
    type Item = Page;

    fn next(&mut self) -> Option<Page> {
        while let Some((node, parent)) = self.stack.pop() {
            let id = node.as_reference().map(|r| r.id).unwrap_or(0);
            if id != 0 && !self.visited.insert(id) {
                log::warn!("page tree loops through object {}", id);
                continue;
            }
            let resolved = self.doc.resolve(&node);
            let Some(dict) = resolved.as_dict() else {
                log::warn!("page tree node is {}", resolved.type_name());
                continue;
            };
            let mut tree = dict.clone();
            for key in INHERITABLE_ATTRS {
                if !tree.contains_key(key) {
                    if let Some(v) = parent.get(key) {
                        tree.insert(key.to_string(), v.clone());
                    }
                }
            }
            match tree.get("Type").and_then(|o| o.as_name()) {
                Some("Pages") => {
                    if let Some(kids) = tree.get("Kids").map(|o| self.doc.resolve(o)) {
                        if let Some(arr) = kids.as_array() {
                            for kid in arr.iter().rev() {
                                self.stack.push((kid.clone(), tree.clone()));
                            }
                        }
                    }
                },
                Some("Page") => return Some(Page::new(self.doc, id, tree)),
                other => {
                    log::warn!("page tree node with Type {:?}", other);
                },
            }
        }
        None
    }
}

// ----------------------------------------------------------------------
// Outlines
// ----------------------------------------------------------------------

/// One outline (bookmark) entry.
#[derive(Debug, Clone)]
pub struct OutlineItem {
    /// Nesting level, starting at 1
    pub level: usize,
    /// Decoded title text
    pub title: String,
    /// The `Dest` entry, if any
    pub dest: Option<Object>,
    /// The `A` (action) entry, if any
    pub action: Option<Object>,
    /// The `SE` (structure element) entry, if any
    pub struct_element: Option<Object>,
}

/// Depth-first outline iterator over the First/Next sibling pointers.
pub struct Outlines<'a> {
    doc: &'a Document,
    stack: Vec<(Object, usize)>,
    visited: HashSet<u32>,
}

impl<'a> Iterator for Outlines<'a> {
    type Item = OutlineItem;

    fn next(&mut self) -> Option<OutlineItem> {
        while let Some((node, level)) = self.stack.pop() {
            if let Some(r) = node.as_reference() {
                if !self.visited.insert(r.id) {
                    log::warn!("outline tree loops through object {}", r.id);
                    continue;
                }
            }
            let resolved = self.doc.resolve(&node);
            let Some(dict) = resolved.as_dict() else {
                continue;
            };
            // Visit the sibling after this subtree: push Next first.
            if let Some(next) = dict.get("Next") {
                self.stack.push((next.clone(), level));
            }
            if let Some(first) = dict.get("First") {
                self.stack.push((first.clone(), level + 1));
            }
            if let Some(title) = dict.get("Title") {
                let has_target = dict.contains_key("A") || dict.contains_key("Dest");
                if has_target {
                    let raw = self.doc.resolve(title);
                    let title = decode_pdf_text(raw.as_string().unwrap_or(b""));
                    return Some(OutlineItem {
                        level,
                        title,
                        dest: dict.get("Dest").cloned(),
                        action: dict.get("A").cloned(),
                        struct_element: dict.get("SE").cloned(),
                    });
                }
            }
        }
        None
    }
}

/// Decode a PDF text string: UTF-16BE when BOM-prefixed, PDFDocEncoding
/// otherwise.
pub fn decode_pdf_text(bytes: &[u8]) -> String {
    if bytes.starts_with(b"\xfe\xff") {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| u16::from(c[0]) << 8 | u16::from(c[1]))
            .collect();
        char::decode_utf16(units.into_iter())
            .filter_map(|r| r.ok())
            .collect()
    } else {
        bytes
            .iter()
            .map(|&b| PDF_DOC_ENCODING[b as usize])
            .filter(|&c| c != '\0')
            .collect()
    }
}

/// PDFDocEncoding, the 8-bit encoding used for text strings outside
/// content streams.
#[rustfmt::skip]
const PDF_DOC_ENCODING: [char; 256] = [
    '\u{0000}','\u{0001}','\u{0002}','\u{0003}','\u{0004}','\u{0005}','\u{0006}','\u{0007}',
    '\u{0008}','\u{0009}','\u{000a}','\u{000b}','\u{000c}','\u{000d}','\u{000e}','\u{000f}',
    '\u{0010}','\u{0011}','\u{0012}','\u{0013}','\u{0014}','\u{0015}','\u{0017}','\u{0017}',
    '\u{02d8}','\u{02c7}','\u{02c6}','\u{02d9}','\u{02dd}','\u{02db}','\u{02da}','\u{02dc}',
    '\u{0020}','\u{0021}','\u{0022}','\u{0023}','\u{0024}','\u{0025}','\u{0026}','\u{0027}',
    '\u{0028}','\u{0029}','\u{002a}','\u{002b}','\u{002c}','\u{002d}','\u{002e}','\u{002f}',
    '\u{0030}','\u{0031}','\u{0032}','\u{0033}','\u{0034}','\u{0035}','\u{0036}','\u{0037}',
    '\u{0038}','\u{0039}','\u{003a}','\u{003b}','\u{003c}','\u{003d}','\u{003e}','\u{003f}',
    '\u{0040}','\u{0041}','\u{0042}','\u{0043}','\u{0044}','\u{0045}','\u{0046}','\u{0047}',
    '\u{0048}','\u{0049}','\u{004a}','\u{004b}','\u{004c}','\u{004d}','\u{004e}','\u{004f}',
    '\u{0050}','\u{0051}','\u{0052}','\u{0053}','\u{0054}','\u{0055}','\u{0056}','\u{0057}',
    '\u{0058}','\u{0059}','\u{005a}','\u{005b}','\u{005c}','\u{005d}','\u{005e}','\u{005f}',
    '\u{0060}','\u{0061}','\u{0062}','\u{0063}','\u{0064}','\u{0065}','\u{0066}','\u{0067}',
    '\u{0068}','\u{0069}','\u{006a}','\u{006b}','\u{006c}','\u{006d}','\u{006e}','\u{006f}',
    '\u{0070}','\u{0071}','\u{0072}','\u{0073}','\u{0074}','\u{0075}','\u{0076}','\u{0077}',
    '\u{0078}','\u{0079}','\u{007a}','\u{007b}','\u{007c}','\u{007d}','\u{007e}','\u{0000}',
    '\u{2022}','\u{2020}','\u{2021}','\u{2026}','\u{2014}','\u{2013}','\u{0192}','\u{2044}',
    '\u{2039}','\u{203a}','\u{2212}','\u{2030}','\u{201e}','\u{201c}','\u{201d}','\u{2018}',
    '\u{2019}','\u{201a}','\u{2122}','\u{fb01}','\u{fb02}','\u{0141}','\u{0152}','\u{0160}',
    '\u{0178}','\u{017d}','\u{0131}','\u{0142}','\u{0153}','\u{0161}','\u{017e}','\u{0000}',
    '\u{20ac}','\u{00a1}','\u{00a2}','\u{00a3}','\u{00a4}','\u{00a5}','\u{00a6}','\u{00a7}',
    '\u{00a8}','\u{00a9}','\u{00aa}','\u{00ab}','\u{00ac}','\u{0000}','\u{00ae}','\u{00af}',
    '\u{00b0}','\u{00b1}','\u{00b2}','\u{00b3}','\u{00b4}','\u{00b5}','\u{00b6}','\u{00b7}',
    '\u{00b8}','\u{00b9}','\u{00ba}','\u{00bb}','\u{00bc}','\u{00bd}','\u{00be}','\u{00bf}',
    '\u{00c0}','\u{00c1}','\u{00c2}','\u{00c3}','\u{00c4}','\u{00c5}','\u{00c6}','\u{00c7}',
    '\u{00c8}','\u{00c9}','\u{00ca}','\u{00cb}','\u{00cc}','\u{00cd}','\u{00ce}','\u{00cf}',
    '\u{00d0}','\u{00d1}','\u{00d2}','\u{00d3}','\u{00d4}','\u{00d5}','\u{00d6}','\u{00d7}',
    '\u{00d8}','\u{00d9}','\u{00da}','\u{00db}','\u{00dc}','\u{00dd}','\u{00de}','\u{00df}',
    '\u{00e0}','\u{00e1}','\u{00e2}','\u{00e3}','\u{00e4}','\u{00e5}','\u{00e6}','\u{00e7}',
    '\u{00e8}','\u{00e9}','\u{00ea}','\u{00eb}','\u{00ec}','\u{00ed}','\u{00ee}','\u{00ef}',
    '\u{00f0}','\u{00f1}','\u{00f2}','\u{00f3}','\u{00f4}','\u{00f5}','\u{00f6}','\u{00f7}',
    '\u{00f8}','\u{00f9}','\u{00fa}','\u{00fb}','\u{00fc}','\u{00fd}','\u{00fe}','\u{00ff}',
];

#[cfg(test)]
pub(crate) mod testutil {
    /// A Type1 font dictionary that declares all of its own metrics:
    /// every code 32..=126 is 500 units wide, with the descriptor
    /// supplying the vertical metrics and `MissingWidth`.
    pub(crate) fn test_font_dict() -> String {
        let widths = vec!["500"; 95].join(" ");
        format!(
            "<< /Type /Font /Subtype /Type1 /BaseFont /TestSans \
             /FirstChar 32 /LastChar 126 /Widths [{}] \
             /FontDescriptor << /Type /FontDescriptor /FontName /TestSans \
             /Flags 32 /Ascent 700 /Descent -200 /CapHeight 700 /StemV 80 \
             /ItalicAngle 0 /FontBBox [0 -200 1000 900] /MissingWidth 500 >> >>",
            widths
        )
    }

    /// Build a tiny but complete one-page PDF in memory.
    pub(crate) fn minimal_pdf(content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"%PDF-1.4\n");
        let mut offsets = vec![0usize; 6];
        let mut push_obj = |body: &mut Vec<u8>, offsets: &mut Vec<usize>, id: usize, text: &[u8]| {
            offsets[id] = body.len();
            body.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
            body.extend_from_slice(text);
            body.extend_from_slice(b"\nendobj\n");
        };
        push_obj(&mut body, &mut offsets, 1, b"<< /Type /Catalog /Pages 2 0 R >>");
        push_obj(
            &mut body,
            &mut offsets,
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
        );
        push_obj(
            &mut body,
            &mut offsets,
            3,
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>",
        );
        let stream = format!("<< /Length {} >>\nstream\n", content.len());
        let mut obj4 = stream.into_bytes();
        obj4.extend_from_slice(content);
        obj4.extend_from_slice(b"\nendstream");
        push_obj(&mut body, &mut offsets, 4, &obj4);
        push_obj(&mut body, &mut offsets, 5, test_font_dict().as_bytes());
        let xref_pos = body.len();
        body.extend_from_slice(b"xref\n0 6\n0000000000 65535 f \n");
        for id in 1..=5 {
            body.extend_from_slice(format!("{:010} 00000 n \n", offsets[id]).as_bytes());
        }
        body.extend_from_slice(b"trailer\n<< /Size 6 /Root 1 0 R >>\n");
        body.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_pos).as_bytes());
        body
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::minimal_pdf;
    use super::*;

    #[test]
    fn test_open_minimal_document() {
        let pdf = minimal_pdf(b"BT (hi) Tj ET");
        let doc = Document::new(pdf).unwrap();
        assert_eq!(
            doc.catalog().get("Type").unwrap().as_name(),
            Some("Catalog")
        );
        assert!(doc.is_extractable());
    }

    #[test]
    fn test_page_iteration_with_inheritance() {
        let pdf = minimal_pdf(b"BT (hi) Tj ET");
        let doc = Document::new(pdf).unwrap();
        let pages: Vec<Page> = doc.pages().collect();
        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        assert_eq!(page.id, 3);
        // MediaBox is inherited from the Pages node.
        assert_eq!(page.mediabox, (0.0, 0.0, 612.0, 792.0));
        assert_eq!(page.rotate, 0);
        assert_eq!(page.contents.len(), 1);
        assert!(page.resources.contains_key("Font"));
    }

    #[test]
    fn test_object_cache_stability() {
        let pdf = minimal_pdf(b"");
        let doc = Document::new(pdf).unwrap();
        let first = doc.get_object(2);
        let second = doc.get_object(2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_get_object_unknown_id_is_null() {
        let pdf = minimal_pdf(b"");
        let doc = Document::new(pdf).unwrap();
        assert!(doc.get_object(99).is_null());
    }

    #[test]
    fn test_fallback_on_corrupt_xref() {
        let mut pdf = minimal_pdf(b"BT (hi) Tj ET");
        // Corrupt the startxref offset so the chain reader fails.
        let pos = pdf.windows(9).rposition(|w| w == b"startxref").unwrap();
        pdf[pos + 10] = b'9';
        pdf[pos + 11] = b'9';
        let doc = Document::new(pdf).unwrap();
        let obj = doc.get_object(1);
        assert_eq!(
            obj.as_dict().and_then(|d| d.get("Type")).and_then(|o| o.as_name()),
            Some("Catalog")
        );
    }

    #[test]
    fn test_decode_pdf_text() {
        assert_eq!(decode_pdf_text(b"Hello"), "Hello");
        assert_eq!(decode_pdf_text(b"\xfe\xff\x00H\x00i"), "Hi");
        // 0x92 is a right single quote in PDFDocEncoding.
        assert_eq!(decode_pdf_text(b"it\x92s"), "it\u{2019}s");
    }

    #[test]
    fn test_rotate_normalization() {
        let mut attrs = Dict::new();
        attrs.insert("Rotate".to_string(), Object::Integer(-90));
        attrs.insert(
            "MediaBox".to_string(),
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(100),
                Object::Integer(100),
            ]),
        );
        let pdf = minimal_pdf(b"");
        let doc = Document::new(pdf).unwrap();
        let page = Page::new(&doc, 7, attrs);
        assert_eq!(page.rotate, 270);
    }
}
