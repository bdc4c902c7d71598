//! Character maps (CMaps).
//!
//! CMaps map encoded byte sequences to character ids (CIDs), and CIDs to
//! Unicode. Three flavors exist at runtime:
//!
//! - **Identity**: pairs input bytes two at a time as big-endian 16-bit CIDs
//! - **Builtin**: precomputed code-to-CID tries loaded from resource files
//! - **Parsed**: built by running the CMap operator language found in
//!   embedded `ToUnicode` / `Encoding` streams
//!
//! Builtin resources are gzipped JSON records located through the
//! `PDF_SIFT_CMAP_DIR` environment variable: per-encoding files carry
//! `{is_vertical, code2cid}` and per-registry files
//! `{cid2unichr_h, cid2unichr_v}`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::object::Object;
use crate::parser::ObjectStack;
use crate::xref::nunpack;

/// A byte-keyed trie from code sequences to CIDs.
#[derive(Debug, Clone, Default)]
pub struct CodeTrie {
    children: HashMap<u8, TrieEntry>,
}

#[derive(Debug, Clone)]
enum TrieEntry {
    Branch(CodeTrie),
    Leaf(u32),
}

impl CodeTrie {
    /// Insert a mapping from a full code to a CID.
    pub fn insert(&mut self, code: &[u8], cid: u32) {
        let Some((&last, prefix)) = code.split_last() else {
            return;
        };
        let mut node = self;
        for &byte in prefix {
            let entry = node
                .children
                .entry(byte)
                .or_insert_with(|| TrieEntry::Branch(CodeTrie::default()));
            if !matches!(entry, TrieEntry::Branch(_)) {
                *entry = TrieEntry::Branch(CodeTrie::default());
            }
            node = match entry {
                TrieEntry::Branch(t) => t,
                TrieEntry::Leaf(_) => unreachable!(),
            };
        }
        node.children.insert(last, TrieEntry::Leaf(cid));
    }

    /// Merge another trie into this one (used by `usecmap`).
    pub fn merge(&mut self, other: &CodeTrie) {
        for (&byte, entry) in &other.children {
            match entry {
                TrieEntry::Leaf(cid) => {
                    self.children.insert(byte, TrieEntry::Leaf(*cid));
                },
                TrieEntry::Branch(sub) => match self.children.get_mut(&byte) {
                    Some(TrieEntry::Branch(mine)) => mine.merge(sub),
                    _ => {
                        let mut fresh = CodeTrie::default();
                        fresh.merge(sub);
                        self.children.insert(byte, TrieEntry::Branch(fresh));
                    },
                },
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A code-to-CID map.
#[derive(Debug, Clone)]
pub enum CMap {
    /// Big-endian 16-bit identity mapping
    Identity {
        /// Vertical writing mode
        vertical: bool,
    },
    /// Trie-backed mapping (builtin or parsed)
    Coded(CodedCMap),
}

/// A trie-backed CMap with attributes.
#[derive(Debug, Clone, Default)]
pub struct CodedCMap {
    /// The code-to-CID trie
    pub code2cid: CodeTrie,
    /// Writing mode (0 = horizontal, 1 = vertical)
    pub wmode: i64,
    /// CMapName, when the file declares one
    pub name: Option<String>,
}

impl CMap {
    /// An empty map (decodes everything to nothing).
    pub fn empty() -> Self {
        CMap::Coded(CodedCMap::default())
    }

    /// Whether the writing mode is vertical.
    pub fn is_vertical(&self) -> bool {
        match self {
            CMap::Identity { vertical } => *vertical,
            CMap::Coded(c) => c.wmode != 0,
        }
    }

    /// Decode a byte string into CIDs.
    ///
    /// The trie is walked byte by byte; reaching a leaf emits its CID and
    /// resets the walk. A byte with no entry in the current node resets
    /// without emitting. Identity maps pair bytes big-endian; odd-length
    /// input drops the trailing byte with a warning.
    pub fn decode(&self, code: &[u8]) -> Vec<u32> {
        match self {
            CMap::Identity { .. } => {
                let mut code = code;
                if code.len() % 2 != 0 {
                    log::warn!("identity cmap input has odd length {}, trimming", code.len());
                    code = &code[..code.len() - 1];
                }
                code.chunks(2)
                    .map(|pair| u32::from(pair[0]) << 8 | u32::from(pair[1]))
                    .collect()
            },
            CMap::Coded(coded) => {
                let root = &coded.code2cid;
                let mut out = Vec::new();
                let mut node = root;
                for &byte in code {
                    match node.children.get(&byte) {
                        Some(TrieEntry::Leaf(cid)) => {
                            out.push(*cid);
                            node = root;
                        },
                        Some(TrieEntry::Branch(sub)) => node = sub,
                        None => node = root,
                    }
                }
                out
            },
        }
    }
}

/// A CID-to-Unicode map.
#[derive(Debug, Clone, Default)]
pub struct UnicodeMap {
    cid2unichr: HashMap<u32, String>,
}

impl UnicodeMap {
    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.cid2unichr.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.cid2unichr.is_empty()
    }

    /// Look up the Unicode string for a CID.
    pub fn get_unichr(&self, cid: u32) -> Result<&str> {
        self.cid2unichr
            .get(&cid)
            .map(|s| s.as_str())
            .ok_or(Error::UnicodeNotDefined(cid))
    }

    /// Insert a mapping.
    pub fn insert(&mut self, cid: u32, text: String) {
        self.cid2unichr.insert(cid, text);
    }
}

/// Decode UTF-16BE bytes, dropping invalid units.
fn utf16be_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .filter(|c| c.len() == 2)
        .map(|c| u16::from(c[0]) << 8 | u16::from(c[1]))
        .collect();
    char::decode_utf16(units.into_iter())
        .filter_map(|r| r.ok())
        .collect()
}

/// Parser for the CMap operator language.
///
/// Consumes `begincmap`/`endcmap`, `def`, `usecmap`, the
/// `begin...end` range/char operator pairs, and builds both the
/// code-to-CID trie and the CID-to-Unicode map as the stream provides
/// them.
pub struct CMapParser<'a> {
    lexer: Lexer,
    stack: ObjectStack,
    cmapdb: Option<&'a CMapDb>,
    in_cmap: bool,
    cmap: CodedCMap,
    umap: UnicodeMap,
}

impl<'a> CMapParser<'a> {
    /// Create a parser over decoded CMap stream bytes.
    pub fn new(data: impl Into<bytes::Bytes>, cmapdb: Option<&'a CMapDb>) -> Self {
        Self {
            lexer: Lexer::new(data),
            stack: ObjectStack::new(false),
            cmapdb,
            in_cmap: false,
            cmap: CodedCMap::default(),
            umap: UnicodeMap::default(),
        }
    }

    /// Run to end of input and return the collected maps.
    pub fn run(mut self) -> (CodedCMap, UnicodeMap) {
        loop {
            match self.lexer.next_token() {
                Ok((pos, token)) => match self.stack.handle_token(pos, token) {
                    Ok(Some((_, keyword))) => self.do_keyword(&keyword),
                    Ok(None) => {},
                    Err(e) => {
                        log::warn!("cmap parse error: {}", e);
                    },
                },
                Err(Error::Eof) => break,
                Err(e) => {
                    log::warn!("cmap lex error: {}", e);
                    break;
                },
            }
        }
        (self.cmap, self.umap)
    }

    fn do_keyword(&mut self, keyword: &str) {
        match keyword {
            "begincmap" => {
                self.in_cmap = true;
                self.stack.popall();
                return;
            },
            "endcmap" => {
                self.in_cmap = false;
                return;
            },
            _ => {},
        }
        if !self.in_cmap {
            return;
        }
        match keyword {
            "def" => {
                let mut args = self.stack.pop(2);
                let value = args.pop().map(|(_, o)| o);
                let key = args.pop().and_then(|(_, o)| match o {
                    Object::Name(n) => Some(n),
                    _ => None,
                });
                if let (Some(key), Some(value)) = (key, value) {
                    match (key.as_str(), &value) {
                        ("WMode", Object::Integer(m)) => self.cmap.wmode = *m,
                        ("CMapName", Object::Name(n)) => self.cmap.name = Some(n.clone()),
                        _ => {},
                    }
                }
            },
            "usecmap" => {
                let name = self
                    .stack
                    .pop(1)
                    .pop()
                    .and_then(|(_, o)| o.as_name().map(str::to_string));
                if let (Some(name), Some(db)) = (name, self.cmapdb) {
                    match db.get_cmap(&name) {
                        Ok(base) => {
                            if let CMap::Coded(base) = base.as_ref() {
                                self.cmap.code2cid.merge(&base.code2cid);
                            }
                        },
                        Err(e) => log::warn!("usecmap {}: {}", name, e),
                    }
                }
            },
            "begincodespacerange" | "begincidrange" | "begincidchar" | "beginbfrange"
            | "beginbfchar" | "beginnotdefrange" => {
                self.stack.popall();
            },
            "endcodespacerange" | "endnotdefrange" => {
                self.stack.popall();
            },
            "endcidrange" => {
                let objs: Vec<Object> =
                    self.stack.popall().into_iter().map(|(_, o)| o).collect();
                for triple in objs.chunks(3) {
                    let (Some(s), Some(e), Some(cid)) = (
                        triple.first().and_then(|o| o.as_string()),
                        triple.get(1).and_then(|o| o.as_string()),
                        triple.get(2).and_then(|o| o.as_integer()),
                    ) else {
                        continue;
                    };
                    if s.len() != e.len() {
                        continue;
                    }
                    self.add_cid_range(s, e, cid as u32);
                }
            },
            "endcidchar" => {
                let objs: Vec<Object> =
                    self.stack.popall().into_iter().map(|(_, o)| o).collect();
                for pair in objs.chunks(2) {
                    let Some(code) = pair.first().and_then(|o| o.as_string()) else {
                        continue;
                    };
                    let cid = match pair.get(1) {
                        Some(Object::Integer(n)) => Some(*n as u32),
                        Some(Object::String(s)) => nunpack(s, 0).ok().map(|v| v as u32),
                        _ => None,
                    };
                    if let Some(cid) = cid {
                        self.cmap.code2cid.insert(code, cid);
                    }
                }
            },
            "endbfrange" => {
                let objs: Vec<Object> =
                    self.stack.popall().into_iter().map(|(_, o)| o).collect();
                for triple in objs.chunks(3) {
                    let (Some(s), Some(e)) = (
                        triple.first().and_then(|o| o.as_string()),
                        triple.get(1).and_then(|o| o.as_string()),
                    ) else {
                        continue;
                    };
                    if s.len() != e.len() {
                        continue;
                    }
                    let (Ok(s1), Ok(e1)) = (nunpack(s, 0), nunpack(e, 0)) else {
                        continue;
                    };
                    if e1 < s1 {
                        continue;
                    }
                    match triple.get(2) {
                        Some(Object::Array(items)) => {
                            for (i, item) in items.iter().enumerate().take((e1 - s1 + 1) as usize) {
                                self.add_bf_target(s1 as u32 + i as u32, item);
                            }
                        },
                        Some(Object::String(base)) => {
                            let var_len = base.len().min(4);
                            let prefix = &base[..base.len() - var_len];
                            let Ok(start) = nunpack(&base[base.len() - var_len..], 0) else {
                                continue;
                            };
                            for i in 0..=(e1 - s1) {
                                let mut code = prefix.to_vec();
                                let packed = ((start + i) as u32).to_be_bytes();
                                code.extend_from_slice(&packed[4 - var_len..]);
                                self.umap
                                    .insert((s1 + i) as u32, utf16be_to_string(&code));
                            }
                        },
                        _ => {},
                    }
                }
            },
            "endbfchar" => {
                let objs: Vec<Object> =
                    self.stack.popall().into_iter().map(|(_, o)| o).collect();
                for pair in objs.chunks(2) {
                    let Some(cid) = pair
                        .first()
                        .and_then(|o| o.as_string())
                        .and_then(|s| nunpack(s, 0).ok())
                    else {
                        continue;
                    };
                    if let Some(target) = pair.get(1) {
                        self.add_bf_target(cid as u32, target);
                    }
                }
            },
            other => {
                log::debug!("cmap keyword '{}' ignored", other);
            },
        }
    }

    fn add_cid_range(&mut self, s: &[u8], e: &[u8], cid: u32) {
        let var_len = s.len().min(4);
        let prefix_s = &s[..s.len() - var_len];
        let prefix_e = &e[..e.len() - var_len];
        if prefix_s != prefix_e {
            return;
        }
        let (Ok(s1), Ok(e1)) = (
            nunpack(&s[s.len() - var_len..], 0),
            nunpack(&e[e.len() - var_len..], 0),
        ) else {
            return;
        };
        if e1 < s1 {
            return;
        }
        for i in 0..=(e1 - s1) {
            let mut code = prefix_s.to_vec();
            let packed = ((s1 + i) as u32).to_be_bytes();
            code.extend_from_slice(&packed[4 - var_len..]);
            self.cmap.code2cid.insert(&code, cid + i as u32);
        }
    }

    fn add_bf_target(&mut self, cid: u32, target: &Object) {
        match target {
            Object::String(bytes) => self.umap.insert(cid, utf16be_to_string(bytes)),
            Object::Integer(n) => {
                if let Some(c) = char::from_u32(*n as u32) {
                    self.umap.insert(cid, c.to_string());
                }
            },
            Object::Name(name) if name.chars().count() == 1 => {
                self.umap.insert(cid, name.clone());
            },
            other => log::warn!("unusable bf target {:?} for cid {}", other.type_name(), cid),
        }
    }
}

/// Repository of builtin CMap resources.
///
/// `Identity-H` / `Identity-V` are synthesized; everything else loads
/// from gzipped JSON files in the directory named by the
/// `PDF_SIFT_CMAP_DIR` environment variable. Loaded maps are cached.
#[derive(Debug, Default)]
pub struct CMapDb {
    dir: Option<PathBuf>,
    cmap_cache: RefCell<HashMap<String, Rc<CMap>>>,
    umap_cache: RefCell<HashMap<(String, bool), Rc<UnicodeMap>>>,
}

#[derive(serde::Deserialize)]
struct CMapResource {
    is_vertical: bool,
    code2cid: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct UnicodeResource {
    cid2unichr_h: HashMap<String, String>,
    cid2unichr_v: HashMap<String, String>,
}

impl CMapDb {
    /// Create a database rooted at `PDF_SIFT_CMAP_DIR` (if set).
    pub fn new() -> Self {
        Self {
            dir: std::env::var_os("PDF_SIFT_CMAP_DIR").map(PathBuf::from),
            cmap_cache: RefCell::new(HashMap::new()),
            umap_cache: RefCell::new(HashMap::new()),
        }
    }

    fn read_resource(&self, filename: &str) -> Result<Vec<u8>> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| Error::Value("PDF_SIFT_CMAP_DIR is not set".to_string()))?;
        let path = dir.join(filename);
        let file = std::fs::File::open(&path)
            .map_err(|e| Error::Value(format!("cmap resource {:?}: {}", path, e)))?;
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(file)
            .read_to_end(&mut out)
            .map_err(|e| Error::Value(format!("cmap resource {:?}: {}", path, e)))?;
        Ok(out)
    }

    /// Load a code-to-CID map by encoding name.
    pub fn get_cmap(&self, name: &str) -> Result<Rc<CMap>> {
        match name {
            "Identity-H" => return Ok(Rc::new(CMap::Identity { vertical: false })),
            "Identity-V" => return Ok(Rc::new(CMap::Identity { vertical: true })),
            _ => {},
        }
        if let Some(cached) = self.cmap_cache.borrow().get(name) {
            return Ok(cached.clone());
        }
        let raw = self.read_resource(&format!("{}.json.gz", name))?;
        let resource: CMapResource = serde_json::from_slice(&raw)
            .map_err(|e| Error::Value(format!("cmap resource {}: {}", name, e)))?;
        let mut trie = CodeTrie::default();
        build_trie(&mut trie, &[], &resource.code2cid);
        let cmap = Rc::new(CMap::Coded(CodedCMap {
            code2cid: trie,
            wmode: i64::from(resource.is_vertical),
            name: Some(name.to_string()),
        }));
        self.cmap_cache
            .borrow_mut()
            .insert(name.to_string(), cmap.clone());
        Ok(cmap)
    }

    /// Load a CID-to-Unicode map by registry name and direction.
    pub fn get_unicode_map(&self, name: &str, vertical: bool) -> Result<Rc<UnicodeMap>> {
        let key = (name.to_string(), vertical);
        if let Some(cached) = self.umap_cache.borrow().get(&key) {
            return Ok(cached.clone());
        }
        let raw = self.read_resource(&format!("to-unicode-{}.json.gz", name))?;
        let resource: UnicodeResource = serde_json::from_slice(&raw)
            .map_err(|e| Error::Value(format!("unicode resource {}: {}", name, e)))?;
        let source = if vertical {
            resource.cid2unichr_v
        } else {
            resource.cid2unichr_h
        };
        let mut umap = UnicodeMap::default();
        for (cid, text) in source {
            if let Ok(cid) = cid.parse() {
                umap.insert(cid, text);
            }
        }
        let umap = Rc::new(umap);
        self.umap_cache.borrow_mut().insert(key, umap.clone());
        Ok(umap)
    }
}

/// Rebuild a trie from its nested-JSON form (maps keyed by byte values,
/// integer leaves).
fn build_trie(trie: &mut CodeTrie, prefix: &[u8], value: &serde_json::Value) {
    let Some(map) = value.as_object() else {
        return;
    };
    for (key, entry) in map {
        let Ok(byte) = key.parse::<u8>() else {
            continue;
        };
        let mut code = prefix.to_vec();
        code.push(byte);
        match entry {
            serde_json::Value::Number(n) => {
                if let Some(cid) = n.as_u64() {
                    trie.insert(&code, cid as u32);
                }
            },
            nested @ serde_json::Value::Object(_) => build_trie(trie, &code, nested),
            _ => {},
        }
    }
}
