//! Font models.
//!
//! Every font exposes the same small capability set to the interpreter:
//! decode bytes to CIDs, report per-CID metrics, and map CIDs to Unicode.
//! Two concrete shapes cover the PDF font zoo:
//!
//! - [`SimpleFont`]: Type1/MMType1/TrueType/Type3. Single-byte codes,
//!   identity CIDs, widths from `FirstChar`/`Widths`.
//! - [`CidFont`]: Type0 composite fonts. Multibyte codes decoded through
//!   a CMap, sparse `W`/`W2` width tables.
//!
//! Width and height accessors return text-space values (glyph units
//! already scaled by the font matrix); `char_disp` returns raw glyph
//! units, as the layout code applies the scaling itself.

use std::collections::HashMap;
use std::rc::Rc;

use crate::cmap::{CMap, CMapDb, CMapParser, UnicodeMap};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::fonts::encoding::Encoding;
use crate::object::{Dict, Object};

/// The capability set the interpreter consumes fonts through.
pub trait Font: std::fmt::Debug {
    /// The (base) font name.
    fn fontname(&self) -> &str;
    /// Vertical writing mode?
    fn is_vertical(&self) -> bool {
        false
    }
    /// Multibyte code space?
    fn is_multibyte(&self) -> bool {
        false
    }
    /// Decode a shown string into CIDs.
    fn decode(&self, bytes: &[u8]) -> Vec<u32>;
    /// Advance width of a CID in text space.
    fn char_width(&self, cid: u32) -> f32;
    /// Vertical displacement `(vx, vy)` in glyph units; `vx == None`
    /// means "center on half the glyph width".
    fn char_disp(&self, _cid: u32) -> (Option<f32>, f32) {
        (None, 0.0)
    }
    /// Unicode text for a CID.
    fn to_unichr(&self, cid: u32) -> Result<String>;
    /// Glyph height in text space.
    fn get_height(&self) -> f32;
    /// Descent in text space (negative).
    fn get_descent(&self) -> f32;
    /// Nominal glyph width in text space (used by vertical layout).
    fn get_width(&self) -> f32;
}

/// The subset of the font descriptor the engine needs.
#[derive(Debug, Clone, Default)]
pub struct FontDescriptor {
    /// Typographic ascent (glyph units)
    pub ascent: f32,
    /// Typographic descent (glyph units)
    pub descent: f32,
    /// Font bounding box (glyph units)
    pub bbox: (f32, f32, f32, f32),
    /// Width substituted for unlisted codes
    pub missing_width: f32,
    /// Descriptor flag bits
    pub flags: i64,
}

impl FontDescriptor {
    /// Read the descriptor entries out of a (resolved) dictionary.
    pub fn from_dict(doc: &Document, dict: &Dict) -> Self {
        let num = |key: &str| {
            dict.get(key)
                .map(|o| doc.resolve(o))
                .and_then(|o| o.as_number())
                .unwrap_or(0.0) as f32
        };
        let bbox = dict
            .get("FontBBox")
            .map(|o| doc.resolve(o))
            .and_then(|o| rect_from_array(&o))
            .unwrap_or((0.0, 0.0, 0.0, 0.0));
        FontDescriptor {
            ascent: num("Ascent"),
            descent: num("Descent"),
            bbox,
            missing_width: num("MissingWidth"),
            flags: dict.get("Flags").and_then(|o| o.as_integer()).unwrap_or(0),
        }
    }
}

fn rect_from_array(obj: &Object) -> Option<(f32, f32, f32, f32)> {
    let arr = obj.as_array()?;
    if arr.len() < 4 {
        return None;
    }
    let mut vals = arr.iter().map(|o| o.as_number().unwrap_or(0.0) as f32);
    Some((
        vals.next()?,
        vals.next()?,
        vals.next()?,
        vals.next()?,
    ))
}

fn base_font_name(doc: &Document, spec: &Dict) -> String {
    spec.get("BaseFont")
        .map(|o| doc.resolve(o))
        .and_then(|o| o.as_name().map(str::to_string))
        .unwrap_or_else(|| {
            log::warn!("font without BaseFont");
            "unknown".to_string()
        })
}

fn parse_to_unicode(doc: &Document, spec: &Dict) -> Option<UnicodeMap> {
    let obj = doc.resolve(spec.get("ToUnicode")?);
    let stream = obj.as_stream()?;
    let data = match stream.decoded_data(false) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("undecodable ToUnicode stream: {}", e);
            return None;
        },
    };
    let (_, umap) = CMapParser::new(data, None).run();
    Some(umap)
}

/// A single-byte font (Type1, MMType1, TrueType, Type3).
///
/// All metrics come from the font dictionary: per-code widths from
/// `FirstChar`/`Widths`, everything else from the descriptor. A code with
/// no `Widths` entry falls back to the descriptor's `MissingWidth`.
#[derive(Debug)]
pub struct SimpleFont {
    name: String,
    descriptor: FontDescriptor,
    widths: HashMap<u32, f32>,
    to_unicode: Option<UnicodeMap>,
    encoding: Encoding,
    // FontMatrix-derived scale; (0.001, 0.001) for everything but Type3.
    hscale: f32,
    vscale: f32,
}

impl SimpleFont {
    /// Build from a font dictionary.
    pub fn new(doc: &Document, spec: &Dict) -> SimpleFont {
        let name = base_font_name(doc, spec);
        let descriptor = spec
            .get("FontDescriptor")
            .map(|o| doc.resolve(o))
            .and_then(|o| o.as_dict().map(|d| FontDescriptor::from_dict(doc, d)))
            .unwrap_or_default();

        let mut widths = HashMap::new();
        let first_char = spec
            .get("FirstChar")
            .map(|o| doc.resolve(o))
            .and_then(|o| o.as_integer())
            .unwrap_or(0);
        if let Some(arr) = spec
            .get("Widths")
            .map(|o| doc.resolve(o))
            .as_ref()
            .and_then(|o| o.as_array())
        {
            for (i, w) in arr.iter().enumerate() {
                let w = doc.resolve(w).as_number().unwrap_or(0.0) as f32;
                widths.insert(first_char as u32 + i as u32, w);
            }
        }

        let is_type3 = spec.get("Subtype").and_then(|o| o.as_name()) == Some("Type3");
        let (hscale, vscale) = if is_type3 {
            spec.get("FontMatrix")
                .map(|o| doc.resolve(o))
                .and_then(|o| rect_from_array(&o).map(|(a, _, _, d)| (a, d)))
                .unwrap_or((0.001, 0.001))
        } else {
            (0.001, 0.001)
        };

        let encoding = match spec.get("Encoding").map(|o| doc.resolve(o)) {
            Some(Object::Name(name)) => Encoding::from_name(&name),
            Some(Object::Dictionary(dict)) => {
                if dict.contains_key("Differences") {
                    log::warn!("font {} uses an encoding Differences array", name);
                }
                dict.get("BaseEncoding")
                    .and_then(|o| o.as_name())
                    .map(Encoding::from_name)
                    .unwrap_or_default()
            },
            _ => Encoding::default(),
        };

        SimpleFont {
            to_unicode: parse_to_unicode(doc, spec),
            name,
            descriptor,
            widths,
            encoding,
            hscale,
            vscale,
        }
    }
}

impl Font for SimpleFont {
    fn fontname(&self) -> &str {
        &self.name
    }

    fn decode(&self, bytes: &[u8]) -> Vec<u32> {
        bytes.iter().map(|&b| u32::from(b)).collect()
    }

    fn char_width(&self, cid: u32) -> f32 {
        let raw = self
            .widths
            .get(&cid)
            .copied()
            .unwrap_or(self.descriptor.missing_width);
        raw * self.hscale
    }

    fn to_unichr(&self, cid: u32) -> Result<String> {
        if let Some(umap) = &self.to_unicode {
            if let Ok(text) = umap.get_unichr(cid) {
                return Ok(text.to_string());
            }
        }
        self.encoding
            .char_for(cid)
            .map(|c| c.to_string())
            .ok_or(Error::UnicodeNotDefined(cid))
    }

    fn get_height(&self) -> f32 {
        let bbox = self.descriptor.bbox;
        let mut h = bbox.3 - bbox.1;
        if h == 0.0 {
            h = self.descriptor.ascent - self.descriptor.descent;
        }
        h * self.vscale
    }

    fn get_descent(&self) -> f32 {
        self.descriptor.descent * self.vscale
    }

    fn get_width(&self) -> f32 {
        let w = self.descriptor.bbox.2 - self.descriptor.bbox.0;
        if w == 0.0 {
            self.descriptor.missing_width * self.hscale
        } else {
            w * self.hscale
        }
    }
}

/// A composite (Type0 / CID-keyed) font.
#[derive(Debug)]
pub struct CidFont {
    name: String,
    descriptor: FontDescriptor,
    cmap: Rc<CMap>,
    to_unicode: Option<UnicodeMap>,
    registry_unicode: Option<Rc<UnicodeMap>>,
    widths: HashMap<u32, f32>,
    default_width: f32,
    disps: HashMap<u32, (f32, f32)>,
    default_disp: f32,
    vertical: bool,
}

impl CidFont {
    /// Build from a (descendant-merged) font dictionary.
    pub fn new(doc: &Document, spec: &Dict, cmapdb: &CMapDb) -> CidFont {
        let name = base_font_name(doc, spec);
        let descriptor = spec
            .get("FontDescriptor")
            .map(|o| doc.resolve(o))
            .and_then(|o| o.as_dict().map(|d| FontDescriptor::from_dict(doc, d)))
            .unwrap_or_default();

        let cmap: Rc<CMap> = match spec.get("Encoding").map(|o| doc.resolve(o)) {
            Some(Object::Name(enc)) => cmapdb.get_cmap(&enc).unwrap_or_else(|e| {
                log::warn!("cmap {} unavailable: {}", enc, e);
                Rc::new(CMap::empty())
            }),
            Some(Object::Stream(stream)) => match stream.decoded_data(false) {
                Ok(data) => {
                    let (coded, _) = CMapParser::new(data, Some(cmapdb)).run();
                    Rc::new(CMap::Coded(coded))
                },
                Err(e) => {
                    log::warn!("undecodable embedded cmap: {}", e);
                    Rc::new(CMap::empty())
                },
            },
            _ => {
                log::warn!("CID font {} without Encoding, assuming Identity-H", name);
                Rc::new(CMap::Identity { vertical: false })
            },
        };
        let vertical = cmap.is_vertical();

        // Registry-wide Unicode tables ("Adobe-Japan1" etc.) back up a
        // missing ToUnicode stream.
        let registry_unicode = spec
            .get("CIDSystemInfo")
            .map(|o| doc.resolve(o))
            .as_ref()
            .and_then(|o| o.as_dict())
            .and_then(|info| {
                let registry = info.get("Registry").and_then(|o| o.as_string())?;
                let ordering = info.get("Ordering").and_then(|o| o.as_string())?;
                let key = format!(
                    "{}-{}",
                    String::from_utf8_lossy(registry),
                    String::from_utf8_lossy(ordering)
                );
                cmapdb.get_unicode_map(&key, vertical).ok()
            });

        let (widths, default_width, disps, default_disp) =
            Self::load_widths(doc, spec, vertical);

        CidFont {
            to_unicode: parse_to_unicode(doc, spec),
            name,
            descriptor,
            cmap,
            registry_unicode,
            widths,
            default_width,
            disps,
            default_disp,
            vertical,
        }
    }

    /// Expand the sparse `W` (or, vertically, `W2`) table into a dense map.
    fn load_widths(
        doc: &Document,
        spec: &Dict,
        vertical: bool,
    ) -> (HashMap<u32, f32>, f32, HashMap<u32, (f32, f32)>, f32) {
        // Defaults per the CIDFont dictionary: DW 1000, DW2 [880 -1000].
        let mut default_width = spec
            .get("DW")
            .map(|o| doc.resolve(o))
            .and_then(|o| o.as_number())
            .unwrap_or(1000.0) as f32;
        let mut default_disp = 0.0f32;
        let mut widths = HashMap::new();
        let mut disps = HashMap::new();

        if vertical {
            let dw2 = spec
                .get("DW2")
                .map(|o| doc.resolve(o))
                .as_ref()
                .and_then(|o| o.as_array().map(|a| a.to_vec()))
                .unwrap_or_default();
            default_disp = dw2.first().and_then(|o| o.as_number()).unwrap_or(880.0) as f32;
            default_width = dw2.get(1).and_then(|o| o.as_number()).unwrap_or(-1000.0) as f32;
            if let Some(arr) = spec
                .get("W2")
                .map(|o| doc.resolve(o))
                .as_ref()
                .and_then(|o| o.as_array().map(|a| a.to_vec()))
            {
                let mut i = 0;
                while i < arr.len() {
                    let Some(start) = resolve_num(doc, &arr[i]) else { break };
                    let start = start as u32;
                    match arr.get(i + 1).map(|o| doc.resolve(o)) {
                        Some(Object::Array(items)) => {
                            for (j, triple) in items.chunks(3).enumerate() {
                                if let [w, vx, vy] = triple {
                                    let cid = start + j as u32;
                                    widths.insert(cid, w.as_number().unwrap_or(0.0) as f32);
                                    disps.insert(
                                        cid,
                                        (
                                            vx.as_number().unwrap_or(0.0) as f32,
                                            vy.as_number().unwrap_or(0.0) as f32,
                                        ),
                                    );
                                }
                            }
                            i += 2;
                        },
                        Some(end) => {
                            let end = end.as_number().unwrap_or(0.0) as u32;
                            let w = arr.get(i + 2).and_then(|o| resolve_num(doc, o)).unwrap_or(0.0);
                            let vx = arr.get(i + 3).and_then(|o| resolve_num(doc, o)).unwrap_or(0.0);
                            let vy = arr.get(i + 4).and_then(|o| resolve_num(doc, o)).unwrap_or(0.0);
                            for cid in range_capped(start, end) {
                                widths.insert(cid, w as f32);
                                disps.insert(cid, (vx as f32, vy as f32));
                            }
                            i += 5;
                        },
                        None => break,
                    }
                }
            }
        } else if let Some(arr) = spec
            .get("W")
            .map(|o| doc.resolve(o))
            .as_ref()
            .and_then(|o| o.as_array().map(|a| a.to_vec()))
        {
            let mut i = 0;
            while i < arr.len() {
                let Some(start) = resolve_num(doc, &arr[i]) else { break };
                let start = start as u32;
                match arr.get(i + 1).map(|o| doc.resolve(o)) {
                    Some(Object::Array(items)) => {
                        for (j, w) in items.iter().enumerate() {
                            widths.insert(
                                start + j as u32,
                                w.as_number().unwrap_or(0.0) as f32,
                            );
                        }
                        i += 2;
                    },
                    Some(end) => {
                        let end = end.as_number().unwrap_or(0.0) as u32;
                        let w = arr.get(i + 2).and_then(|o| resolve_num(doc, o)).unwrap_or(0.0);
                        for cid in range_capped(start, end) {
                            widths.insert(cid, w as f32);
                        }
                        i += 3;
                    },
                    None => break,
                }
            }
        }
        (widths, default_width, disps, default_disp)
    }
}

fn resolve_num(doc: &Document, obj: &Object) -> Option<f64> {
    doc.resolve(obj).as_number()
}

/// `start..=end` with a sanity cap against absurd ranges.
fn range_capped(start: u32, end: u32) -> std::ops::RangeInclusive<u32> {
    if end < start {
        return 1..=0;
    }
    if end - start > 0xFFFF {
        log::warn!("width range {}..{} capped", start, end);
        return start..=start + 0xFFFF;
    }
    start..=end
}

impl Font for CidFont {
    fn fontname(&self) -> &str {
        &self.name
    }

    fn is_vertical(&self) -> bool {
        self.vertical
    }

    fn is_multibyte(&self) -> bool {
        true
    }

    fn decode(&self, bytes: &[u8]) -> Vec<u32> {
        self.cmap.decode(bytes)
    }

    fn char_width(&self, cid: u32) -> f32 {
        self.widths.get(&cid).copied().unwrap_or(self.default_width) * 0.001
    }

    fn char_disp(&self, cid: u32) -> (Option<f32>, f32) {
        match self.disps.get(&cid) {
            Some((vx, vy)) => (Some(*vx), *vy),
            None => (None, self.default_disp),
        }
    }

    fn to_unichr(&self, cid: u32) -> Result<String> {
        if let Some(umap) = &self.to_unicode {
            if let Ok(text) = umap.get_unichr(cid) {
                return Ok(text.to_string());
            }
        }
        if let Some(umap) = &self.registry_unicode {
            if let Ok(text) = umap.get_unichr(cid) {
                return Ok(text.to_string());
            }
        }
        Err(Error::UnicodeNotDefined(cid))
    }

    fn get_height(&self) -> f32 {
        let mut h = self.descriptor.bbox.3 - self.descriptor.bbox.1;
        if h == 0.0 {
            h = self.descriptor.ascent - self.descriptor.descent;
        }
        h * 0.001
    }

    fn get_descent(&self) -> f32 {
        self.descriptor.descent * 0.001
    }

    fn get_width(&self) -> f32 {
        let w = self.descriptor.bbox.2 - self.descriptor.bbox.0;
        if w == 0.0 {
            self.default_width.abs() * 0.001
        } else {
            w * 0.001
        }
    }
}
