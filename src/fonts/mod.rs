//! Fonts: encodings, font models, and the shared resource manager.

mod encoding;
mod font;

pub use encoding::Encoding;
pub use font::{CidFont, Font, FontDescriptor, SimpleFont};

use std::collections::HashMap;
use std::rc::Rc;

use crate::cmap::CMapDb;
use crate::document::Document;
use crate::object::Dict;

/// Repository of shared resources.
///
/// Facilitates reuse of fonts (and their parsed CMaps) so that large
/// objects are not rebuilt for every page that references them. Fonts are
/// cached by the object id of their font dictionary.
#[derive(Default)]
pub struct ResourceManager {
    /// The builtin CMap database.
    pub cmapdb: CMapDb,
    fonts: HashMap<u32, Rc<dyn Font>>,
}

impl ResourceManager {
    /// Create an empty resource manager.
    pub fn new() -> Self {
        Self {
            cmapdb: CMapDb::new(),
            fonts: HashMap::new(),
        }
    }

    /// Materialize a font from its dictionary, consulting the cache.
    pub fn get_font(&mut self, doc: &Document, objid: Option<u32>, spec: &Dict) -> Rc<dyn Font> {
        if let Some(id) = objid {
            if let Some(font) = self.fonts.get(&id) {
                return font.clone();
            }
        }
        let font = self.build_font(doc, spec);
        if let Some(id) = objid {
            self.fonts.insert(id, font.clone());
        }
        font
    }

    fn build_font(&mut self, doc: &Document, spec: &Dict) -> Rc<dyn Font> {
        if spec.get("Type").and_then(|o| o.as_name()) != Some("Font") {
            log::warn!("font spec Type is not /Font");
        }
        let subtype = spec
            .get("Subtype")
            .and_then(|o| o.as_name())
            .unwrap_or_else(|| {
                log::warn!("font Subtype is not specified, assuming Type1");
                "Type1"
            });
        match subtype {
            "Type1" | "MMType1" | "TrueType" | "Type3" => Rc::new(SimpleFont::new(doc, spec)),
            "CIDFontType0" | "CIDFontType2" => {
                Rc::new(CidFont::new(doc, spec, &self.cmapdb))
            },
            "Type0" => {
                // A Type0 wrapper points at a descendant CIDFont; merge the
                // wrapper's Encoding and ToUnicode into the descendant spec.
                let descendant = spec
                    .get("DescendantFonts")
                    .map(|o| doc.resolve(o))
                    .as_ref()
                    .and_then(|o| o.as_array().and_then(|a| a.first().cloned()))
                    .map(|o| doc.resolve(&o));
                match descendant.as_ref().and_then(|o| o.as_dict()) {
                    Some(sub) => {
                        let mut merged: Dict = sub.clone();
                        for key in ["Encoding", "ToUnicode"] {
                            if let Some(v) = spec.get(key) {
                                merged.insert(key.to_string(), doc.resolve(v));
                            }
                        }
                        Rc::new(CidFont::new(doc, &merged, &self.cmapdb))
                    },
                    None => {
                        log::warn!("Type0 font without DescendantFonts");
                        Rc::new(SimpleFont::new(doc, spec))
                    },
                }
            },
            other => {
                log::warn!("invalid font Subtype {:?}", other);
                Rc::new(SimpleFont::new(doc, spec))
            },
        }
    }
}
