//! The content-stream interpreter.
//!
//! Executes page content against a [`Device`]: a dispatch loop pops
//! operator arguments off a stack and maintains the graphics-state stack
//! (`q`/`Q`), the CTM, the current path and the text state. Text showing,
//! path painting, marked content and XObject invocation are forwarded to
//! the device; everything the layout analysis does not need (color
//! values, clipping) is consumed and dropped.
//!
//! Operators with too few arguments are skipped with a warning; unknown
//! operators are reported but never abort the page.

use std::collections::HashMap;
use std::rc::Rc;

use crate::content::graphics_state::{GraphicsState, Matrix, TextState};
use crate::content::parser::{ContentParser, ContentToken};
use crate::device::{Device, TextItem};
use crate::document::{Document, Page};
use crate::error::Result;
use crate::fonts::{Font, ResourceManager};
use crate::object::{Dict, Object, Stream};

/// One segment of the current path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    /// `m`: move to
    Move(f32, f32),
    /// `l`: line to
    Line(f32, f32),
    /// `c`: curve with two control points
    Curve(f32, f32, f32, f32, f32, f32),
    /// `v`: curve, first control point coincident
    CurveV(f32, f32, f32, f32),
    /// `y`: curve, second control point coincident
    CurveY(f32, f32, f32, f32),
    /// `h`: close subpath
    Close,
}

/// A color space, reduced to what argument popping needs.
#[derive(Debug, Clone)]
pub struct ColorSpace {
    /// Color space family name
    pub name: String,
    /// Number of color components
    pub ncomponents: usize,
}

fn predefined_colorspaces() -> HashMap<String, ColorSpace> {
    let mut map = HashMap::new();
    for (name, n) in [
        ("DeviceGray", 1),
        ("CalGray", 1),
        ("DeviceRGB", 3),
        ("CalRGB", 3),
        ("Lab", 3),
        ("DeviceCMYK", 4),
        ("Separation", 1),
        ("Indexed", 1),
        ("Pattern", 1),
    ] {
        map.insert(
            name.to_string(),
            ColorSpace {
                name: name.to_string(),
                ncomponents: n,
            },
        );
    }
    map
}

/// Per-invocation execution state (one per page or form XObject).
struct ExecState {
    ctm: Matrix,
    gstack: Vec<(Matrix, TextState, GraphicsState)>,
    textstate: TextState,
    graphicstate: GraphicsState,
    curpath: Vec<PathSegment>,
    argstack: Vec<Object>,
    fontmap: HashMap<String, Rc<dyn Font>>,
    xobjmap: HashMap<String, Object>,
    csmap: HashMap<String, ColorSpace>,
    scs: Option<ColorSpace>,
    ncs: Option<ColorSpace>,
    resources: Dict,
    inline_count: usize,
}

/// The page interpreter, parameterized over its device.
pub struct Interpreter<'a, D: Device> {
    rsrcmgr: &'a mut ResourceManager,
    device: &'a mut D,
    doc: &'a Document,
}

impl<'a, D: Device> Interpreter<'a, D> {
    /// Create an interpreter bound to a document, resource manager and
    /// device.
    pub fn new(rsrcmgr: &'a mut ResourceManager, device: &'a mut D, doc: &'a Document) -> Self {
        Self {
            rsrcmgr,
            device,
            doc,
        }
    }

    /// Interpret one page.
    ///
    /// The device's `begin_page` receives a CTM derived from the page
    /// rotation; content is then executed against that CTM.
    pub fn process_page(&mut self, page: &Page) -> Result<()> {
        let (x0, y0, x1, y1) = page.mediabox;
        let ctm = match page.rotate {
            90 => Matrix::new(0.0, -1.0, 1.0, 0.0, -y0, x1),
            180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, x1, y1),
            270 => Matrix::new(0.0, 1.0, -1.0, 0.0, y1, -x0),
            _ => Matrix::new(1.0, 0.0, 0.0, 1.0, -x0, -y0),
        };
        self.device.begin_page(page, ctm);
        self.render_contents(&page.resources, &page.contents, ctm)?;
        self.device.end_page(page);
        Ok(())
    }

    /// Execute a list of content streams with the given resources.
    ///
    /// Called recursively for form XObjects.
    fn render_contents(&mut self, resources: &Dict, streams: &[Stream], ctm: Matrix) -> Result<()> {
        let mut data = Vec::new();
        for stream in streams {
            data.extend_from_slice(&stream.decoded_data(false)?);
            data.push(b'\n');
        }
        let mut state = self.init_state(resources, ctm);
        self.device.set_ctm(state.ctm);

        let mut parser = ContentParser::new(data);
        while let Some(token) = parser.next()? {
            match token {
                ContentToken::Object(obj) => state.argstack.push(obj),
                ContentToken::InlineImage(stream) => {
                    state.argstack.push(Object::Stream(stream));
                },
                ContentToken::Operator(name) => self.execute(&mut state, &name)?,
            }
        }
        Ok(())
    }

    fn init_state(&mut self, resources: &Dict, ctm: Matrix) -> ExecState {
        let mut fontmap = HashMap::new();
        let mut xobjmap = HashMap::new();
        let mut csmap = predefined_colorspaces();
        for (key, value) in resources {
            match key.as_str() {
                "Font" => {
                    let fonts = self.doc.resolve(value);
                    if let Some(dict) = fonts.as_dict() {
                        for (fontid, spec) in dict {
                            let objid = spec.as_reference().map(|r| r.id);
                            let resolved = self.doc.resolve(spec);
                            if let Some(spec_dict) = resolved.as_dict() {
                                fontmap.insert(
                                    fontid.clone(),
                                    self.rsrcmgr.get_font(self.doc, objid, spec_dict),
                                );
                            }
                        }
                    }
                },
                "ColorSpace" => {
                    let spaces = self.doc.resolve(value);
                    if let Some(dict) = spaces.as_dict() {
                        for (csid, spec) in dict {
                            if let Some(cs) = self.colorspace_of(&self.doc.resolve(spec)) {
                                csmap.insert(csid.clone(), cs);
                            }
                        }
                    }
                },
                "XObject" => {
                    let xobjects = self.doc.resolve(value);
                    if let Some(dict) = xobjects.as_dict() {
                        for (xobjid, xobj) in dict {
                            xobjmap.insert(xobjid.clone(), xobj.clone());
                        }
                    }
                },
                "ProcSet" | "ExtGState" => {},
                other => log::debug!("resource category {:?} ignored", other),
            }
        }
        let default_cs = csmap.get("DeviceGray").cloned();
        ExecState {
            ctm,
            gstack: Vec::new(),
            textstate: TextState::default(),
            graphicstate: GraphicsState::default(),
            curpath: Vec::new(),
            argstack: Vec::new(),
            fontmap,
            xobjmap,
            csmap,
            scs: default_cs.clone(),
            ncs: default_cs,
            resources: resources.clone(),
            inline_count: 0,
        }
    }

    fn colorspace_of(&self, spec: &Object) -> Option<ColorSpace> {
        let name = match spec {
            Object::Array(arr) => arr.first()?.as_name()?,
            other => other.as_name()?,
        };
        if let Some(arr) = spec.as_array() {
            if name == "ICCBased" && arr.len() >= 2 {
                let n = self
                    .doc
                    .resolve(&arr[1])
                    .as_dict()
                    .and_then(|d| d.get("N").and_then(|o| o.as_integer()))
                    .unwrap_or(1);
                return Some(ColorSpace {
                    name: name.to_string(),
                    ncomponents: n as usize,
                });
            }
            if name == "DeviceN" && arr.len() >= 2 {
                let n = self
                    .doc
                    .resolve(&arr[1])
                    .as_array()
                    .map(|a| a.len())
                    .unwrap_or(1);
                return Some(ColorSpace {
                    name: name.to_string(),
                    ncomponents: n,
                });
            }
        }
        predefined_colorspaces().remove(name).or_else(|| {
            log::warn!("unknown color space {:?}", name);
            None
        })
    }

    /// Pop `n` arguments, skipping the operator when fewer are present.
    fn pop(state: &mut ExecState, n: usize, op: &str) -> Option<Vec<Object>> {
        if state.argstack.len() < n {
            log::warn!(
                "operator {} needs {} operands, {} on stack; skipped",
                op,
                n,
                state.argstack.len()
            );
            state.argstack.clear();
            return None;
        }
        let at = state.argstack.len() - n;
        Some(state.argstack.split_off(at))
    }

    fn execute(&mut self, state: &mut ExecState, op: &str) -> Result<()> {
        macro_rules! pop {
            ($n:expr) => {
                match Self::pop(state, $n, op) {
                    Some(args) => args,
                    None => return Ok(()),
                }
            };
        }
        let num = |o: &Object| o.as_number().unwrap_or(0.0) as f32;

        match op {
            // Graphics state
            "q" => {
                state.gstack.push((
                    state.ctm,
                    state.textstate.clone(),
                    state.graphicstate.clone(),
                ));
            },
            "Q" => {
                if let Some((ctm, ts, gs)) = state.gstack.pop() {
                    state.ctm = ctm;
                    state.textstate = ts;
                    state.graphicstate = gs;
                    self.device.set_ctm(state.ctm);
                }
            },
            "cm" => {
                let a = pop!(6);
                let m = Matrix::new(num(&a[0]), num(&a[1]), num(&a[2]), num(&a[3]), num(&a[4]), num(&a[5]));
                state.ctm = m.multiply(&state.ctm);
                self.device.set_ctm(state.ctm);
            },
            "w" => state.graphicstate.linewidth = num(&pop!(1)[0]),
            "J" => state.graphicstate.linecap = pop!(1)[0].as_integer(),
            "j" => state.graphicstate.linejoin = pop!(1)[0].as_integer(),
            "M" => state.graphicstate.miterlimit = Some(num(&pop!(1)[0])),
            "d" => {
                let a = pop!(2);
                let pattern = a[0]
                    .as_array()
                    .map(|arr| arr.iter().map(num).collect())
                    .unwrap_or_default();
                state.graphicstate.dash = Some((pattern, num(&a[1])));
            },
            "ri" => {
                state.graphicstate.intent = pop!(1)[0].as_name().map(str::to_string);
            },
            "i" => state.graphicstate.flatness = Some(num(&pop!(1)[0])),
            "gs" => {
                pop!(1);
            },

            // Path construction
            "m" => {
                let a = pop!(2);
                state.curpath.push(PathSegment::Move(num(&a[0]), num(&a[1])));
            },
            "l" => {
                let a = pop!(2);
                state.curpath.push(PathSegment::Line(num(&a[0]), num(&a[1])));
            },
            "c" => {
                let a = pop!(6);
                state.curpath.push(PathSegment::Curve(
                    num(&a[0]), num(&a[1]), num(&a[2]), num(&a[3]), num(&a[4]), num(&a[5]),
                ));
            },
            "v" => {
                let a = pop!(4);
                state
                    .curpath
                    .push(PathSegment::CurveV(num(&a[0]), num(&a[1]), num(&a[2]), num(&a[3])));
            },
            "y" => {
                let a = pop!(4);
                state
                    .curpath
                    .push(PathSegment::CurveY(num(&a[0]), num(&a[1]), num(&a[2]), num(&a[3])));
            },
            "h" => state.curpath.push(PathSegment::Close),
            "re" => {
                let a = pop!(4);
                let (x, y, w, h) = (num(&a[0]), num(&a[1]), num(&a[2]), num(&a[3]));
                state.curpath.push(PathSegment::Move(x, y));
                state.curpath.push(PathSegment::Line(x + w, y));
                state.curpath.push(PathSegment::Line(x + w, y + h));
                state.curpath.push(PathSegment::Line(x, y + h));
                state.curpath.push(PathSegment::Close);
            },

            // Path painting
            "S" => self.paint(state, true, false, false),
            "s" => {
                state.curpath.push(PathSegment::Close);
                self.paint(state, true, false, false);
            },
            "f" | "F" => self.paint(state, false, true, false),
            "f*" => self.paint(state, false, true, true),
            "B" => self.paint(state, true, true, false),
            "B*" => self.paint(state, true, true, true),
            "b" => {
                state.curpath.push(PathSegment::Close);
                self.paint(state, true, true, false);
            },
            "b*" => {
                state.curpath.push(PathSegment::Close);
                self.paint(state, true, true, true);
            },
            "n" => state.curpath.clear(),
            "W" | "W*" => {},

            // Color
            "CS" => {
                let a = pop!(1);
                if let Some(name) = a[0].as_name() {
                    match state.csmap.get(name) {
                        Some(cs) => state.scs = Some(cs.clone()),
                        None => log::warn!("undefined color space {:?}", name),
                    }
                }
            },
            "cs" => {
                let a = pop!(1);
                if let Some(name) = a[0].as_name() {
                    match state.csmap.get(name) {
                        Some(cs) => state.ncs = Some(cs.clone()),
                        None => log::warn!("undefined color space {:?}", name),
                    }
                }
            },
            "G" | "g" => {
                pop!(1);
            },
            "RG" | "rg" => {
                pop!(3);
            },
            "K" | "k" => {
                pop!(4);
            },
            "SCN" | "SC" => {
                let n = state.scs.as_ref().map(|cs| cs.ncomponents).unwrap_or_else(|| {
                    log::warn!("SCN with no stroking color space");
                    1
                });
                pop!(n);
            },
            "scn" | "sc" => {
                let n = state.ncs.as_ref().map(|cs| cs.ncomponents).unwrap_or_else(|| {
                    log::warn!("scn with no color space");
                    1
                });
                pop!(n);
            },
            "sh" => {
                pop!(1);
            },

            // Marked content
            "MP" => {
                let a = pop!(1);
                if let Some(tag) = a[0].as_name() {
                    self.device.do_tag(tag, None);
                }
            },
            "DP" => {
                let a = pop!(2);
                if let Some(tag) = a[0].as_name() {
                    self.device.do_tag(tag, a[1].as_dict());
                }
            },
            "BMC" => {
                let a = pop!(1);
                if let Some(tag) = a[0].as_name() {
                    self.device.begin_tag(tag, None);
                }
            },
            "BDC" => {
                let a = pop!(2);
                if let Some(tag) = a[0].as_name() {
                    self.device.begin_tag(tag, a[1].as_dict());
                }
            },
            "EMC" => self.device.end_tag(),

            // Text state
            "BT" => state.textstate.reset(),
            "ET" => {},
            "BX" | "EX" => {},
            "Tc" => state.textstate.charspace = num(&pop!(1)[0]),
            "Tw" => state.textstate.wordspace = num(&pop!(1)[0]),
            "Tz" => state.textstate.scaling = num(&pop!(1)[0]),
            "TL" => state.textstate.leading = -num(&pop!(1)[0]),
            "Tf" => {
                let a = pop!(2);
                match a[0].as_name().and_then(|n| state.fontmap.get(n)) {
                    Some(font) => state.textstate.font = Some(font.clone()),
                    None => {
                        log::warn!("undefined font id {:?}", a[0]);
                        return Ok(());
                    },
                }
                state.textstate.fontsize = num(&a[1]);
            },
            "Tr" => state.textstate.render = pop!(1)[0].as_integer().unwrap_or(0),
            "Ts" => state.textstate.rise = num(&pop!(1)[0]),

            // Text positioning
            "Td" => {
                let a = pop!(2);
                state.textstate.matrix = state.textstate.matrix.translated(num(&a[0]), num(&a[1]));
                state.textstate.linematrix = (0.0, 0.0);
            },
            "TD" => {
                let a = pop!(2);
                let (tx, ty) = (num(&a[0]), num(&a[1]));
                state.textstate.matrix = state.textstate.matrix.translated(tx, ty);
                state.textstate.leading = ty;
                state.textstate.linematrix = (0.0, 0.0);
            },
            "Tm" => {
                let a = pop!(6);
                state.textstate.matrix = Matrix::new(
                    num(&a[0]), num(&a[1]), num(&a[2]), num(&a[3]), num(&a[4]), num(&a[5]),
                );
                state.textstate.linematrix = (0.0, 0.0);
            },
            "T*" => self.next_line(state),

            // Text showing
            "TJ" => {
                let a = pop!(1);
                let seq = text_items(&a[0]);
                self.show(state, seq);
            },
            "Tj" => {
                let a = pop!(1);
                let seq = text_items(&Object::Array(vec![a[0].clone()]));
                self.show(state, seq);
            },
            "'" => {
                let a = pop!(1);
                self.next_line(state);
                let seq = text_items(&Object::Array(vec![a[0].clone()]));
                self.show(state, seq);
            },
            "\"" => {
                let a = pop!(3);
                state.textstate.wordspace = num(&a[0]);
                state.textstate.charspace = num(&a[1]);
                let seq = text_items(&Object::Array(vec![a[2].clone()]));
                self.show(state, seq);
            },

            // XObjects and inline images
            "Do" => {
                let a = pop!(1);
                if let Some(name) = a[0].as_name() {
                    self.do_xobject(state, &name.to_string())?;
                }
            },
            "EI" => {
                let a = pop!(1);
                if let Object::Stream(stream) = &a[0] {
                    if stream.get_any(&["W", "Width"]).is_some()
                        && stream.get_any(&["H", "Height"]).is_some()
                    {
                        state.inline_count += 1;
                        let name = format!("inline{}", state.inline_count);
                        self.device
                            .begin_figure(&name, (0.0, 0.0, 1.0, 1.0), Matrix::identity());
                        self.device.render_image(&name, stream);
                        self.device.end_figure(&name);
                    }
                } else {
                    log::warn!("malformed inline image operand");
                }
            },

            other => {
                log::warn!("unknown operator {:?}", other);
            },
        }
        Ok(())
    }

    fn paint(&mut self, state: &mut ExecState, stroke: bool, fill: bool, even_odd: bool) {
        self.device
            .paint_path(&state.graphicstate, stroke, fill, even_odd, &state.curpath);
        state.curpath.clear();
    }

    fn next_line(&mut self, state: &mut ExecState) {
        let leading = state.textstate.leading;
        state.textstate.matrix = state.textstate.matrix.translated(0.0, leading);
        state.textstate.linematrix = (0.0, 0.0);
    }

    fn show(&mut self, state: &mut ExecState, seq: Vec<TextItem>) {
        if state.textstate.font.is_none() {
            log::warn!("text shown with no font selected");
            return;
        }
        self.device.render_string(&mut state.textstate, &seq);
    }

    /// `Do`: invoke a form or image XObject.
    fn do_xobject(&mut self, state: &mut ExecState, name: &str) -> Result<()> {
        let Some(entry) = state.xobjmap.get(name) else {
            log::warn!("undefined XObject id {:?}", name);
            return Ok(());
        };
        let resolved = self.doc.resolve(entry);
        let Some(stream) = resolved.as_stream() else {
            log::warn!("XObject {:?} is {}", name, resolved.type_name());
            return Ok(());
        };
        match stream.get("Subtype").and_then(|o| o.as_name()) {
            Some("Form") if stream.get("BBox").is_some() => {
                let bbox = stream
                    .get("BBox")
                    .map(|o| self.doc.resolve(o))
                    .as_ref()
                    .and_then(|o| o.as_array().map(bbox_of))
                    .unwrap_or((0.0, 0.0, 1.0, 1.0));
                let matrix = stream
                    .get("Matrix")
                    .map(|o| self.doc.resolve(o))
                    .as_ref()
                    .and_then(|o| o.as_array().map(matrix_of))
                    .unwrap_or_else(Matrix::identity);
                // Form XObjects from PDFs predating 1.2 have no Resources
                // entry and use the page's (PDF Ref 1.7, 4.9.1).
                let resources = stream
                    .get("Resources")
                    .map(|o| self.doc.resolve(o))
                    .as_ref()
                    .and_then(|o| o.as_dict().cloned())
                    .unwrap_or_else(|| state.resources.clone());
                self.device.begin_figure(name, bbox, matrix);
                self.render_contents(
                    &resources,
                    std::slice::from_ref(stream),
                    matrix.multiply(&state.ctm),
                )?;
                // Restore the CTM the recursion overwrote on the device.
                self.device.set_ctm(state.ctm);
                self.device.end_figure(name);
            },
            Some("Image")
                if stream.get("Width").is_some() && stream.get("Height").is_some() =>
            {
                self.device
                    .begin_figure(name, (0.0, 0.0, 1.0, 1.0), Matrix::identity());
                self.device.render_image(name, stream);
                self.device.end_figure(name);
            },
            other => {
                log::warn!("unsupported XObject subtype {:?}", other);
            },
        }
        Ok(())
    }
}

fn bbox_of(arr: &[Object]) -> (f32, f32, f32, f32) {
    let v = |i: usize| arr.get(i).and_then(|o| o.as_number()).unwrap_or(0.0) as f32;
    (v(0), v(1), v(2), v(3))
}

fn matrix_of(arr: &[Object]) -> Matrix {
    let v = |i: usize| arr.get(i).and_then(|o| o.as_number()).unwrap_or(0.0) as f32;
    Matrix::new(v(0), v(1), v(2), v(3), v(4), v(5))
}

/// Convert a `TJ` operand into text items; non-string non-number entries
/// are dropped.
fn text_items(obj: &Object) -> Vec<TextItem> {
    match obj {
        Object::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Object::String(s) => Some(TextItem::Text(s.clone())),
                Object::Integer(n) => Some(TextItem::Adjustment(*n as f32)),
                Object::Real(r) => Some(TextItem::Adjustment(*r as f32)),
                _ => None,
            })
            .collect(),
        Object::String(s) => vec![TextItem::Text(s.clone())],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingDevice {
        ops: Vec<String>,
        ctms: Vec<Matrix>,
        paths: Vec<Vec<PathSegment>>,
    }

    impl Device for RecordingDevice {
        fn set_ctm(&mut self, ctm: Matrix) {
            self.ctms.push(ctm);
        }
        fn begin_page(&mut self, _page: &Page, _ctm: Matrix) {
            self.ops.push("begin_page".to_string());
        }
        fn end_page(&mut self, _page: &Page) {
            self.ops.push("end_page".to_string());
        }
        fn paint_path(
            &mut self,
            _gstate: &GraphicsState,
            stroke: bool,
            _fill: bool,
            _even_odd: bool,
            path: &[PathSegment],
        ) {
            self.ops.push(format!("paint stroke={}", stroke));
            self.paths.push(path.to_vec());
        }
        fn render_string(&mut self, _textstate: &mut TextState, seq: &[TextItem]) {
            self.ops.push(format!("render_string {}", seq.len()));
        }
        fn begin_tag(&mut self, tag: &str, _props: Option<&Dict>) {
            self.ops.push(format!("begin_tag {}", tag));
        }
        fn end_tag(&mut self) {
            self.ops.push("end_tag".to_string());
        }
    }

    fn run_content(content: &[u8]) -> RecordingDevice {
        let pdf = crate::document::testutil::minimal_pdf(content);
        let doc = Document::new(pdf).unwrap();
        let page = doc.pages().next().unwrap();
        let mut rsrcmgr = ResourceManager::new();
        let mut device = RecordingDevice::default();
        Interpreter::new(&mut rsrcmgr, &mut device, &doc)
            .process_page(&page)
            .unwrap();
        device
    }

    #[test]
    fn test_page_rotation_ctms() {
        let page_ctm = |rotate: i32| {
            let mediabox = (10.0f32, 20.0f32, 610.0f32, 790.0f32);
            let (x0, y0, x1, y1) = mediabox;
            match rotate {
                90 => Matrix::new(0.0, -1.0, 1.0, 0.0, -y0, x1),
                180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, x1, y1),
                270 => Matrix::new(0.0, 1.0, -1.0, 0.0, y1, -x0),
                _ => Matrix::new(1.0, 0.0, 0.0, 1.0, -x0, -y0),
            }
        };
        assert_eq!(page_ctm(0).apply_pt(10.0, 20.0), (0.0, 0.0));
        assert_eq!(page_ctm(180).apply_pt(10.0, 20.0), (600.0, 770.0));
        assert_eq!(page_ctm(90).apply_pt(10.0, 20.0), (0.0, 600.0));
        assert_eq!(page_ctm(270).apply_pt(10.0, 20.0), (790.0, -20.0));
    }

    #[test]
    fn test_text_showing_reaches_device() {
        let device = run_content(b"BT /F1 12 Tf 72 720 Td (AB) Tj ET");
        assert!(device.ops.contains(&"render_string 1".to_string()));
    }

    #[test]
    fn test_rect_path_painted() {
        let device = run_content(b"1 w 10 10 100 50 re S");
        assert_eq!(device.paths.len(), 1);
        assert_eq!(device.paths[0].len(), 5);
        assert_eq!(device.paths[0][0], PathSegment::Move(10.0, 10.0));
        assert_eq!(device.paths[0][4], PathSegment::Close);
    }

    #[test]
    fn test_insufficient_operands_skip_operator() {
        // `re` needs four operands; the malformed one is skipped and the
        // stream continues.
        let device = run_content(b"10 10 re BT /F1 12 Tf (x) Tj ET");
        assert!(device.paths.is_empty());
        assert!(device.ops.iter().any(|o| o.starts_with("render_string")));
    }

    #[test]
    fn test_unknown_operator_does_not_abort() {
        let device = run_content(b"frobnicate BT /F1 8 Tf (x) Tj ET");
        assert!(device.ops.iter().any(|o| o.starts_with("render_string")));
    }

    #[test]
    fn test_q_restores_ctm() {
        let device = run_content(b"q 2 0 0 2 0 0 cm Q");
        // set_ctm calls: initial, after cm, after Q (restored).
        let n = device.ctms.len();
        assert!(n >= 3);
        assert_eq!(device.ctms[n - 1], device.ctms[n - 3]);
    }

    #[test]
    fn test_marked_content_tags() {
        let device = run_content(b"/P BMC EMC");
        assert!(device.ops.contains(&"begin_tag P".to_string()));
        assert!(device.ops.contains(&"end_tag".to_string()));
    }

    #[test]
    fn test_text_items_mixed_array() {
        let arr = Object::Array(vec![
            Object::String(b"A".to_vec()),
            Object::Integer(-120),
            Object::String(b"B".to_vec()),
            Object::Null,
        ]);
        let items = text_items(&arr);
        assert_eq!(items.len(), 3);
        assert!(matches!(items[1], TextItem::Adjustment(a) if a == -120.0));
    }
}
