//! Layout analysis: positioned primitives and their clustering.
//!
//! The interpreter emits flat, positioned primitives (characters, paths,
//! images); the layout engine groups characters into lines, lines into
//! text boxes, and text boxes into reading-order groups. Tunables live in
//! [`LAParams`]; all of them are dimensionless ratios except
//! `paragraph_indent`, a user-space length.

mod aggregator;
mod analysis;
mod plane;

pub use aggregator::PageAggregator;
pub use plane::Plane;

use crate::content::Matrix;
use crate::fonts::Font;
use crate::geometry::{bounds_of_points, Bounds};
use crate::object::Stream;
use crate::utils::safe_float_cmp;

/// Layout analysis parameters.
#[derive(Debug, Clone)]
pub struct LAParams {
    /// Minimum vertical overlap ratio for two characters to share a line
    pub line_overlap: f32,
    /// Maximum gap between characters, as a ratio of their width
    pub char_margin: f32,
    /// Line proximity ratio for grouping lines into boxes
    pub line_margin: f32,
    /// Gap ratio above which a space is synthesized between characters
    pub word_margin: f32,
    /// Blend factor between horizontal and vertical order when sorting
    /// groups (-1.0 .. 1.0)
    pub boxes_flow: f32,
    /// Also detect vertical writing
    pub detect_vertical: bool,
    /// Analyze text inside figures too
    pub all_texts: bool,
    /// When set, split horizontal boxes into paragraphs at lines indented
    /// beyond this user-space length
    pub paragraph_indent: Option<f32>,
    /// Multiply `word_margin` by 5 on lines that already contain explicit
    /// spaces, suppressing spurious inserted spaces
    pub heuristic_word_margin: bool,
}

impl Default for LAParams {
    fn default() -> Self {
        Self {
            line_overlap: 0.5,
            char_margin: 2.0,
            line_margin: 0.5,
            word_margin: 0.1,
            boxes_flow: 0.5,
            detect_vertical: false,
            all_texts: false,
            paragraph_indent: None,
            heuristic_word_margin: false,
        }
    }
}

/// Writing direction of a line or box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    /// Left-to-right lines
    Horizontal,
    /// Top-to-bottom lines
    Vertical,
}

/// A positioned character.
#[derive(Debug, Clone)]
pub struct Char {
    /// Bounding box in page space
    pub bbox: Bounds,
    /// Rendering matrix the glyph was placed with
    pub matrix: Matrix,
    /// Name of the font that drew it
    pub fontname: String,
    /// Unicode text (possibly a `(cid:N)` placeholder)
    pub text: String,
    /// Advance in page space
    pub adv: f32,
    /// Character size along the reading direction
    pub size: f32,
    /// Whether the glyph is upright (no rotation/mirroring)
    pub upright: bool,
}

impl Char {
    /// Place a glyph: computes the page-space bounding box from the font
    /// metrics and the rendering matrix.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        matrix: Matrix,
        font: &dyn Font,
        fontsize: f32,
        scaling: f32,
        rise: f32,
        text: String,
        textwidth: f32,
        textdisp: (Option<f32>, f32),
    ) -> Char {
        let adv = textwidth * fontsize * scaling;
        let (bll, bur) = if font.is_vertical() {
            let width = font.get_width() * fontsize;
            let (vx, vy) = textdisp;
            let vx = match vx {
                Some(vx) => vx * fontsize * 0.001,
                None => width / 2.0,
            };
            let vy = (1000.0 - vy) * fontsize * 0.001;
            let tx = -vx;
            let ty = vy + rise;
            ((tx, ty + adv), (tx + width, ty))
        } else {
            let height = font.get_height() * fontsize;
            let descent = font.get_descent() * fontsize;
            let ty = descent + rise;
            ((0.0, ty), (adv, ty + height))
        };
        let upright = 0.0 < matrix.a * matrix.d * scaling && matrix.b * matrix.c <= 0.0;
        let (x0, y0) = matrix.apply_pt(bll.0, bll.1);
        let (x1, y1) = matrix.apply_pt(bur.0, bur.1);
        let bbox = Bounds::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1));
        let size = if font.is_vertical() {
            bbox.width()
        } else {
            bbox.height()
        };
        Char {
            bbox,
            matrix,
            fontname: font.fontname().to_string(),
            text,
            adv,
            size,
            upright,
        }
    }
}

/// One element of a text line: a real character or a synthesized marker.
#[derive(Debug, Clone)]
pub enum LineItem {
    /// A character from the page
    Char(Char),
    /// A synthesized space or newline
    Anon(&'static str),
}

impl LineItem {
    /// The text this item contributes.
    pub fn text(&self) -> &str {
        match self {
            LineItem::Char(c) => &c.text,
            LineItem::Anon(s) => s,
        }
    }
}

/// A sequence of characters reading in one direction.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// Writing direction
    pub dir: Dir,
    /// Bounding box (characters only, markers excluded)
    pub bbox: Bounds,
    items: Vec<LineItem>,
}

impl TextLine {
    pub(crate) fn new(dir: Dir) -> Self {
        Self {
            dir,
            bbox: Bounds::empty(),
            items: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, ch: Char) {
        self.bbox.expand(&ch.bbox);
        self.items.push(LineItem::Char(ch));
    }

    /// The line's items in reading order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Concatenated text, including synthesized spaces and the trailing
    /// newline (after analysis).
    pub fn get_text(&self) -> String {
        self.items.iter().map(LineItem::text).collect()
    }

    /// A line that covers no area or carries only whitespace.
    ///
    /// Empty lines are excluded from textbox grouping so a box is never
    /// glued together across a blank line.
    pub fn is_empty(&self) -> bool {
        self.bbox.is_empty() || self.get_text().trim().is_empty()
    }

    /// The median character height (width for vertical lines is not
    /// distinguished here; heights are what box grouping compares).
    pub fn median_charheight(&self) -> f32 {
        let mut heights: Vec<f32> = self
            .items
            .iter()
            .filter_map(|item| match item {
                LineItem::Char(c) => Some(c.bbox.height()),
                LineItem::Anon(_) => None,
            })
            .collect();
        if heights.is_empty() {
            return 0.0;
        }
        heights.sort_by(|a, b| safe_float_cmp(*a, *b));
        heights[heights.len() / 2]
    }

    /// Insert word-gap spaces and the trailing newline marker.
    pub(crate) fn analyze(&mut self, laparams: &LAParams) {
        let mut word_margin = laparams.word_margin;
        if laparams.heuristic_word_margin
            && self.items.iter().any(|item| item.text() == " ")
        {
            word_margin *= 5.0;
        }
        if word_margin > 0.0 {
            self.insert_anon_spaces(word_margin);
        }
        self.items.push(LineItem::Anon("\n"));
    }

    fn insert_anon_spaces(&mut self, word_margin: f32) {
        let mut insert_at = Vec::new();
        for i in 1..self.items.len() {
            let (LineItem::Char(prev), LineItem::Char(cur)) =
                (&self.items[i - 1], &self.items[i])
            else {
                continue;
            };
            match self.dir {
                Dir::Horizontal => {
                    if prev.text == " " || cur.text == " " {
                        continue;
                    }
                    let margin = word_margin * cur.bbox.width();
                    if prev.bbox.x1 < cur.bbox.x0 - margin {
                        insert_at.push(i);
                    }
                },
                Dir::Vertical => {
                    let margin = word_margin * cur.bbox.height();
                    if cur.bbox.y1 + margin < prev.bbox.y0 {
                        insert_at.push(i);
                    }
                },
            }
        }
        for pos in insert_at.into_iter().rev() {
            self.items.insert(pos, LineItem::Anon(" "));
        }
    }
}

/// A cluster of text lines occupying a rectangular region.
#[derive(Debug, Clone)]
pub struct TextBox {
    /// Writing direction
    pub dir: Dir,
    /// Bounding box
    pub bbox: Bounds,
    /// Reading-order index, assigned after grouping
    pub index: Option<usize>,
    lines: Vec<TextLine>,
}

impl TextBox {
    pub(crate) fn new(dir: Dir) -> Self {
        Self {
            dir,
            bbox: Bounds::empty(),
            index: None,
            lines: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, line: TextLine) {
        self.bbox.expand(&line.bbox);
        self.lines.push(line);
    }

    /// The lines of this box in reading order (after analysis).
    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    /// Concatenated text of all lines.
    pub fn get_text(&self) -> String {
        self.lines.iter().map(TextLine::get_text).collect()
    }

    fn avg_lineheight(&self) -> f32 {
        if self.lines.is_empty() {
            return 0.0;
        }
        self.lines.iter().map(|l| l.bbox.height()).sum::<f32>() / self.lines.len() as f32
    }

    pub(crate) fn analyze(&mut self, laparams: &LAParams) {
        for line in &mut self.lines {
            line.analyze(laparams);
        }
        self.sort_lines();
    }

    fn sort_lines(&mut self) {
        match self.dir {
            Dir::Horizontal => {
                let avg = self.avg_lineheight();
                let bbox = self.bbox;
                self.lines.sort_by(|a, b| {
                    let (ax, ag) = grid_pos(&bbox, a, avg);
                    let (bx, bg) = grid_pos(&bbox, b, avg);
                    ag.cmp(&bg).then_with(|| safe_float_cmp(ax, bx))
                });
            },
            Dir::Vertical => {
                self.lines
                    .sort_by(|a, b| safe_float_cmp(b.bbox.x1, a.bbox.x1));
            },
        }
    }

    /// Split into paragraphs at indentation changes.
    ///
    /// Boxes of five lines or fewer are left alone, so a centered title
    /// with ragged line starts is never shredded into "paragraphs".
    pub(crate) fn paragraphs(mut self, indent_threshold: f32) -> Vec<TextBox> {
        if self.lines.len() <= 5 {
            return vec![self];
        }
        self.sort_lines();
        let avg = self.avg_lineheight();
        let bbox = self.bbox;
        let dir = self.dir;
        let mut paragraphs: Vec<TextBox> = Vec::new();
        let mut current = TextBox::new(dir);
        let mut prev_gridy: Option<i64> = None;
        let mut was_indented = false;
        for line in self.lines {
            let (x, gridy) = grid_pos(&bbox, &line, avg);
            if Some(gridy) != prev_gridy {
                let is_indented = x > indent_threshold;
                if is_indented && !was_indented && current.lines.len() > 1 {
                    paragraphs.push(current);
                    current = TextBox::new(dir);
                }
                was_indented = is_indented;
                prev_gridy = Some(gridy);
            }
            current.add(line);
        }
        if !current.lines.is_empty() {
            paragraphs.push(current);
        }
        paragraphs
    }
}

/// Position of a line within a box: x relative to the left edge and the
/// top-relative y snapped to a grid of half the average line height.
///
/// Lines that sit almost on the same baseline can differ slightly in y;
/// snapping makes them compare equal so the x tie-break applies.
fn grid_pos(box_bbox: &Bounds, line: &TextLine, avg_lineheight: f32) -> (f32, i64) {
    let x = line.bbox.x0 - box_bbox.x0;
    let y = box_bbox.y1 - line.bbox.y1;
    let half = avg_lineheight / 2.0;
    let gridy = if half > 0.0 { (y / half).round() as i64 } else { 0 };
    (x, gridy)
}

/// Reading-order grouping of text boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Left-to-right, top-to-bottom flow
    Lrtb,
    /// Top-to-bottom, right-to-left flow (vertical writing)
    Tbrl,
}

/// A node of the reading-order tree. Leaves index into the analyzed
/// container's text boxes (`TextBox::index`).
#[derive(Debug, Clone)]
pub enum GroupNode {
    /// A text box, by reading-order index
    Boxed(usize),
    /// A binary (or post-guard n-ary) grouping
    Group {
        /// Flow direction of the group
        kind: GroupKind,
        /// Bounding box of everything beneath
        bbox: Bounds,
        /// Children in reading order
        children: Vec<GroupNode>,
    },
}

/// Kind of a painted shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// An axis-aligned straight line
    Line,
    /// An axis-aligned rectangle
    Rect,
    /// Anything else
    Curve,
}

/// A painted path, reduced to its points.
#[derive(Debug, Clone)]
pub struct PathItem {
    /// Shape classification
    pub kind: ShapeKind,
    /// Bounding box of the points
    pub bbox: Bounds,
    /// Stroking line width
    pub linewidth: f32,
    /// The path points in page space
    pub pts: Vec<(f32, f32)>,
}

impl PathItem {
    pub(crate) fn new(kind: ShapeKind, linewidth: f32, pts: Vec<(f32, f32)>) -> Self {
        Self {
            kind,
            bbox: bounds_of_points(pts.iter().copied()),
            linewidth,
            pts,
        }
    }
}

/// A placed image.
#[derive(Debug, Clone)]
pub struct ImageItem {
    /// Name of the XObject (or a synthetic inline-image name)
    pub name: String,
    /// Placement bounds in page space
    pub bbox: Bounds,
    /// Source pixel dimensions
    pub srcsize: (Option<i64>, Option<i64>),
    /// Whether the image is a stencil mask
    pub imagemask: bool,
    /// Bits per component
    pub bits: i64,
    /// Color-space names attached to the image
    pub colorspace: Vec<String>,
    /// The raw image stream
    pub stream: Stream,
}

impl ImageItem {
    pub(crate) fn new(name: &str, stream: &Stream, bbox: Bounds) -> Self {
        let int_of = |keys: &[&str]| stream.get_any(keys).and_then(|o| o.as_integer());
        let colorspace = match stream.get_any(&["CS", "ColorSpace"]) {
            Some(obj) => match obj.as_array() {
                Some(arr) => arr.iter().filter_map(|o| o.as_name().map(str::to_string)).collect(),
                None => obj.as_name().map(str::to_string).into_iter().collect(),
            },
            None => Vec::new(),
        };
        ImageItem {
            name: name.to_string(),
            bbox,
            srcsize: (int_of(&["W", "Width"]), int_of(&["H", "Height"])),
            imagemask: stream
                .get_any(&["IM", "ImageMask"])
                .and_then(|o| o.as_bool())
                .unwrap_or(false),
            bits: int_of(&["BPC", "BitsPerComponent"]).unwrap_or(1),
            colorspace,
            stream: stream.clone(),
        }
    }
}

/// A form XObject scope with its own coordinate system.
#[derive(Debug, Clone)]
pub struct Figure {
    /// XObject name
    pub name: String,
    /// Bounding box in page space
    pub bbox: Bounds,
    /// The form matrix composed with the CTM at invocation
    pub matrix: Matrix,
    /// Contained primitives (analyzed in place when `all_texts` is set)
    pub items: Vec<LayoutItem>,
    /// Reading-order groups of the contained text (when analyzed)
    pub groups: Vec<GroupNode>,
}

impl Figure {
    pub(crate) fn new(name: &str, bbox: (f32, f32, f32, f32), matrix: Matrix) -> Self {
        let (x0, y0, x1, y1) = bbox;
        let corners = [(x0, y0), (x1, y0), (x0, y1), (x1, y1)];
        let bbox = bounds_of_points(corners.iter().map(|&(x, y)| matrix.apply_pt(x, y)));
        Figure {
            name: name.to_string(),
            bbox,
            matrix,
            items: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub(crate) fn analyze(&mut self, laparams: &LAParams) {
        if !laparams.all_texts {
            return;
        }
        let items = std::mem::take(&mut self.items);
        let (items, groups) = analysis::analyze_container(items, laparams);
        self.items = items;
        self.groups = groups;
    }
}

/// Any primitive living in a page or figure.
#[derive(Debug, Clone)]
pub enum LayoutItem {
    /// A positioned character (before analysis)
    Char(Char),
    /// A painted path
    Path(PathItem),
    /// A placed image
    Image(ImageItem),
    /// A nested figure
    Figure(Figure),
    /// A text box (after analysis)
    TextBox(TextBox),
    /// A whitespace-only line kept out of box grouping
    TextLine(TextLine),
}

impl LayoutItem {
    /// The item's bounding box.
    pub fn bbox(&self) -> Bounds {
        match self {
            LayoutItem::Char(c) => c.bbox,
            LayoutItem::Path(p) => p.bbox,
            LayoutItem::Image(i) => i.bbox,
            LayoutItem::Figure(f) => f.bbox,
            LayoutItem::TextBox(b) => b.bbox,
            LayoutItem::TextLine(l) => l.bbox,
        }
    }
}

/// The analyzed layout of one page.
#[derive(Debug, Clone)]
pub struct LayoutPage {
    /// Page object id
    pub id: u32,
    /// Page bounds, normalized to start at the origin
    pub bbox: Bounds,
    /// Page rotation
    pub rotate: i32,
    /// Text boxes (in reading order once analyzed), then other items
    pub items: Vec<LayoutItem>,
    /// The reading-order group tree over the text boxes
    pub groups: Vec<GroupNode>,
}

impl LayoutPage {
    /// Run layout analysis: characters to lines to boxes to groups.
    pub fn analyze(&mut self, laparams: &LAParams) {
        let items = std::mem::take(&mut self.items);
        let (items, groups) = analysis::analyze_container(items, laparams);
        self.items = items;
        self.groups = groups;
    }

    /// The text boxes of the page in item order.
    pub fn textboxes(&self) -> impl Iterator<Item = &TextBox> {
        self.items.iter().filter_map(|item| match item {
            LayoutItem::TextBox(b) => Some(b),
            _ => None,
        })
    }

    /// All text on the page, box by box.
    pub fn get_text(&self) -> String {
        self.textboxes().map(TextBox::get_text).collect()
    }
}
