//! The layout-aggregating device.
//!
//! [`PageAggregator`] implements [`Device`], records every primitive the
//! interpreter emits into a [`LayoutPage`], and runs layout analysis when
//! the page ends. It also implements the text-showing pen movement: `TJ`
//! adjustments, character/word spacing and glyph advances, producing one
//! positioned [`Char`] per CID.

use std::rc::Rc;

use crate::content::{GraphicsState, Matrix, PathSegment, TextState};
use crate::device::{Device, TextItem};
use crate::document::Page;
use crate::fonts::Font;
use crate::geometry::Bounds;
use crate::layout::{
    Char, Figure, ImageItem, LAParams, LayoutItem, LayoutPage, PathItem, ShapeKind,
};
use crate::object::{Dict, Stream};

/// Device that aggregates interpreted content into a layout page.
pub struct PageAggregator {
    laparams: Option<LAParams>,
    ctm: Matrix,
    cur_page: Option<LayoutPage>,
    figure_stack: Vec<Figure>,
    result: Option<LayoutPage>,
}

impl PageAggregator {
    /// Create an aggregator; pass layout parameters to run the analysis
    /// at page end, or `None` to keep primitives in emission order.
    pub fn new(laparams: Option<LAParams>) -> Self {
        Self {
            laparams,
            ctm: Matrix::identity(),
            cur_page: None,
            figure_stack: Vec::new(),
            result: None,
        }
    }

    /// The finished page from the last `end_page`, if any.
    pub fn take_result(&mut self) -> Option<LayoutPage> {
        self.result.take()
    }

    fn add_item(&mut self, item: LayoutItem) {
        if let Some(figure) = self.figure_stack.last_mut() {
            figure.items.push(item);
        } else if let Some(page) = self.cur_page.as_mut() {
            page.items.push(item);
        } else {
            log::warn!("layout item emitted outside a page");
        }
    }

    fn current_bbox(&self) -> Bounds {
        if let Some(figure) = self.figure_stack.last() {
            figure.bbox
        } else if let Some(page) = self.cur_page.as_ref() {
            page.bbox
        } else {
            Bounds::new(0.0, 0.0, 1.0, 1.0)
        }
    }

    /// Place one glyph and return its advance in text space.
    #[allow(clippy::too_many_arguments)]
    fn render_char(
        &mut self,
        matrix: Matrix,
        font: &Rc<dyn Font>,
        fontsize: f32,
        scaling: f32,
        rise: f32,
        cid: u32,
    ) -> f32 {
        let text = match font.to_unichr(cid) {
            Ok(text) => text,
            Err(e) => {
                log::debug!("{} in font {}", e, font.fontname());
                format!("(cid:{})", cid)
            },
        };
        let textwidth = font.char_width(cid);
        let textdisp = font.char_disp(cid);
        let item = Char::new(
            matrix,
            font.as_ref(),
            fontsize,
            scaling,
            rise,
            text,
            textwidth,
            textdisp,
        );
        let adv = item.adv;
        self.add_item(LayoutItem::Char(item));
        adv
    }

    #[allow(clippy::too_many_arguments)]
    fn render_horizontal(
        &mut self,
        seq: &[TextItem],
        matrix: Matrix,
        mut point: (f32, f32),
        font: &Rc<dyn Font>,
        fontsize: f32,
        scaling: f32,
        charspace: f32,
        wordspace: f32,
        rise: f32,
        dxscale: f32,
    ) -> (f32, f32) {
        let mut needcharspace = false;
        for item in seq {
            match item {
                TextItem::Adjustment(n) => {
                    point.0 -= n * dxscale;
                    needcharspace = true;
                },
                TextItem::Text(bytes) => {
                    for cid in font.decode(bytes) {
                        if needcharspace {
                            point.0 += charspace;
                        }
                        point.0 += self.render_char(
                            matrix.translated(point.0, point.1),
                            font,
                            fontsize,
                            scaling,
                            rise,
                            cid,
                        );
                        if cid == 32 && wordspace != 0.0 {
                            point.0 += wordspace;
                        }
                        needcharspace = true;
                    }
                },
            }
        }
        point
    }

    #[allow(clippy::too_many_arguments)]
    fn render_vertical(
        &mut self,
        seq: &[TextItem],
        matrix: Matrix,
        mut point: (f32, f32),
        font: &Rc<dyn Font>,
        fontsize: f32,
        scaling: f32,
        charspace: f32,
        wordspace: f32,
        rise: f32,
        dxscale: f32,
    ) -> (f32, f32) {
        let mut needcharspace = false;
        for item in seq {
            match item {
                TextItem::Adjustment(n) => {
                    point.1 -= n * dxscale;
                    needcharspace = true;
                },
                TextItem::Text(bytes) => {
                    for cid in font.decode(bytes) {
                        if needcharspace {
                            point.1 += charspace;
                        }
                        point.1 += self.render_char(
                            matrix.translated(point.0, point.1),
                            font,
                            fontsize,
                            scaling,
                            rise,
                            cid,
                        );
                        if cid == 32 && wordspace != 0.0 {
                            point.1 += wordspace;
                        }
                        needcharspace = true;
                    }
                },
            }
        }
        point
    }
}

impl Device for PageAggregator {
    fn set_ctm(&mut self, ctm: Matrix) {
        self.ctm = ctm;
    }

    fn begin_page(&mut self, page: &Page, ctm: Matrix) {
        let (x0, y0, x1, y1) = page.mediabox;
        let (tx0, ty0) = ctm.apply_pt(x0, y0);
        let (tx1, ty1) = ctm.apply_pt(x1, y1);
        let bbox = Bounds::new(0.0, 0.0, (tx1 - tx0).abs(), (ty1 - ty0).abs());
        self.cur_page = Some(LayoutPage {
            id: page.id,
            bbox,
            rotate: page.rotate,
            items: Vec::new(),
            groups: Vec::new(),
        });
    }

    fn end_page(&mut self, _page: &Page) {
        if !self.figure_stack.is_empty() {
            log::warn!("page ended with {} open figures", self.figure_stack.len());
            while let Some(figure) = self.figure_stack.pop() {
                self.add_item(LayoutItem::Figure(figure));
            }
        }
        if let Some(mut page) = self.cur_page.take() {
            if let Some(laparams) = &self.laparams {
                page.analyze(laparams);
            }
            self.result = Some(page);
        }
    }

    fn begin_figure(&mut self, name: &str, bbox: (f32, f32, f32, f32), matrix: Matrix) {
        self.figure_stack
            .push(Figure::new(name, bbox, matrix.multiply(&self.ctm)));
    }

    fn end_figure(&mut self, _name: &str) {
        match self.figure_stack.pop() {
            Some(figure) => self.add_item(LayoutItem::Figure(figure)),
            None => log::warn!("end_figure with no open figure"),
        }
    }

    fn render_image(&mut self, name: &str, stream: &Stream) {
        let bbox = self.current_bbox();
        self.add_item(LayoutItem::Image(ImageItem::new(name, stream, bbox)));
    }

    fn paint_path(
        &mut self,
        gstate: &GraphicsState,
        _stroke: bool,
        _fill: bool,
        _even_odd: bool,
        path: &[PathSegment],
    ) {
        let shape: String = path
            .iter()
            .map(|seg| match seg {
                PathSegment::Move(..) => 'm',
                PathSegment::Line(..) => 'l',
                PathSegment::Curve(..) | PathSegment::CurveV(..) | PathSegment::CurveY(..) => 'c',
                PathSegment::Close => 'h',
            })
            .collect();
        let ctm = self.ctm;
        let pt = move |x: f32, y: f32| ctm.apply_pt(x, y);

        if shape == "ml" {
            if let (PathSegment::Move(ax, ay), PathSegment::Line(bx, by)) = (&path[0], &path[1]) {
                let p0 = pt(*ax, *ay);
                let p1 = pt(*bx, *by);
                if p0.0 == p1.0 || p0.1 == p1.1 {
                    self.add_item(LayoutItem::Path(PathItem::new(
                        ShapeKind::Line,
                        gstate.linewidth,
                        vec![p0, p1],
                    )));
                    return;
                }
            }
        }
        if shape == "mlllh" {
            let mut corners = Vec::with_capacity(4);
            for seg in &path[..4] {
                match seg {
                    PathSegment::Move(x, y) | PathSegment::Line(x, y) => corners.push(pt(*x, *y)),
                    _ => {},
                }
            }
            if corners.len() == 4 {
                let [(x0, y0), (x1, y1), (x2, y2), (x3, y3)] =
                    [corners[0], corners[1], corners[2], corners[3]];
                let right_angled = (x0 == x1 && y1 == y2 && x2 == x3 && y3 == y0)
                    || (y0 == y1 && x1 == x2 && y2 == y3 && x3 == x0);
                if right_angled {
                    self.add_item(LayoutItem::Path(PathItem::new(
                        ShapeKind::Rect,
                        gstate.linewidth,
                        corners,
                    )));
                    return;
                }
            }
        }
        // Any other shape: keep all the points, control points included.
        let mut pts = Vec::new();
        for seg in path {
            match seg {
                PathSegment::Move(x, y) | PathSegment::Line(x, y) => pts.push(pt(*x, *y)),
                PathSegment::Curve(x1, y1, x2, y2, x3, y3) => {
                    pts.push(pt(*x1, *y1));
                    pts.push(pt(*x2, *y2));
                    pts.push(pt(*x3, *y3));
                },
                PathSegment::CurveV(x2, y2, x3, y3) | PathSegment::CurveY(x2, y2, x3, y3) => {
                    pts.push(pt(*x2, *y2));
                    pts.push(pt(*x3, *y3));
                },
                PathSegment::Close => {},
            }
        }
        if !pts.is_empty() {
            self.add_item(LayoutItem::Path(PathItem::new(
                ShapeKind::Curve,
                gstate.linewidth,
                pts,
            )));
        }
    }

    fn render_string(&mut self, textstate: &mut TextState, seq: &[TextItem]) {
        let Some(font) = textstate.font.clone() else {
            return;
        };
        let matrix = textstate.matrix.multiply(&self.ctm);
        let fontsize = textstate.fontsize;
        let scaling = textstate.scaling * 0.01;
        let charspace = textstate.charspace * scaling;
        let mut wordspace = textstate.wordspace * scaling;
        let rise = textstate.rise;
        if font.is_multibyte() {
            // Word spacing applies to single-byte code 32 only.
            wordspace = 0.0;
        }
        let dxscale = 0.001 * fontsize * scaling;
        textstate.linematrix = if font.is_vertical() {
            self.render_vertical(
                seq,
                matrix,
                textstate.linematrix,
                &font,
                fontsize,
                scaling,
                charspace,
                wordspace,
                rise,
                dxscale,
            )
        } else {
            self.render_horizontal(
                seq,
                matrix,
                textstate.linematrix,
                &font,
                fontsize,
                scaling,
                charspace,
                wordspace,
                rise,
                dxscale,
            )
        };
    }

    fn begin_tag(&mut self, _tag: &str, _props: Option<&Dict>) {}
    fn end_tag(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Interpreter;
    use crate::document::testutil::minimal_pdf;
    use crate::document::Document;
    use crate::fonts::ResourceManager;

    fn layout_for(content: &[u8], laparams: Option<LAParams>) -> LayoutPage {
        let pdf = minimal_pdf(content);
        let doc = Document::new(pdf).unwrap();
        let page = doc.pages().next().unwrap();
        let mut rsrcmgr = ResourceManager::new();
        let mut aggregator = PageAggregator::new(laparams);
        Interpreter::new(&mut rsrcmgr, &mut aggregator, &doc)
            .process_page(&page)
            .unwrap();
        aggregator.take_result().unwrap()
    }

    #[test]
    fn test_hello_world_single_textbox() {
        let page = layout_for(
            b"BT /F1 12 Tf 72 720 Td (Hello World) Tj ET",
            Some(LAParams::default()),
        );
        let boxes: Vec<_> = page.textboxes().collect();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].get_text(), "Hello World\n");
        assert_eq!(page.get_text(), "Hello World\n");
    }

    #[test]
    fn test_char_positions_and_advance() {
        // The fixture font declares every glyph 500/1000 wide; at 12pt the
        // second glyph starts at 72 + 0.5 * 12.
        let page = layout_for(b"BT /F1 12 Tf 72 720 Td (AB) Tj ET", None);
        let chars: Vec<&Char> = page
            .items
            .iter()
            .filter_map(|i| match i {
                LayoutItem::Char(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(chars.len(), 2);
        assert!((chars[0].bbox.x0 - 72.0).abs() < 0.01);
        assert!((chars[1].bbox.x0 - (72.0 + 0.5 * 12.0)).abs() < 0.01);
        assert_eq!(chars[0].text, "A");
        assert_eq!(chars[1].text, "B");
        assert!(chars[0].upright);
    }

    #[test]
    fn test_tj_adjustment_moves_pen() {
        // A -1000 adjustment at 12pt moves the pen 12 units right-to-left.
        let page = layout_for(b"BT /F1 12 Tf 72 720 Td [(A) -1000 (B)] TJ ET", None);
        let chars: Vec<&Char> = page
            .items
            .iter()
            .filter_map(|i| match i {
                LayoutItem::Char(c) => Some(c),
                _ => None,
            })
            .collect();
        let expected = 72.0 + 0.5 * 12.0 + 12.0;
        assert!((chars[1].bbox.x0 - expected).abs() < 0.01);
    }

    #[test]
    fn test_line_painted_as_line_item() {
        let page = layout_for(b"1 w 10 10 m 10 100 l S", None);
        let paths: Vec<&PathItem> = page
            .items
            .iter()
            .filter_map(|i| match i {
                LayoutItem::Path(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].kind, ShapeKind::Line);
        assert_eq!(paths[0].linewidth, 1.0);
    }

    #[test]
    fn test_rect_classified() {
        let page = layout_for(b"10 10 100 50 re S", None);
        let paths: Vec<&PathItem> = page
            .items
            .iter()
            .filter_map(|i| match i {
                LayoutItem::Path(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(paths[0].kind, ShapeKind::Rect);
        assert_eq!(paths[0].bbox, Bounds::new(10.0, 10.0, 110.0, 60.0));
    }

    #[test]
    fn test_diagonal_is_curve() {
        let page = layout_for(b"10 10 m 100 100 l S", None);
        let paths: Vec<&PathItem> = page
            .items
            .iter()
            .filter_map(|i| match i {
                LayoutItem::Path(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(paths[0].kind, ShapeKind::Curve);
    }

    #[test]
    fn test_inline_image_figure() {
        let page = layout_for(b"BI /W 1 /H 1 /BPC 8 ID x EI", None);
        let figures: Vec<&Figure> = page
            .items
            .iter()
            .filter_map(|i| match i {
                LayoutItem::Figure(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(figures.len(), 1);
        assert!(matches!(figures[0].items[0], LayoutItem::Image(_)));
    }

    #[test]
    fn test_word_spacing_applies_to_space_code() {
        let page = layout_for(b"BT /F1 10 Tf 5 Tw 0 0 Td (a b) Tj ET", None);
        let chars: Vec<&Char> = page
            .items
            .iter()
            .filter_map(|i| match i {
                LayoutItem::Char(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(chars.len(), 3);
        // Every glyph advances 500/1000 * 10pt = 5; the space code adds
        // the 5pt word spacing on top of its own advance.
        let a_end = chars[0].bbox.x0 + 5.0;
        assert!((chars[1].bbox.x0 - a_end).abs() < 0.01);
        let b_start = a_end + 5.0 + 5.0;
        assert!((chars[2].bbox.x0 - b_start).abs() < 0.01);
    }
}
