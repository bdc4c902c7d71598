//! The device interface.
//!
//! The interpreter drives a [`Device`]: every consumer of page content
//! (layout aggregation, tag extraction, debugging dumps) implements this
//! capability set. All methods default to no-ops so a device only
//! implements what it cares about.

use crate::content::{GraphicsState, Matrix, PathSegment, TextState};
use crate::document::Page;
use crate::object::{Dict, Stream};

/// One element of a text-showing sequence (the `TJ` array).
#[derive(Debug, Clone)]
pub enum TextItem {
    /// A position adjustment in thousandths of text space
    Adjustment(f32),
    /// Encoded string bytes to show
    Text(Vec<u8>),
}

/// Consumer interface for interpreted page content.
#[allow(unused_variables)]
pub trait Device {
    /// The current transformation matrix changed.
    fn set_ctm(&mut self, ctm: Matrix) {}

    /// A page begins; `ctm` already accounts for the page rotation.
    fn begin_page(&mut self, page: &Page, ctm: Matrix) {}
    /// The page is complete.
    fn end_page(&mut self, page: &Page) {}

    /// A form XObject or inline image scope begins.
    fn begin_figure(&mut self, name: &str, bbox: (f32, f32, f32, f32), matrix: Matrix) {}
    /// The figure scope ends.
    fn end_figure(&mut self, name: &str) {}

    /// A path is painted.
    fn paint_path(
        &mut self,
        gstate: &GraphicsState,
        stroke: bool,
        fill: bool,
        even_odd: bool,
        path: &[PathSegment],
    ) {
    }

    /// An image XObject or inline image is placed.
    fn render_image(&mut self, name: &str, stream: &Stream) {}

    /// A text-showing operator executes.
    ///
    /// The device advances the pen position, so it receives the text
    /// state mutably.
    fn render_string(&mut self, textstate: &mut TextState, seq: &[TextItem]) {}

    /// Marked-content scope begins (`BMC` / `BDC`).
    fn begin_tag(&mut self, tag: &str, props: Option<&Dict>) {}
    /// Marked-content scope ends (`EMC`).
    fn end_tag(&mut self) {}
    /// A marked-content point (`MP` / `DP`).
    fn do_tag(&mut self, tag: &str, props: Option<&Dict>) {}
}
