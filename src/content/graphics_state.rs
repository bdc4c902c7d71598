//! Graphics and text state for content-stream execution.
//!
//! PDF transforms are affine matrices of the form:
//! ```text
//! [ a  b  0 ]
//! [ c  d  0 ]
//! [ e  f  1 ]
//! ```
//! where (a,b,c,d) carry scaling/rotation/skew and (e,f) translation.

use std::rc::Rc;

use crate::fonts::Font;

/// A 2D affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    /// Horizontal scaling component
    pub a: f32,
    /// Rotation/skew component
    pub b: f32,
    /// Rotation/skew component
    pub c: f32,
    /// Vertical scaling component
    pub d: f32,
    /// Horizontal translation
    pub e: f32,
    /// Vertical translation
    pub f: f32,
}

impl Matrix {
    /// The identity matrix.
    pub fn identity() -> Self {
        Matrix::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// Create a matrix from its six coefficients.
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Compose: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: other.a * self.a + other.c * self.b,
            b: other.b * self.a + other.d * self.b,
            c: other.a * self.c + other.c * self.d,
            d: other.b * self.c + other.d * self.d,
            e: other.a * self.e + other.c * self.f + other.e,
            f: other.b * self.e + other.d * self.f + other.f,
        }
    }

    /// Translate by `(x, y)` in this matrix's own coordinate space.
    pub fn translated(&self, x: f32, y: f32) -> Matrix {
        Matrix {
            e: x * self.a + y * self.c + self.e,
            f: x * self.b + y * self.d + self.f,
            ..*self
        }
    }

    /// Transform a point.
    pub fn apply_pt(&self, x: f32, y: f32) -> (f32, f32) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Transform a displacement (ignores translation).
    pub fn apply_norm(&self, p: f32, q: f32) -> (f32, f32) {
        (self.a * p + self.c * q, self.b * p + self.d * q)
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::identity()
    }
}

/// Painting parameters of the graphics state.
///
/// Only the parameters the layout analysis consumes are tracked; color
/// values are popped but not recorded.
#[derive(Debug, Clone, Default)]
pub struct GraphicsState {
    /// Line width (w)
    pub linewidth: f32,
    /// Line cap style (J)
    pub linecap: Option<i64>,
    /// Line join style (j)
    pub linejoin: Option<i64>,
    /// Miter limit (M)
    pub miterlimit: Option<f32>,
    /// Dash pattern and phase (d)
    pub dash: Option<(Vec<f32>, f32)>,
    /// Rendering intent (ri)
    pub intent: Option<String>,
    /// Flatness tolerance (i)
    pub flatness: Option<f32>,
}

/// Text-related parameters of the graphics state.
#[derive(Debug, Clone)]
pub struct TextState {
    /// Currently selected font
    pub font: Option<Rc<dyn Font>>,
    /// Font size (Tf)
    pub fontsize: f32,
    /// Character spacing (Tc)
    pub charspace: f32,
    /// Word spacing (Tw)
    pub wordspace: f32,
    /// Horizontal scaling percentage (Tz)
    pub scaling: f32,
    /// Leading, stored with the sign T* applies directly
    pub leading: f32,
    /// Rendering mode (Tr)
    pub render: i64,
    /// Text rise (Ts)
    pub rise: f32,
    /// Text matrix
    pub matrix: Matrix,
    /// Position within the current line, in text space
    pub linematrix: (f32, f32),
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            fontsize: 0.0,
            charspace: 0.0,
            wordspace: 0.0,
            scaling: 100.0,
            leading: 0.0,
            render: 0,
            rise: 0.0,
            matrix: Matrix::identity(),
            linematrix: (0.0, 0.0),
        }
    }
}

impl TextState {
    /// Reset the matrices (`BT`).
    pub fn reset(&mut self) {
        self.matrix = Matrix::identity();
        self.linematrix = (0.0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let m = Matrix::identity();
        assert_eq!(m.apply_pt(3.0, 4.0), (3.0, 4.0));
    }

    #[test]
    fn test_translation_then_scale() {
        let translate = Matrix::new(1.0, 0.0, 0.0, 1.0, 10.0, 20.0);
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        // translate first, then scale
        let m = translate.multiply(&scale);
        assert_eq!(m.apply_pt(1.0, 1.0), (22.0, 42.0));
    }

    #[test]
    fn test_translated_is_local() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 3.0, 5.0, 7.0);
        let m = scale.translated(1.0, 1.0);
        assert_eq!(m.e, 7.0);
        assert_eq!(m.f, 10.0);
        assert_eq!(m.a, 2.0);
    }

    #[test]
    fn test_apply_norm_ignores_translation() {
        let m = Matrix::new(2.0, 0.0, 0.0, 2.0, 100.0, 100.0);
        assert_eq!(m.apply_norm(1.0, 1.0), (2.0, 2.0));
    }

    #[test]
    fn test_textstate_reset() {
        let mut ts = TextState::default();
        ts.matrix = Matrix::new(1.0, 0.0, 0.0, 1.0, 50.0, 60.0);
        ts.linematrix = (5.0, 5.0);
        ts.reset();
        assert_eq!(ts.matrix, Matrix::identity());
        assert_eq!(ts.linematrix, (0.0, 0.0));
    }
}
