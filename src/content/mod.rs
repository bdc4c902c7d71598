//! Content-stream execution: graphics state, parsing and interpretation.

mod graphics_state;
mod interp;
mod parser;

pub use graphics_state::{GraphicsState, Matrix, TextState};
pub use interp::{ColorSpace, Interpreter, PathSegment};
pub use parser::{ContentParser, ContentToken};
