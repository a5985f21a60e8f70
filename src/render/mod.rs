//! Terminal output: buffered ANSI writes and line-tracked repainting.

mod output;
mod renderer;

pub use output::OutputBuffer;
pub use renderer::{LineTarget, Renderer};
