//! HTML hydration and serialization.

mod parse;
mod write;

pub use parse::{PLACEHOLDER_CLASS, parse_html};
pub use write::{render, serialize};
