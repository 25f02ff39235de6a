//! Widgets
//!
//! - [`CardView`]: One card in the 16:9 prism frame
//! - [`TextBlock`]: Wrapped, centered text region

mod card;
mod text_block;

pub use card::{html_to_text, CardView};
pub use text_block::TextBlock;
