//! TextBlock Widget
//!
//! A borderless text region that wraps to its width and can center itself.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::widgets::Widget;
use textwrap::wrap;
use unicode_width::UnicodeWidthStr;

/// A borderless, wrapped text block
pub struct TextBlock<'a> {
    content: &'a str,
    style: Style,
    centered: bool,
}

impl<'a> TextBlock<'a> {
    /// Create a block for `content`
    pub fn new(content: &'a str) -> Self {
        Self {
            content,
            style: Style::default(),
            centered: false,
        }
    }

    /// Set the text style
    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Center lines horizontally and the block vertically
    pub fn centered(mut self, centered: bool) -> Self {
        self.centered = centered;
        self
    }

    /// Lines after wrapping to `width`
    pub fn lines(&self, width: usize) -> Vec<String> {
        if width == 0 {
            return Vec::new();
        }
        self.content
            .lines()
            .flat_map(|line| {
                if line.trim().is_empty() {
                    vec![String::new()]
                } else {
                    wrap(line, width)
                        .into_iter()
                        .map(|cow| cow.to_string())
                        .collect()
                }
            })
            .collect()
    }
}

impl Widget for TextBlock<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let wrapped = self.lines(area.width as usize);
        let height = area.height as usize;

        let top = if self.centered {
            height.saturating_sub(wrapped.len()) / 2
        } else {
            0
        };

        for (i, line) in wrapped.iter().take(height - top.min(height)).enumerate() {
            let width = line.width().min(area.width as usize);
            let x = if self.centered {
                area.x + ((area.width as usize - width) / 2) as u16
            } else {
                area.x
            };
            let y = area.y + (top + i) as u16;
            buf.set_stringn(x, y, line, area.width as usize, self.style);
        }
    }
}
