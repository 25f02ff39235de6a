//! CardView Widget
//!
//! Draws one [`CardSnapshot`] inside a bordered frame: a header with the
//! date and position, the body for the card's kind, edge arrows for the
//! shadow cues and an optional feedback banner along the bottom.

use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, Widget};

use glass_core::{ActionState, CardKind, CardSnapshot, Location, Payload};

use super::text_block::TextBlock;
use crate::display::DisplayFeedback;
use crate::theme;

/// One card in the prism frame
pub struct CardView<'a> {
    card: &'a CardSnapshot,
    feedback: Option<&'a DisplayFeedback>,
    route: Option<&'a (Option<Location>, Location)>,
    dimmed: bool,
}

impl<'a> CardView<'a> {
    /// Create a view of `card`
    pub fn new(card: &'a CardSnapshot) -> Self {
        Self {
            card,
            feedback: None,
            route: None,
            dimmed: false,
        }
    }

    /// Draw a feedback banner
    pub fn feedback(mut self, feedback: Option<&'a DisplayFeedback>) -> Self {
        self.feedback = feedback;
        self
    }

    /// Draw a route (map card)
    pub fn route(mut self, route: Option<&'a (Option<Location>, Location)>) -> Self {
        self.route = route;
        self
    }

    /// Draw as a backdrop
    pub fn dimmed(mut self, dimmed: bool) -> Self {
        self.dimmed = dimmed;
        self
    }

    /// Body text for the card
    pub fn body(&self) -> String {
        match self.route {
            Some((Some(from), to)) => {
                return format!("{}\n\u{2193}\n{}", describe(from), describe(to));
            }
            Some((None, to)) => return describe(to),
            None => {}
        }
        match (&self.card.kind, &self.card.payload) {
            (CardKind::Camera, _) => "[ viewfinder ]".to_string(),
            (CardKind::Reply, Payload::Media { text, .. }) if !text.is_empty() => text.clone(),
            (CardKind::Reply, _) => "Speak your reply...".to_string(),
            (CardKind::Clock | CardKind::Action | CardKind::Share, _) => {
                self.card.title.clone().unwrap_or_default()
            }
            (_, Payload::Html { html }) => html_to_text(html),
            (_, Payload::Media { text, image }) => match image {
                Some(image) if text.is_empty() => image_label(&image.url),
                Some(image) => format!("{text}\n{}", image_label(&image.url)),
                None => text.clone(),
            },
            _ => String::new(),
        }
    }

    fn header(&self) -> String {
        let mut header = String::new();
        if self.card.pinned {
            header.push_str("\u{2605} ");
        }
        if self.card.local_only {
            header.push_str("\u{21E1} ");
        }
        match &self.card.date_label {
            Some(date) => header.push_str(date),
            None => header.push_str(self.card.kind.label()),
        }
        header
    }
}

impl Widget for CardView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border = if self.dimmed {
            theme::BACKDROP_BORDER
        } else {
            theme::CARD_BORDER
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(theme::CARD_BACKGROUND));
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width < 3 || inner.height < 3 {
            return;
        }

        let [header, body, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .areas(inner);

        let muted = Style::default().fg(theme::CARD_MUTED);
        buf.set_stringn(
            header.x + 1,
            header.y,
            self.header(),
            header.width.saturating_sub(2) as usize,
            muted,
        );
        if self.card.count > 1 {
            let position = format!("{}/{}", self.card.position + 1, self.card.count);
            let x = header.right().saturating_sub(position.len() as u16 + 1);
            buf.set_string(x, header.y, position, muted);
        }

        let mut text_style = Style::default().fg(theme::style_accent(&self.card.style));
        if matches!(self.card.kind, CardKind::Clock | CardKind::Action) {
            text_style = text_style.add_modifier(Modifier::BOLD);
        }
        if self.dimmed {
            text_style = text_style.add_modifier(Modifier::DIM);
        }
        let body_area = Rect {
            x: body.x + 2,
            width: body.width.saturating_sub(4),
            ..body
        };
        TextBlock::new(&self.body())
            .style(text_style)
            .centered(!matches!(self.card.kind, CardKind::Content | CardKind::HtmlBundle))
            .render(body_area, buf);

        draw_cues(self.card, area, buf);

        if let Some(feedback) = self.feedback {
            let color = match feedback.state {
                ActionState::Failure => theme::FEEDBACK_FAILURE,
                ActionState::Success => theme::FEEDBACK_SUCCESS,
                ActionState::Sending | ActionState::Idle => theme::FEEDBACK_SENDING,
            };
            TextBlock::new(&feedback.banner())
                .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
                .centered(true)
                .render(footer, buf);
        }
    }
}

fn draw_cues(card: &CardSnapshot, area: Rect, buf: &mut Buffer) {
    let style = Style::default().fg(theme::SHADOW_CUE);
    let mid_x = area.x + area.width / 2;
    let mid_y = area.y + area.height / 2;
    if card.shadows.left {
        buf.set_string(area.x, mid_y, "\u{25C0}", style);
    }
    if card.shadows.right {
        buf.set_string(area.right() - 1, mid_y, "\u{25B6}", style);
    }
    if card.shadows.up {
        buf.set_string(mid_x, area.y, "\u{25B2}", style);
    }
    if card.shadows.down {
        buf.set_string(mid_x, area.bottom() - 1, "\u{25BC}", style);
    }
}

fn describe(location: &Location) -> String {
    match (&location.display_name, location.coordinates()) {
        (Some(name), _) => name.clone(),
        (None, Some((lat, lon))) => format!("{lat:.5}, {lon:.5}"),
        (None, None) => "unknown".to_string(),
    }
}

fn image_label(url: &str) -> String {
    if url.starts_with("data:") {
        "[photo]".to_string()
    } else {
        format!("[image {url}]")
    }
}

/// Flatten card HTML to plain text lines
pub fn html_to_text(html: &str) -> String {
    let mut text = String::new();
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            rest = &rest[open..];
            break;
        };
        let tag = rest[open + 1..open + close]
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if matches!(
            tag.as_str(),
            "br" | "p" | "div" | "li" | "h1" | "h2" | "h3" | "tr" | "section" | "article"
        ) && !text.ends_with('\n')
            && !text.is_empty()
        {
            text.push('\n');
        }
        rest = &rest[open + close + 1..];
    }
    text.push_str(rest);

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
