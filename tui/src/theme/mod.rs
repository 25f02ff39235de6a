//! Theme and Colors
//!
//! The Glass palette: white text on black, the way the prism shows it,
//! with a few accent colors for actions and feedback.

use ratatui::style::Color;

// ============================================================================
// Card Palette
// ============================================================================

/// Card background - the prism is black
pub const CARD_BACKGROUND: Color = Color::Rgb(0, 0, 0);

/// Main card text
pub const CARD_TEXT: Color = Color::Rgb(240, 240, 240);

/// Secondary text (dates, positions)
pub const CARD_MUTED: Color = Color::Rgb(150, 150, 150);

/// Card border
pub const CARD_BORDER: Color = Color::Rgb(70, 70, 70);

/// Backdrop card border (dimmer than the active card)
pub const BACKDROP_BORDER: Color = Color::Rgb(40, 40, 40);

/// Clock face
pub const CLOCK_FACE: Color = Color::Rgb(255, 255, 255);

/// Pinned card marker
pub const PINNED: Color = Color::Rgb(255, 214, 102);

/// Local-only (not yet persisted) marker
pub const LOCAL_ONLY: Color = Color::Rgb(120, 170, 255);

/// Edge shadow cue arrows
pub const SHADOW_CUE: Color = Color::Rgb(110, 110, 110);

// ============================================================================
// Card Styles
// ============================================================================

/// Action card label
pub const ACTION_LABEL: Color = Color::Rgb(52, 168, 224);

/// Share target name
pub const SHARE_TARGET: Color = Color::Rgb(140, 210, 140);

/// Reply dictation text
pub const REPLY_TEXT: Color = Color::Rgb(255, 255, 200);

/// Bundle cover accent
pub const BUNDLE_ACCENT: Color = Color::Rgb(200, 160, 255);

/// Camera viewfinder
pub const CAMERA: Color = Color::Rgb(255, 120, 120);

// ============================================================================
// Feedback Colors
// ============================================================================

/// Remote call in flight
pub const FEEDBACK_SENDING: Color = Color::Rgb(150, 180, 255);

/// Remote call succeeded
pub const FEEDBACK_SUCCESS: Color = Color::Rgb(120, 230, 120);

/// Remote call failed
pub const FEEDBACK_FAILURE: Color = Color::Rgb(255, 80, 80);

// ============================================================================
// UI Colors
// ============================================================================

/// Status bar / help text
pub const DIM_GRAY: Color = Color::Rgb(100, 100, 100);

/// Listening indicator
pub const LISTENING: Color = Color::Magenta;

/// Accent color for a card style class
pub fn style_accent(style: &str) -> Color {
    match style {
        "clock" => CLOCK_FACE,
        "action" => ACTION_LABEL,
        "share" => SHARE_TARGET,
        "reply" => REPLY_TEXT,
        "html-bundle" | "card-bundle" => BUNDLE_ACCENT,
        "camera" => CAMERA,
        _ => CARD_TEXT,
    }
}
