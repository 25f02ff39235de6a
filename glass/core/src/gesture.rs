//! Gesture Classification
//!
//! Turns raw pointer motion into one of five discrete navigation events.
//!
//! # Algorithm
//!
//! Classification happens in two tiers:
//!
//! 1. **Magnitude gate**: a movement whose squared length is below
//!    [`MOVE_THRESHOLD`] is a click. Clicks are classified by where they
//!    landed: the edge zones of the 640x360 card turn the virtual wheel,
//!    the centre is a tap.
//! 2. **Angle gate**: a real swipe is classified by its dominant axis. A
//!    swipe whose `|dx/dy|` ratio falls inside the diagonal band is not
//!    decisive and falls back to the click rules on its end point.
//!
//! The constants are part of the observable behaviour; tests pin them down.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::events::Key;

/// Squared-pixel length below which a movement counts as a click
pub const MOVE_THRESHOLD: f64 = 3000.0;

/// Card width in pointer coordinates
pub const CARD_WIDTH: f64 = 640.0;

/// Card height in pointer coordinates
pub const CARD_HEIGHT: f64 = 360.0;

/// Clicks left of this x coordinate turn the wheel right
pub const EDGE_LEFT: f64 = 30.0;

/// Clicks right of this x coordinate turn the wheel left
pub const EDGE_RIGHT: f64 = 610.0;

/// Clicks above this y coordinate go down
pub const EDGE_TOP: f64 = 30.0;

/// Clicks below this y coordinate go up
pub const EDGE_BOTTOM: f64 = 330.0;

/// `|dx/dy|` ratios in this band are too diagonal to pick an axis
pub const DIAGONAL_BAND: RangeInclusive<f64> = 0.5..=1.5;

/// A classified navigation gesture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gesture {
    /// Swipe up (behaves like a tap)
    Up,
    /// Swipe down: go back to the parent card
    Down,
    /// Move to the next (older) sibling
    Left,
    /// Move to the previous (newer) sibling
    Right,
    /// Select the active card
    Tap,
}

impl Gesture {
    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Tap => "tap",
        }
    }

    /// Map a keyboard key to a gesture.
    ///
    /// The arrow keys turn the wheel, so the horizontal arrows are mirrored:
    /// the left arrow brings in the card on the left, which is a `Right` move.
    #[must_use]
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::Left => Some(Self::Right),
            Key::Right => Some(Self::Left),
            Key::Up => Some(Self::Up),
            Key::Down => Some(Self::Down),
            Key::Enter | Key::Space => Some(Self::Tap),
            Key::Escape | Key::Char(_) | Key::Other => None,
        }
    }
}

impl std::fmt::Display for Gesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Classify a pointer movement from `(x1, y1)` to `(x2, y2)`.
///
/// Coordinates are relative to the active card's origin.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn classify(x1: f64, y1: f64, x2: f64, y2: f64) -> Gesture {
    let dx = x2 - x1;
    let dy = y2 - y1;

    if dx * dx + dy * dy < MOVE_THRESHOLD {
        return classify_click(x2, y2);
    }

    if dx == 0.0 {
        return if dy > 0.0 { Gesture::Down } else { Gesture::Up };
    }
    if dy == 0.0 {
        return if dx > 0.0 { Gesture::Right } else { Gesture::Left };
    }

    let ratio = (dx / dy).abs();
    if DIAGONAL_BAND.contains(&ratio) {
        return classify_click(x2, y2);
    }

    if ratio > *DIAGONAL_BAND.end() {
        if dx > 0.0 {
            Gesture::Right
        } else {
            Gesture::Left
        }
    } else if dy > 0.0 {
        Gesture::Down
    } else {
        Gesture::Up
    }
}

/// Classify a click purely by its position on the card
#[must_use]
pub fn classify_click(x: f64, y: f64) -> Gesture {
    if x < EDGE_LEFT {
        Gesture::Right
    } else if x > EDGE_RIGHT {
        Gesture::Left
    } else if y < EDGE_TOP {
        Gesture::Down
    } else if y > EDGE_BOTTOM {
        Gesture::Up
    } else {
        Gesture::Tap
    }
}

/// A completed pointer stroke (press to release) in card coordinates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointerStroke {
    /// Where the pointer went down
    pub start: (f64, f64),
    /// Where the pointer was released
    pub end: (f64, f64),
}

impl PointerStroke {
    /// Create a stroke from start and end points
    #[must_use]
    pub fn new(start: (f64, f64), end: (f64, f64)) -> Self {
        Self { start, end }
    }

    /// A stroke that starts and ends at the same point
    #[must_use]
    pub fn click(x: f64, y: f64) -> Self {
        Self::new((x, y), (x, y))
    }

    /// Classify this stroke
    #[must_use]
    pub fn gesture(&self) -> Gesture {
        classify(self.start.0, self.start.1, self.end.0, self.end.1)
    }
}
