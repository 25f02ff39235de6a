//! Input Events
//!
//! Events flowing from a UI surface (or the platform) into the
//! [`Emulator`](crate::Emulator). Surfaces translate their native input into
//! these; the emulator owns every decision about what they mean.

use serde::{Deserialize, Serialize};

use crate::gesture::{Gesture, PointerStroke};

/// Keyboard keys the emulator understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Enter / Return
    Enter,
    /// Space bar
    Space,
    /// Escape
    Escape,
    /// Any printable character
    Char(char),
    /// Anything else
    Other,
}

/// Events sent from a surface to the emulator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    // ========================================================================
    // Navigation
    // ========================================================================
    /// A completed pointer stroke, already relative to the active card
    Pointer {
        /// The stroke
        stroke: PointerStroke,
    },

    /// A key press
    Key {
        /// The key
        key: Key,
    },

    /// A gesture classified elsewhere (e.g. by a touch surface)
    Gesture {
        /// The gesture
        gesture: Gesture,
    },

    // ========================================================================
    // Platform collaborators
    // ========================================================================
    /// Final dictation result while the reply card is listening
    Dictation {
        /// Recognised text (may be empty)
        text: String,
    },

    /// Speech heard while the clock card is listening for a hotword
    Hotword {
        /// Recognised phrase
        phrase: String,
    },

    /// The camera card captured a still image
    PhotoCaptured {
        /// Image as a `data:` URI
        data_uri: String,
        /// MIME type of the image
        content_type: String,
    },

    // ========================================================================
    // Timeline
    // ========================================================================
    /// Push notification: a single timeline item changed remotely
    TimelineChanged {
        /// Remote id of the changed item
        item_id: String,
    },

    /// Ask for an immediate timeline refresh
    SyncRequested,
}

impl InputEvent {
    /// Convenience constructor for a pointer stroke
    #[must_use]
    pub fn pointer(start: (f64, f64), end: (f64, f64)) -> Self {
        Self::Pointer {
            stroke: PointerStroke::new(start, end),
        }
    }

    /// Convenience constructor for a key press
    #[must_use]
    pub fn key(key: Key) -> Self {
        Self::Key { key }
    }

    /// Convenience constructor for a gesture
    #[must_use]
    pub fn gesture(gesture: Gesture) -> Self {
        Self::Gesture { gesture }
    }

    /// The navigation gesture this event carries, if any
    #[must_use]
    pub fn navigation(&self) -> Option<Gesture> {
        match self {
            Self::Pointer { stroke } => Some(stroke.gesture()),
            Self::Key { key } => Gesture::from_key(*key),
            Self::Gesture { gesture } => Some(*gesture),
            _ => None,
        }
    }
}
