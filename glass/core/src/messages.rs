//! Messages from the emulator to the renderer
//!
//! # Design Philosophy
//!
//! The renderer owns no state. Every tree mutation and navigation step is
//! reported as a [`RenderMessage`] carrying complete [`CardSnapshot`]s, so a
//! surface can redraw from the latest message alone. Snapshots are plain
//! data: ids instead of tree keys, labels already formatted.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::actions::{ActionKind, ActionState};
use crate::card::{clock_face, hooks, nice_date, CardId, CardKind, Directive, MenuAction, Payload};
use crate::location::Location;
use crate::navigation::Transition;
use crate::sync::SyncReport;
use crate::tree::{CardTree, NodeKey, Plane};

/// Which edges of a card hint that there is more to see
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowCues {
    /// Something below (TAP/UP goes somewhere)
    pub down: bool,
    /// A sibling before this one
    pub left: bool,
    /// A sibling after this one
    pub right: bool,
    /// A parent to return to
    pub up: bool,
}

/// Everything the renderer needs to draw one card
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardSnapshot {
    /// Card id
    pub id: CardId,
    /// Variant tag
    pub kind: CardKind,
    /// Content
    pub payload: Payload,
    /// Action label, or the clock face for the Clock card
    pub title: Option<String>,
    /// Relative display date
    pub date_label: Option<String>,
    /// Index among siblings
    pub position: usize,
    /// Number of siblings (including this card)
    pub count: usize,
    /// Edge hints
    pub shadows: ShadowCues,
    /// Style class
    pub style: String,
    /// Pinned
    pub pinned: bool,
    /// Not yet persisted remotely
    pub local_only: bool,
}

impl CardSnapshot {
    /// Capture a card as seen at `now`
    #[must_use]
    pub fn capture<Tz: TimeZone>(tree: &CardTree, key: NodeKey, now: &DateTime<Tz>) -> Option<Self> {
        let card = tree.get(key)?;
        let position = tree.position_of(key).unwrap_or(0);
        let count = tree.sibling_count(key).max(1);
        let parent = card.parent().and_then(|p| tree.get(p));

        let title = match (&card.kind, &card.payload) {
            (CardKind::Clock, _) => Some(clock_face(now)),
            (
                CardKind::Action,
                Payload::Action {
                    action: MenuAction::TogglePinned,
                    ..
                },
            ) => Some(if parent.is_some_and(|p| p.is_pinned) {
                "Unpin".to_string()
            } else {
                "Pin".to_string()
            }),
            (_, Payload::Action { label, .. }) => Some(label.clone()),
            (CardKind::Share, Payload::Media { text, .. }) if text.is_empty() => {
                Some(format!("{} not found", card.id))
            }
            (CardKind::Share, Payload::Media { text, .. }) => Some(text.clone()),
            _ => None,
        };

        let date_label = match card.kind {
            CardKind::Content | CardKind::CardBundle | CardKind::HtmlBundle => {
                card.display_date.map(|date| nice_date(date, now))
            }
            _ => None,
        };

        let parent_has_actions = parent
            .is_some_and(|p| p.kind == CardKind::HtmlBundle && !p.action_children().is_empty());
        let shadows = ShadowCues {
            down: !card.children().is_empty()
                || card.payload.action() == Some(&MenuAction::Share)
                || !card.action_children().is_empty()
                || parent_has_actions,
            left: position > 0,
            right: position + 1 < count,
            up: card.parent().is_some(),
        };

        Some(Self {
            id: card.id.clone(),
            kind: card.kind,
            payload: card.payload.clone(),
            title,
            date_label,
            position,
            count,
            shadows,
            style: hooks(card.kind).style.to_string(),
            pinned: card.is_pinned,
            local_only: card.local_only,
        })
    }
}

/// Messages sent from the emulator to the renderer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RenderMessage {
    // ========================================================================
    // Navigation
    // ========================================================================
    /// A card became active
    CardShown {
        /// The card
        card: CardSnapshot,
        /// How it arrived
        transition: Transition,
    },

    /// A card went off screen
    CardHidden {
        /// Card id
        id: CardId,
    },

    /// A card stays visible behind an overlay
    CardBackdrop {
        /// Card id
        id: CardId,
    },

    // ========================================================================
    // Tree changes
    // ========================================================================
    /// A visible card's content or labels changed
    CardUpdated {
        /// The card
        card: CardSnapshot,
    },

    /// A card was removed from the tree
    CardRemoved {
        /// Card id
        id: CardId,
    },

    /// A reconciliation pass finished and changed the tree
    TimelineSynced {
        /// Cards created
        created: usize,
        /// Cards refreshed
        updated: usize,
        /// Cards removed
        removed: usize,
        /// Bundles (re)formed
        bundles: Vec<String>,
    },

    // ========================================================================
    // Actions
    // ========================================================================
    /// Feedback for an action card changed
    ActionFeedback {
        /// Card the feedback is drawn on
        card: CardId,
        /// Workflow
        action: ActionKind,
        /// New state; `Idle` takes the feedback down
        state: ActionState,
    },

    /// Draw a route between two points
    MapRequested {
        /// Current position; `None` draws the destination alone
        from: Option<Location>,
        /// Destination
        to: Location,
    },

    /// Device side effect requested by a card
    Directive(Directive),
}

impl RenderMessage {
    /// Summary of a reconciliation pass
    #[must_use]
    pub fn synced(report: &SyncReport) -> Self {
        Self::TimelineSynced {
            created: report.created.len(),
            updated: report.updated.len(),
            removed: report.removed.len(),
            bundles: report.bundles.clone(),
        }
    }
}
