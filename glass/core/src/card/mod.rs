//! Card Model
//!
//! A [`CardNode`] is one navigable unit of the timeline. Cards do not form an
//! inheritance hierarchy: every card is the same struct tagged with a
//! [`CardKind`], and kind-specific behaviour lives in the hook table in
//! [`behavior`].
//!
//! # Payload exclusivity
//!
//! A card shows either HTML or text with an optional image, never both. The
//! [`Payload`] enum makes the mix unrepresentable: switching a card to HTML
//! replaces its text and image wholesale.
//!
//! # Ordering
//!
//! Sibling order is never stored. Positions are recomputed from
//! [`compare_cards`] every time a traversal needs them.

pub mod behavior;
pub mod date;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::Location;
use crate::remote::{Contact, MenuItem, TimelineItem};
use crate::tree::NodeKey;

pub use behavior::{hooks, Directive, KindHooks, ListenMode};
pub use date::{clock_face, nice_date};

// =============================================================================
// Identity
// =============================================================================

/// Card identifier, unique within its sibling scope
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardId(pub String);

impl CardId {
    /// Create a card id from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id of the action card for `action` on `parent` (`"<parent>_<ACTION>"`)
    #[must_use]
    pub fn action(parent: &CardId, action: &MenuAction) -> Self {
        Self(format!("{}_{}", parent.0, action.as_str()))
    }

    /// Id of page `index` of an HTML bundle (`"<parent>_<index>"`)
    #[must_use]
    pub fn page(parent: &CardId, index: usize) -> Self {
        Self(format!("{}_{index}", parent.0))
    }

    /// Get the string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Well-known ids of the cards the emulator creates itself
pub mod ids {
    /// The root card
    pub const START: &str = "start";
    /// The clock card
    pub const CLOCK: &str = "clock";
    /// The camera card under the clock
    pub const CAMERA: &str = "camera";
    /// The singleton reply card
    pub const REPLY: &str = "reply";
    /// The singleton map card used for navigation routes
    pub const MAP: &str = "map";
    /// Prefix of locally captured photo cards
    pub const PHOTO_PREFIX: &str = "new_";
}

// =============================================================================
// Kind
// =============================================================================

/// Variant tag of a card
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardKind {
    /// Invisible root of the timeline
    Start,
    /// Home screen clock
    Clock,
    /// Timeline content
    Content,
    /// One selectable menu action of a content card
    Action,
    /// A contact to share with
    Share,
    /// Dictation target for replies
    Reply,
    /// Content with a fixed sequence of HTML pages
    HtmlBundle,
    /// Cover of a group of cards sharing a bundle id
    CardBundle,
    /// Live camera viewfinder
    Camera,
}

impl CardKind {
    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Clock => "Clock",
            Self::Content => "Content",
            Self::Action => "Action",
            Self::Share => "Share",
            Self::Reply => "Reply",
            Self::HtmlBundle => "HTML bundle",
            Self::CardBundle => "Card bundle",
            Self::Camera => "Camera",
        }
    }

    /// Kinds shown on top of a content card instead of replacing it
    #[must_use]
    pub fn is_overlay(&self) -> bool {
        matches!(self, Self::Action | Self::Share | Self::Reply)
    }

    /// Kinds whose children are bundle members or pages
    #[must_use]
    pub fn is_bundle(&self) -> bool {
        matches!(self, Self::HtmlBundle | Self::CardBundle)
    }
}

// =============================================================================
// Menu actions
// =============================================================================

/// What an action card does when tapped
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MenuAction {
    /// Share the content card with a contact
    Share,
    /// Dictate a reply
    Reply,
    /// Speak the card text
    ReadAloud,
    /// Show a route to the card's location
    Navigate,
    /// Pin or unpin the content card
    TogglePinned,
    /// Service-defined action
    Custom,
    /// Anything else the feed sends
    Other(String),
}

impl MenuAction {
    /// Parse a wire action name
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "SHARE" => Self::Share,
            "REPLY" => Self::Reply,
            "READ_ALOUD" => Self::ReadAloud,
            "NAVIGATE" => Self::Navigate,
            "TOGGLE_PINNED" => Self::TogglePinned,
            "CUSTOM" => Self::Custom,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire action name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Share => "SHARE",
            Self::Reply => "REPLY",
            Self::ReadAloud => "READ_ALOUD",
            Self::Navigate => "NAVIGATE",
            Self::TogglePinned => "TOGGLE_PINNED",
            Self::Custom => "CUSTOM",
            Self::Other(name) => name,
        }
    }

    /// Fixed label of built-in actions
    #[must_use]
    pub fn builtin_label(&self) -> Option<&'static str> {
        match self {
            Self::Share => Some("Share"),
            Self::Reply => Some("Reply"),
            Self::ReadAloud => Some("Read aloud"),
            Self::Navigate => Some("Navigate"),
            Self::TogglePinned => Some("Pin/Unpin card"),
            Self::Custom | Self::Other(_) => None,
        }
    }
}

// =============================================================================
// Payload
// =============================================================================

/// Image shown on a card
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// URL or `data:` URI
    pub url: String,
    /// MIME type, when known
    pub content_type: Option<String>,
}

/// What a card displays
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Nothing (structural cards)
    #[default]
    Empty,
    /// HTML markup; excludes text and image
    Html {
        /// Markup
        html: String,
    },
    /// Plain text with an optional image
    Media {
        /// Text (may be empty)
        text: String,
        /// Image
        image: Option<Image>,
    },
    /// An action card's discriminators
    Action {
        /// Which action
        action: MenuAction,
        /// Custom action id (empty for built-ins)
        action_id: String,
        /// Label shown on the card
        label: String,
        /// Icon shown on the card
        icon_url: Option<String>,
    },
}

impl Payload {
    /// Build a content payload; non-empty HTML wins over text and image
    #[must_use]
    pub fn content(text: Option<&str>, html: Option<&str>, image: Option<Image>) -> Self {
        match html.filter(|h| !h.is_empty()) {
            Some(html) => Self::Html {
                html: html.to_string(),
            },
            None => Self::Media {
                text: text.unwrap_or_default().to_string(),
                image,
            },
        }
    }

    /// Text, for media payloads
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Media { text, .. } => Some(text),
            _ => None,
        }
    }

    /// HTML, for HTML payloads
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Html { html } => Some(html),
            _ => None,
        }
    }

    /// Image, for media payloads
    #[must_use]
    pub fn image(&self) -> Option<&Image> {
        match self {
            Self::Media { image, .. } => image.as_ref(),
            _ => None,
        }
    }

    /// Action, for action payloads
    #[must_use]
    pub fn action(&self) -> Option<&MenuAction> {
        match self {
            Self::Action { action, .. } => Some(action),
            _ => None,
        }
    }
}

/// Pick the card image from an item: first `image/*` attachment (served via
/// the attachment proxy when it has an id), overridden by `imageUrls[0]`
fn item_image(card_id: &str, item: &TimelineItem) -> Option<Image> {
    let from_attachment = item
        .attachments
        .iter()
        .find(|att| att.content_type.starts_with("image/"))
        .and_then(|att| {
            let url = match &att.id {
                Some(att_id) => Some(format!("/glass/attachment/{card_id}/{att_id}")),
                None => att.content_url.clone(),
            }?;
            Some(Image {
                url,
                content_type: Some(att.content_type.clone()),
            })
        });

    match item.image_urls.first() {
        Some(url) => Some(Image {
            url: url.clone(),
            content_type: None,
        }),
        None => from_attachment,
    }
}

// =============================================================================
// Visibility
// =============================================================================

/// How a card is currently presented
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    /// Not on screen
    #[default]
    Hidden,
    /// The active card
    Active,
    /// Visible but inactive, behind an overlay
    Backdrop,
}

// =============================================================================
// Card node
// =============================================================================

/// Outcome of refreshing a card from a remote item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Bundle id before the update
    pub previous_bundle: Option<String>,
    /// Whether the bundle id changed (including becoming unset)
    pub bundle_changed: bool,
    /// Whether the remote cover flag changed
    pub cover_changed: bool,
}

/// One card in the timeline
#[derive(Clone, Debug)]
pub struct CardNode {
    /// Card id
    pub id: CardId,
    /// Variant tag
    pub kind: CardKind,
    /// Display content
    pub payload: Payload,
    /// Display date, if the card has one
    pub display_date: Option<DateTime<Utc>>,
    /// Pinned cards sort first
    pub is_pinned: bool,
    /// Bundle grouping key
    pub bundle_id: Option<String>,
    /// Whether this card is the elected cover of its bundle
    pub is_bundle_cover: bool,
    /// Whether the feed asked for this card to be the cover
    pub requested_cover: bool,
    /// Created on the device and not yet persisted remotely
    pub local_only: bool,
    /// Menu items this card offers
    pub menu_items: Vec<MenuItem>,
    /// Location attached to the card
    pub location: Option<Location>,
    /// Text to read aloud instead of the card text
    pub speakable_text: Option<String>,
    /// Current presentation
    pub visibility: Visibility,

    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) action_children: Vec<NodeKey>,
    pub(crate) arrival: u64,
}

impl CardNode {
    /// A structural card with no content
    pub fn new(id: impl Into<CardId>, kind: CardKind) -> Self {
        Self {
            id: id.into(),
            kind,
            payload: Payload::Empty,
            display_date: None,
            is_pinned: false,
            bundle_id: None,
            is_bundle_cover: false,
            requested_cover: false,
            local_only: false,
            menu_items: Vec::new(),
            location: None,
            speakable_text: None,
            visibility: Visibility::Hidden,
            parent: None,
            children: Vec::new(),
            action_children: Vec::new(),
            arrival: 0,
        }
    }

    /// Build a content card from a remote item. Returns `None` without an id.
    ///
    /// Items with HTML pages become [`CardKind::HtmlBundle`]; everything else
    /// starts as [`CardKind::Content`] (bundling upgrades covers later).
    #[must_use]
    pub fn from_item(item: &TimelineItem) -> Option<Self> {
        let id = item.remote_id()?;
        let kind = if item.html_pages.is_empty() {
            CardKind::Content
        } else {
            CardKind::HtmlBundle
        };

        let mut node = Self::new(CardId::new(id), kind);
        node.apply_content(item);
        node.is_pinned = item.is_pinned;
        node.bundle_id = item.bundle().map(str::to_string);
        node.requested_cover = item.bundle().is_some() && item.is_bundle_cover;
        Some(node)
    }

    /// A page of an HTML bundle
    #[must_use]
    pub fn html_page(parent: &CardId, index: usize, html: &str) -> Self {
        let mut node = Self::new(CardId::page(parent, index), CardKind::Content);
        node.payload = Payload::content(None, Some(html), None);
        node
    }

    /// A share target built from a contact. Returns `None` without an id.
    #[must_use]
    pub fn share_target(contact: &Contact) -> Option<Self> {
        let id = contact.id.as_deref().filter(|id| !id.is_empty())?;
        let mut node = Self::new(CardId::new(id), CardKind::Share);
        node.payload = Payload::Media {
            text: contact.display_name.clone().unwrap_or_default(),
            image: contact.image_urls.first().map(|url| Image {
                url: url.clone(),
                content_type: None,
            }),
        };
        Some(node)
    }

    /// An action card for `item` on the card `parent`.
    ///
    /// Returns `None` when the item should not produce a card: no action,
    /// `NAVIGATE` without coordinates, `READ_ALOUD` without anything to read.
    #[must_use]
    pub fn action_card(parent: &CardNode, item: &MenuItem) -> Option<Self> {
        let action = MenuAction::parse(item.action.as_deref().filter(|a| !a.is_empty())?);

        match action {
            MenuAction::Navigate
                if parent
                    .location
                    .as_ref()
                    .and_then(Location::coordinates)
                    .is_none() =>
            {
                return None;
            }
            MenuAction::ReadAloud if parent.readable_text().is_none() => return None,
            _ => {}
        }

        let first_value = item.values.first();
        let label = action
            .builtin_label()
            .map(str::to_string)
            .or_else(|| first_value.and_then(|v| v.display_name.clone()))
            .unwrap_or_else(|| action.as_str().to_string());

        let mut node = Self::new(CardId::action(&parent.id, &action), CardKind::Action);
        node.payload = Payload::Action {
            action,
            action_id: item.id.clone().unwrap_or_default(),
            label,
            icon_url: first_value.and_then(|v| v.icon_url.clone()),
        };
        Some(node)
    }

    /// Refresh this card from a newer version of its remote item.
    ///
    /// The display date only moves forward when the item carries one; the
    /// payload is rebuilt so HTML keeps excluding text and image.
    pub fn update(&mut self, item: &TimelineItem) -> UpdateOutcome {
        if let Some(date) = item.display_timestamp() {
            self.display_date = Some(date);
        }
        self.payload = Payload::content(
            item.text.as_deref(),
            item.html.as_deref(),
            item_image(self.id.as_str(), item),
        );
        self.is_pinned = item.is_pinned;
        self.menu_items.clone_from(&item.menu_items);
        self.location.clone_from(&item.location);
        self.speakable_text.clone_from(&item.speakable_text);

        let new_bundle = item.bundle().map(str::to_string);
        let previous_bundle = self.bundle_id.clone();
        let bundle_changed = previous_bundle != new_bundle;
        self.bundle_id = new_bundle;
        let was_requested = self.requested_cover;
        self.requested_cover = self.bundle_id.is_some() && item.is_bundle_cover;

        if self.bundle_id.is_none() {
            self.is_bundle_cover = false;
            if self.kind == CardKind::CardBundle {
                self.kind = CardKind::Content;
            }
        }

        UpdateOutcome {
            previous_bundle,
            bundle_changed,
            cover_changed: was_requested != self.requested_cover,
        }
    }

    fn apply_content(&mut self, item: &TimelineItem) {
        self.display_date = item.display_timestamp();
        self.payload = Payload::content(
            item.text.as_deref(),
            item.html.as_deref(),
            item_image(self.id.as_str(), item),
        );
        self.menu_items.clone_from(&item.menu_items);
        self.location.clone_from(&item.location);
        self.speakable_text.clone_from(&item.speakable_text);
    }

    /// Replace the payload with HTML (clears text and image)
    pub fn set_html(&mut self, html: impl Into<String>) {
        self.payload = Payload::Html { html: html.into() };
    }

    /// Replace the payload with text and an optional image
    pub fn set_media(&mut self, text: impl Into<String>, image: Option<Image>) {
        self.payload = Payload::Media {
            text: text.into(),
            image,
        };
    }

    /// Text to speak for `READ_ALOUD`: speakable text, else the card text
    #[must_use]
    pub fn readable_text(&self) -> Option<&str> {
        self.speakable_text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.payload.text().filter(|t| !t.is_empty()))
    }

    /// Parent key (non-owning; may be stale)
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Owned content children in insertion order
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Owned action children in menu order
    #[must_use]
    pub fn action_children(&self) -> &[NodeKey] {
        &self.action_children
    }

    /// Insertion sequence number within the tree
    #[must_use]
    pub fn arrival(&self) -> u64 {
        self.arrival
    }
}

// =============================================================================
// Ordering
// =============================================================================

/// Order two optional dates, undated last
fn dated(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>, newest_first: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if newest_first => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sibling comparator.
///
/// Pinned cards come first, oldest pin first. Then the clock. Then everything
/// else newest first. Undated cards sort last within their group.
#[must_use]
pub fn compare_cards(a: &CardNode, b: &CardNode) -> Ordering {
    match (a.is_pinned, b.is_pinned) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (true, true) => return dated(a.display_date, b.display_date, false),
        (false, false) => {}
    }

    match (a.kind == CardKind::Clock, b.kind == CardKind::Clock) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => dated(a.display_date, b.display_date, true),
    }
}
