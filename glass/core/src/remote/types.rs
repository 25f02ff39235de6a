//! Remote Timeline Wire Types
//!
//! The minimal subset of the timeline resource shapes the emulator consumes.
//! Field names are camelCase on the wire. Remote ids (and bundle ids) show up
//! as JSON strings or numbers depending on the server, so both are accepted
//! and normalised to strings.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::location::Location;

/// Accept a string or a number where an identifier is expected
fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Float(f) => f.to_string(),
    }))
}

/// Parse a remote timestamp.
///
/// RFC 3339 first; otherwise a naive `YYYY-MM-DDTHH:MM:SS[.ffffff]` taken as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// File attached to a timeline item
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attachment {
    /// Attachment id (served via the emulator's attachment proxy)
    #[serde(deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// MIME type
    pub content_type: String,
    /// Direct URL (or data URI)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
}

/// One display state of a menu item
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MenuValue {
    /// Value state (`DEFAULT`, `PENDING`, `CONFIRMED`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Label shown on the action card
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Icon shown on the action card
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// A menu item offered by a timeline item
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MenuItem {
    /// Built-in action name or `CUSTOM`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Custom action id
    #[serde(deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display states
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<MenuValue>,
}

impl MenuItem {
    /// A menu item for a built-in action
    #[must_use]
    pub fn builtin(action: &str) -> Self {
        Self {
            action: Some(action.to_string()),
            ..Default::default()
        }
    }
}

/// A timeline item as delivered by the remote feed
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineItem {
    /// Remote id; items without one are skipped during reconciliation
    #[serde(deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Plain text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// HTML content (overrides text and image)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Extra HTML pages making this an HTML bundle
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub html_pages: Vec<String>,
    /// Attachments; the first `image/*` one becomes the card image
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Image URLs (contacts use these; the first one wins over attachments)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    /// Time the item describes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Creation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    /// Last update time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Explicit display time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_date: Option<String>,
    /// Bundle grouping key
    #[serde(deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    /// Whether this item is the bundle's cover
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_bundle_cover: bool,
    /// Whether the item is pinned
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_pinned: bool,
    /// Deletion marker
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
    /// Menu items (older feeds call these `cardOptions`)
    #[serde(alias = "cardOptions", skip_serializing_if = "Vec::is_empty")]
    pub menu_items: Vec<MenuItem>,
    /// Location attached to the item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Text to read aloud instead of `text`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speakable_text: Option<String>,
    /// Id of the item this one replies to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    /// Recipients this item was shared with
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<Contact>,
}

impl TimelineItem {
    /// Create an item with just an id
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// The display timestamp: `displayDate`, else `updated`, else `created`, else `when`
    #[must_use]
    pub fn display_timestamp(&self) -> Option<DateTime<Utc>> {
        [
            &self.display_date,
            &self.updated,
            &self.created,
            &self.when,
        ]
        .into_iter()
        .flatten()
        .find_map(|raw| parse_timestamp(raw))
    }

    /// The non-empty remote id, if any
    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// The non-empty bundle id, if any
    #[must_use]
    pub fn bundle(&self) -> Option<&str> {
        self.bundle_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Result of listing the timeline
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineList {
    /// Items, newest first as delivered
    pub items: Vec<TimelineItem>,
}

/// A share target
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    /// Contact id
    #[serde(deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name shown on the share card
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Images for the share card background
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    /// MIME types the contact accepts
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accept_types: Vec<String>,
}

/// Result of listing contacts
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactList {
    /// Contacts
    pub items: Vec<Contact>,
}

/// Partial update of a timeline item
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelinePatch {
    /// New pin state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    /// Replacement recipients list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<Contact>>,
}

/// Media uploaded alongside a newly inserted item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaUpload {
    /// MIME type of the media
    pub content_type: String,
    /// Base64 payload (without the `data:` prefix)
    pub base64_data: String,
}

impl MediaUpload {
    /// Split a base64 `data:` URI into an upload. Returns `None` for anything else.
    #[must_use]
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (meta, data) = rest.split_once(',')?;
        let content_type = meta.strip_suffix(";base64")?;
        if !content_type.starts_with("image/") {
            return None;
        }
        Some(Self {
            content_type: content_type.to_string(),
            base64_data: data.to_string(),
        })
    }
}

/// Response carrying the id of an inserted or patched item
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertReceipt {
    /// Remote id; absent when the server refused the write
    #[serde(deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A user action recorded against a timeline item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAction {
    /// Always `timeline`
    pub collection: String,
    /// Item the action refers to
    pub item_id: String,
    /// Action name (`SHARE`, `REPLY`, `CUSTOM`)
    pub action: String,
    /// Action payload (custom action id, reply item id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl UserAction {
    /// A timeline action without a value
    #[must_use]
    pub fn timeline(item_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            collection: "timeline".to_string(),
            item_id: item_id.into(),
            action: action.into(),
            value: None,
        }
    }

    /// Attach a value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Result of recording a user action
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionReceipt {
    /// Whether the server accepted the action
    pub success: bool,
}
