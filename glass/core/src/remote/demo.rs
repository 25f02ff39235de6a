//! In-Memory Demo Timeline
//!
//! A [`RemoteTimelineClient`] that keeps everything in process. It backs the
//! emulator's demo mode and doubles as a recording fake in tests: every write
//! is kept so callers can assert on it, and failures can be switched on.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::types::{
    ActionReceipt, Attachment, Contact, InsertReceipt, MediaUpload, MenuItem, MenuValue,
    TimelineItem, TimelineList, TimelinePatch, UserAction,
};
use super::{RemoteError, RemoteTimelineClient};
use crate::location::Location;

/// First id handed out to inserted items
const FIRST_INSERT_ID: u64 = 100;

#[derive(Debug, Default)]
struct DemoState {
    items: Vec<TimelineItem>,
    contacts: Vec<Contact>,
    inserted: Vec<TimelineItem>,
    patches: Vec<(String, TimelinePatch)>,
    actions: Vec<UserAction>,
    locations: Vec<Location>,
    next_id: u64,
    offline: bool,
    reject_actions: bool,
}

/// In-memory timeline service
#[derive(Debug)]
pub struct DemoTimeline {
    state: Mutex<DemoState>,
}

impl Default for DemoTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoTimeline {
    /// An empty timeline with no contacts
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DemoState {
                next_id: FIRST_INSERT_ID,
                ..Default::default()
            }),
        }
    }

    /// A timeline seeded with the demo cards and contacts
    #[must_use]
    pub fn seeded() -> Self {
        let demo = Self::new();
        {
            let mut state = demo.state.lock();
            state.items = demo_items();
            state.contacts = demo_contacts();
        }
        demo
    }

    /// Replace the timeline contents
    #[must_use]
    pub fn with_items(self, items: Vec<TimelineItem>) -> Self {
        self.state.lock().items = items;
        self
    }

    /// Replace the contact list
    #[must_use]
    pub fn with_contacts(self, contacts: Vec<Contact>) -> Self {
        self.state.lock().contacts = contacts;
        self
    }

    /// Make every call fail with [`RemoteError::Unavailable`]
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Make recorded actions come back with `success: false`
    pub fn set_reject_actions(&self, reject: bool) {
        self.state.lock().reject_actions = reject;
    }

    /// Insert or replace an item as if it changed remotely
    pub fn upsert(&self, item: TimelineItem) {
        let mut state = self.state.lock();
        let position = state
            .items
            .iter()
            .position(|existing| existing.id.is_some() && existing.id == item.id);
        match position {
            Some(index) => state.items[index] = item,
            None => state.items.push(item),
        }
    }

    /// Actions recorded so far
    #[must_use]
    pub fn recorded_actions(&self) -> Vec<UserAction> {
        self.state.lock().actions.clone()
    }

    /// Items inserted so far
    #[must_use]
    pub fn recorded_inserts(&self) -> Vec<TimelineItem> {
        self.state.lock().inserted.clone()
    }

    /// Patches applied so far
    #[must_use]
    pub fn recorded_patches(&self) -> Vec<(String, TimelinePatch)> {
        self.state.lock().patches.clone()
    }

    /// Locations reported so far
    #[must_use]
    pub fn recorded_locations(&self) -> Vec<Location> {
        self.state.lock().locations.clone()
    }

    fn check_online(state: &DemoState) -> Result<(), RemoteError> {
        if state.offline {
            Err(RemoteError::Unavailable("demo timeline is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteTimelineClient for DemoTimeline {
    fn name(&self) -> &'static str {
        "Demo"
    }

    async fn list(&self) -> Result<TimelineList, RemoteError> {
        let state = self.state.lock();
        Self::check_online(&state)?;
        Ok(TimelineList {
            items: state.items.clone(),
        })
    }

    async fn get(&self, id: &str) -> Result<TimelineItem, RemoteError> {
        let state = self.state.lock();
        Self::check_online(&state)?;
        state
            .items
            .iter()
            .find(|item| item.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    async fn insert(
        &self,
        item: &TimelineItem,
        media: Option<&MediaUpload>,
    ) -> Result<InsertReceipt, RemoteError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;

        let id = state.next_id.to_string();
        state.next_id += 1;

        let mut stored = item.clone();
        stored.id = Some(id.clone());
        if let Some(media) = media {
            stored.attachments.push(Attachment {
                id: None,
                content_type: media.content_type.clone(),
                content_url: Some(format!(
                    "data:{};base64,{}",
                    media.content_type, media.base64_data
                )),
            });
        }

        state.inserted.push(stored.clone());
        if stored.in_reply_to.is_none() {
            state.items.push(stored);
        }
        tracing::debug!(id = %id, "Demo timeline insert");

        Ok(InsertReceipt { id: Some(id) })
    }

    async fn patch(&self, id: &str, patch: &TimelinePatch) -> Result<InsertReceipt, RemoteError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;

        let item = state
            .items
            .iter_mut()
            .find(|item| item.id.as_deref() == Some(id))
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        if let Some(pinned) = patch.is_pinned {
            item.is_pinned = pinned;
        }
        if let Some(recipients) = &patch.recipients {
            item.recipients.clone_from(recipients);
        }
        state.patches.push((id.to_string(), patch.clone()));

        Ok(InsertReceipt {
            id: Some(id.to_string()),
        })
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;

        let item = state
            .items
            .iter_mut()
            .find(|item| item.id.as_deref() == Some(id))
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        // Keep a tombstone so the next list reports the deletion
        *item = TimelineItem {
            is_deleted: true,
            ..TimelineItem::with_id(id)
        };
        Ok(())
    }

    async fn insert_action(&self, action: &UserAction) -> Result<ActionReceipt, RemoteError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        state.actions.push(action.clone());
        Ok(ActionReceipt {
            success: !state.reject_actions,
        })
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, RemoteError> {
        let state = self.state.lock();
        Self::check_online(&state)?;
        Ok(state.contacts.clone())
    }

    async fn insert_location(&self, location: &Location) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        Self::check_online(&state)?;
        state.locations.push(location.clone());
        Ok(())
    }
}

// =============================================================================
// Demo content
// =============================================================================

const MOON_IMAGE: &str =
    "https://lh6.googleusercontent.com/-wS9sJ-3oHao/TRnf4MmmlvI/AAAAAAAABX4/BebMZPistPo/s967/2010_09_20+-+Moon.jpg";
const SAMPLE_IMAGE: &str =
    "https://lh5.googleusercontent.com/-L7PvYS3WeJQ/TvqB-VcRklI/AAAAAAAAP9U/eEBCbBNS9bY/s1012/IMG_0135-2.jpg";

fn menu(actions: &[&str]) -> Vec<MenuItem> {
    actions.iter().map(|action| MenuItem::builtin(action)).collect()
}

fn dated(id: &str, created: &str, updated: &str) -> TimelineItem {
    TimelineItem {
        created: Some(created.to_string()),
        updated: Some(updated.to_string()),
        ..TimelineItem::with_id(id)
    }
}

fn image(url: &str) -> Vec<Attachment> {
    vec![Attachment {
        id: None,
        content_type: "image/jpeg".to_string(),
        content_url: Some(url.to_string()),
    }]
}

/// The demo timeline: plain text, an HTML bundle, plain HTML, a three-card
/// bundle, a pinnable image card and a map card
#[must_use]
pub fn demo_items() -> Vec<TimelineItem> {
    vec![
        TimelineItem {
            text: Some("Just some text... easiest Card ever".to_string()),
            menu_items: menu(&["SHARE", "REPLY"]),
            ..dated("7", "2013-04-12T16:21:41.000000", "2013-04-12T16:21:41.000000")
        },
        TimelineItem {
            html: Some(
                "<article><section><p class=\"text-x-large\">Html Bundle Cards</p>\
                 <p class=\"text-normal\">have a cover page...</p></section></article>"
                    .to_string(),
            ),
            html_pages: vec![
                "<article><section><p class=\"text-normal align-left blue\">...and...</p></section></article>".to_string(),
                "<article><section><p class=\"text-normal align-center red\">...several...</p></section></article>".to_string(),
                "<article><section><p class=\"text-normal align-right green\">...pages.</p></section></article>".to_string(),
            ],
            menu_items: menu(&["SHARE"]),
            display_date: Some(chrono::Utc::now().to_rfc3339()),
            ..dated("6", "2013-04-12T16:21:41.000000", "2013-04-12T16:21:41.000000")
        },
        TimelineItem {
            html: Some(format!(
                "<article><figure><img src=\"{MOON_IMAGE}\" style=\"width: 100%\"></figure>\
                 <section><ul><li>Just</li><li>some</li><li>simple</li><li>html</li></ul></section></article>"
            )),
            ..dated("5", "2013-04-12T15:35:41.000000", "2013-04-16T15:35:41.000000")
        },
        TimelineItem {
            text: Some("Card Bundles can have mixed content, like an image...".to_string()),
            attachments: image(MOON_IMAGE),
            menu_items: menu(&["SHARE", "REPLY"]),
            bundle_id: Some("123".to_string()),
            ..dated("3", "2013-04-12T15:34:41.000000", "2013-04-12T15:34:41.000000")
        },
        TimelineItem {
            text: Some("...or just text...".to_string()),
            menu_items: vec![MenuItem {
                action: Some("CUSTOM".to_string()),
                id: Some("smile".to_string()),
                values: vec![MenuValue {
                    state: Some("DEFAULT".to_string()),
                    display_name: Some("Smile".to_string()),
                    icon_url: Some(
                        "http://cdn4.iconfinder.com/data/icons/gnome-desktop-icons-png/PNG/48/Gnome-Face-Smile-48.png"
                            .to_string(),
                    ),
                }],
            }],
            bundle_id: Some("123".to_string()),
            ..dated("4", "2013-04-12T15:33:41.000000", "2013-04-12T15:33:41.000000")
        },
        TimelineItem {
            html: Some(
                "<article><section><p class=\"text-normal align-center\">...or maybe some \
                 <b class=\"blue\">HTML</b></p></section></article>"
                    .to_string(),
            ),
            menu_items: menu(&["READ_ALOUD"]),
            bundle_id: Some("123".to_string()),
            ..dated("2", "2013-04-12T15:32:41.000000", "2013-04-12T15:32:41.000000")
        },
        TimelineItem {
            text: Some("Sample Image Card".to_string()),
            attachments: image(SAMPLE_IMAGE),
            menu_items: menu(&["SHARE", "REPLY", "TOGGLE_PINNED"]),
            ..dated("1", "2013-04-12T15:31:41.000000", "2013-04-12T15:31:41.000000")
        },
        TimelineItem {
            html: Some(
                "<article><section><div class=\"text-auto-size\"><p class=\"yellow\">12 minutes to home</p>\
                 <p>Medium traffic on Broadway</p></div></section></article>"
                    .to_string(),
            ),
            menu_items: menu(&["NAVIGATE"]),
            location: Some(Location {
                display_name: Some("Home".to_string()),
                ..Location::at(42.369_59, -71.107_132)
            }),
            ..dated("8", "2013-04-22T16:00:00.000000", "2013-04-22T16:00:00.000000")
        },
    ]
}

/// The demo share targets
#[must_use]
pub fn demo_contacts() -> Vec<Contact> {
    vec![
        Contact {
            id: Some("fireworks".to_string()),
            display_name: Some("Fireworks".to_string()),
            image_urls: vec![
                "https://lh3.googleusercontent.com/-ZO4sujjRC-A/UOIniBoro3I/AAAAAAAAx8s/HQ5EhSH8YuA/s1013/IMG_1720.jpg"
                    .to_string(),
            ],
            accept_types: vec!["image/*".to_string()],
        },
        Contact {
            id: Some("android".to_string()),
            display_name: Some("Android".to_string()),
            image_urls: vec![
                "https://lh4.googleusercontent.com/-qmJ8gxQYMkc/T0v4Ker0nRI/AAAAAAAATME/CzdYK65ZSuc/s1013/IMG_7706.JPG"
                    .to_string(),
            ],
            accept_types: vec!["image/*".to_string()],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_seeded_content() {
        let demo = DemoTimeline::seeded();
        let list = assert_ok!(demo.list().await);
        assert_eq!(list.items.len(), 8);
        assert_eq!(
            list.items
                .iter()
                .filter(|item| item.bundle() == Some("123"))
                .count(),
            3
        );
        assert_eq!(assert_ok!(demo.list_contacts().await).len(), 2);
    }

    #[tokio::test]
    async fn test_insert_assigns_fresh_ids() {
        let demo = DemoTimeline::new();
        let first = assert_ok!(demo.insert(&TimelineItem::default(), None).await);
        let second = assert_ok!(demo.insert(&TimelineItem::default(), None).await);
        assert_eq!(first.id.as_deref(), Some("100"));
        assert_eq!(second.id.as_deref(), Some("101"));
        assert_eq!(assert_ok!(demo.list().await).items.len(), 2);
    }

    #[tokio::test]
    async fn test_replies_stay_off_the_timeline() {
        let demo = DemoTimeline::new();
        let reply = TimelineItem {
            text: Some("ok".to_string()),
            in_reply_to: Some("7".to_string()),
            ..Default::default()
        };
        assert_ok!(demo.insert(&reply, None).await);
        assert_eq!(demo.recorded_inserts().len(), 1);
        assert!(assert_ok!(demo.list().await).items.is_empty());
    }

    #[tokio::test]
    async fn test_delete_leaves_tombstone() {
        let demo = DemoTimeline::seeded();
        assert_ok!(demo.delete("7").await);
        let item = assert_ok!(demo.get("7").await);
        assert!(item.is_deleted);
        assert!(matches!(
            demo.delete("missing").await,
            Err(RemoteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let demo = DemoTimeline::seeded();
        demo.set_reject_actions(true);
        let receipt = assert_ok!(demo.insert_action(&UserAction::timeline("7", "SHARE")).await);
        assert!(!receipt.success);

        demo.set_offline(true);
        assert!(matches!(
            demo.list().await,
            Err(RemoteError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_patch_updates_pin() {
        let demo = DemoTimeline::seeded();
        let patch = TimelinePatch {
            is_pinned: Some(true),
            ..Default::default()
        };
        assert_ok!(demo.patch("1", &patch).await);
        assert!(assert_ok!(demo.get("1").await).is_pinned);
        assert_eq!(demo.recorded_patches().len(), 1);
    }
}
