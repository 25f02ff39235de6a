//! Timeline Sync
//!
//! Merges batches of remote items into the [`CardTree`].
//!
//! # Passes
//!
//! ```text
//!   items ──▶ pass 1 (per item) ──────────────▶ pass 2 (per touched bundle)
//!             delete / update / create            elect cover, attach cover at
//!             bundled items parked as pending     the root, members below it
//! ```
//!
//! Bundle membership can span items delivered in any order within a batch,
//! so covers are only elected once every item of the batch has been seen.
//!
//! [`TimelineSync`] itself only owns the poll schedule; the session spawns
//! the actual `list()` call and feeds the result to [`reconcile`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::card::{CardId, CardKind};
use crate::remote::TimelineItem;
use crate::tree::{CardTree, NodeKey, Plane};

/// Default interval between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

// =============================================================================
// Schedule
// =============================================================================

/// How the timeline learns about remote changes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// List the whole timeline every interval
    #[default]
    Poll,
    /// Wait for change notifications and fetch single items
    Push,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poll => write!(f, "poll"),
            Self::Push => write!(f, "push"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poll" => Ok(Self::Poll),
            "push" => Ok(Self::Push),
            other => Err(format!("unknown sync mode '{other}' (expected poll or push)")),
        }
    }
}

/// Poll schedule. At most one poll is in flight; the next one is scheduled
/// when the current one finishes.
#[derive(Debug)]
pub struct TimelineSync {
    mode: SyncMode,
    interval: Duration,
    next_poll: Option<Instant>,
    in_flight: bool,
}

impl TimelineSync {
    /// Create a schedule. Nothing is due until the first poll finishes.
    #[must_use]
    pub fn new(mode: SyncMode, interval: Duration) -> Self {
        Self {
            mode,
            interval,
            next_poll: None,
            in_flight: false,
        }
    }

    /// Sync mode
    #[must_use]
    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Poll interval
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a scheduled poll should start now
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.mode == SyncMode::Poll && !self.in_flight && self.next_poll.is_some_and(|at| now >= at)
    }

    /// Mark a poll as started. Returns `false` if one is already running.
    pub fn begin_poll(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Mark the running poll as finished and schedule the next one
    pub fn finish_poll(&mut self, now: Instant) {
        self.in_flight = false;
        self.next_poll = Some(now + self.interval);
    }

    /// Whether a poll is running
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// When the next poll is due
    #[must_use]
    pub fn next_poll(&self) -> Option<Instant> {
        self.next_poll
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// What one reconciliation changed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Cards created
    pub created: Vec<NodeKey>,
    /// Cards refreshed in place
    pub updated: Vec<NodeKey>,
    /// Ids of removed cards (including cascaded children)
    pub removed: Vec<CardId>,
    /// Bundles (re)formed
    pub bundles: Vec<String>,
    /// Items skipped as malformed
    pub skipped: usize,
    /// Structural errors absorbed
    pub errors: usize,
}

impl SyncReport {
    /// Whether the tree changed
    #[must_use]
    pub fn changed(&self) -> bool {
        !(self.created.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
            && self.bundles.is_empty())
    }
}

/// Bundled cards waiting for pass 2, grouped by bundle id in first-seen order
#[derive(Default)]
struct Pending {
    groups: Vec<(String, Vec<NodeKey>)>,
}

impl Pending {
    fn push(&mut self, bundle_id: &str, key: NodeKey) {
        match self.groups.iter_mut().find(|(id, _)| id == bundle_id) {
            Some((_, members)) => {
                if !members.contains(&key) {
                    members.push(key);
                }
            }
            None => self.groups.push((bundle_id.to_string(), vec![key])),
        }
    }

    fn touch(&mut self, bundle_id: &str) {
        if !self.groups.iter().any(|(id, _)| id == bundle_id) {
            self.groups.push((bundle_id.to_string(), Vec::new()));
        }
    }

    fn find(&self, tree: &CardTree, id: &str) -> Option<NodeKey> {
        self.groups
            .iter()
            .flat_map(|(_, members)| members.iter().copied())
            .find(|&k| tree.get(k).is_some_and(|c| c.id.as_str() == id))
    }

    fn forget(&mut self, key: NodeKey) {
        for (_, members) in &mut self.groups {
            members.retain(|&k| k != key);
        }
    }
}

fn absorb(report: &mut SyncReport, result: Result<(), crate::tree::TreeError>) {
    if let Err(e) = result {
        warn!(error = %e, "Structural inconsistency during sync");
        report.errors += 1;
    }
}

/// Move the bundle members a cover owns into the pending group so the
/// bundle is re-formed in pass 2
fn release_members(tree: &mut CardTree, cover: NodeKey, bundle_id: &str, pending: &mut Pending, report: &mut SyncReport) {
    let members: Vec<NodeKey> = tree
        .get(cover)
        .map(|c| c.children().to_vec())
        .unwrap_or_default()
        .into_iter()
        .filter(|&k| {
            tree.get(k)
                .is_some_and(|c| c.bundle_id.as_deref() == Some(bundle_id))
        })
        .collect();
    for member in members {
        absorb(report, tree.detach(member));
        pending.push(bundle_id, member);
    }
    pending.touch(bundle_id);
}

/// Merge a batch of remote items into the tree
pub fn reconcile(tree: &mut CardTree, items: &[TimelineItem]) -> SyncReport {
    let mut report = SyncReport::default();
    let mut pending = Pending::default();
    let root = tree.root();

    for item in items {
        let Some(id) = item.remote_id() else {
            debug!("Skipping timeline item without id");
            report.skipped += 1;
            continue;
        };
        let existing = tree.find(id, false).or_else(|| pending.find(tree, id));

        if item.is_deleted {
            let Some(key) = existing else {
                debug!(card = %id, "Ignoring delete for unknown card");
                continue;
            };
            let (kind, bundle) = tree
                .get(key)
                .map(|c| (c.kind, c.bundle_id.clone()))
                .unwrap_or((CardKind::Content, None));
            if let Some(bundle) = bundle {
                if kind == CardKind::CardBundle {
                    release_members(tree, key, &bundle, &mut pending, &mut report);
                }
                pending.touch(&bundle);
            }
            pending.forget(key);
            match tree.remove(key) {
                Ok(ids) => report.removed.extend(ids),
                Err(e) => {
                    warn!(card = %id, error = %e, "Failed to remove card");
                    report.errors += 1;
                }
            }
            continue;
        }

        if let Some(key) = existing {
            let was_cover = tree.get(key).is_some_and(|c| c.kind == CardKind::CardBundle);
            let outcome = match tree.refresh_item(key, item) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(card = %id, error = %e, "Failed to update card");
                    report.errors += 1;
                    continue;
                }
            };
            report.updated.push(key);

            if outcome.bundle_changed {
                if let Some(previous) = outcome.previous_bundle.as_deref() {
                    if was_cover {
                        release_members(tree, key, previous, &mut pending, &mut report);
                    }
                    pending.touch(previous);
                }
                if let Some(node) = tree.get_mut(key) {
                    node.is_bundle_cover = false;
                    if node.kind == CardKind::CardBundle {
                        node.kind = CardKind::Content;
                    }
                }
                match item.bundle() {
                    Some(bundle) => {
                        pending.forget(key);
                        absorb(&mut report, tree.detach(key));
                        pending.push(bundle, key);
                    }
                    None => {
                        debug!(card = %id, "Card left its bundle, moving to root");
                        pending.forget(key);
                        absorb(&mut report, tree.attach(root, key, Plane::Cards));
                    }
                }
                tree.rebuild_actions(key);
            } else if outcome.cover_changed {
                if let Some(bundle) = item.bundle() {
                    debug!(card = %id, bundle = %bundle, "Cover flag changed, re-forming bundle");
                    pending.touch(bundle);
                }
            }
            continue;
        }

        let Some(key) = tree.insert_item(item) else {
            report.skipped += 1;
            continue;
        };
        report.created.push(key);
        match item.bundle() {
            Some(bundle) => pending.push(bundle, key),
            None => absorb(&mut report, tree.attach(root, key, Plane::Cards)),
        }
    }

    for (bundle_id, parked) in pending.groups {
        form_bundle(tree, &bundle_id, parked, &mut report);
    }

    if report.changed() || report.skipped > 0 || report.errors > 0 {
        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            bundles = report.bundles.len(),
            skipped = report.skipped,
            errors = report.errors,
            "Timeline reconciled"
        );
    }
    report
}

/// Elect a cover for `bundle_id` and hang every other member below it
fn form_bundle(tree: &mut CardTree, bundle_id: &str, parked: Vec<NodeKey>, report: &mut SyncReport) {
    let root = tree.root();
    let mut members = tree.find_by_bundle(bundle_id);
    for key in parked {
        let belongs = tree
            .get(key)
            .is_some_and(|c| c.bundle_id.as_deref() == Some(bundle_id));
        if belongs && !members.contains(&key) {
            members.push(key);
        }
    }
    members.sort_by_key(|&k| tree.get(k).map_or(u64::MAX, |c| c.arrival()));

    let Some(&first) = members.first() else {
        debug!(bundle = %bundle_id, "Bundle has no members left");
        return;
    };
    let cover = members
        .iter()
        .copied()
        .find(|&k| tree.get(k).is_some_and(|c| c.requested_cover))
        .unwrap_or(first);

    for &member in &members {
        absorb(report, tree.detach(member));
    }

    if let Some(node) = tree.get_mut(cover) {
        node.kind = CardKind::CardBundle;
        node.is_bundle_cover = true;
    }
    tree.rebuild_actions(cover);
    let strays = tree.retain_bundle_members(cover, bundle_id);
    report.removed.extend(strays);
    absorb(report, tree.attach(root, cover, Plane::Cards));

    for &member in members.iter().filter(|&&k| k != cover) {
        if let Some(node) = tree.get_mut(member) {
            node.is_bundle_cover = false;
            if node.kind == CardKind::CardBundle {
                node.kind = CardKind::Content;
            }
        }
        tree.rebuild_actions(member);
        absorb(report, tree.attach(cover, member, Plane::Cards));
    }

    debug!(bundle = %bundle_id, members = members.len(), "Bundle formed");
    report.bundles.push(bundle_id.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MenuItem;
    use pretty_assertions::assert_eq;

    fn item(id: &str) -> TimelineItem {
        TimelineItem::with_id(id)
    }

    fn bundled(id: &str, bundle: &str) -> TimelineItem {
        TimelineItem {
            bundle_id: Some(bundle.to_string()),
            ..item(id)
        }
    }

    fn deleted(id: &str) -> TimelineItem {
        TimelineItem {
            is_deleted: true,
            ..item(id)
        }
    }

    fn bundle_nodes(tree: &CardTree) -> Vec<NodeKey> {
        tree.get(tree.root())
            .unwrap()
            .children()
            .iter()
            .copied()
            .filter(|&k| tree.get(k).unwrap().kind == CardKind::CardBundle)
            .collect()
    }

    fn child_ids(tree: &CardTree, key: NodeKey) -> Vec<String> {
        let mut ids: Vec<String> = tree
            .get(key)
            .unwrap()
            .children()
            .iter()
            .map(|&k| tree.get(k).unwrap().id.to_string())
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_bundle_forms_regardless_of_order() {
        let orders = [
            ["3", "4", "2"],
            ["3", "2", "4"],
            ["4", "3", "2"],
            ["4", "2", "3"],
            ["2", "3", "4"],
            ["2", "4", "3"],
        ];
        for order in orders {
            let mut tree = CardTree::new();
            let items: Vec<TimelineItem> = order.iter().map(|id| bundled(id, "123")).collect();
            let report = reconcile(&mut tree, &items);

            let bundles = bundle_nodes(&tree);
            assert_eq!(bundles.len(), 1, "order {order:?}");
            let cover = tree.get(bundles[0]).unwrap();
            assert!(cover.is_bundle_cover);
            assert_eq!(cover.id.as_str(), order[0], "first arrival is the cover");
            assert_eq!(cover.children().len(), 2);
            for &child in cover.children() {
                assert_eq!(tree.get(child).unwrap().kind, CardKind::Content);
            }
            assert_eq!(report.bundles, vec!["123".to_string()]);
            assert_eq!(report.created.len(), 3);
        }
    }

    #[test]
    fn test_flagged_cover_wins() {
        let mut tree = CardTree::new();
        let items = vec![
            bundled("3", "123"),
            TimelineItem {
                is_bundle_cover: true,
                ..bundled("4", "123")
            },
            bundled("2", "123"),
        ];
        reconcile(&mut tree, &items);
        let cover = bundle_nodes(&tree)[0];
        assert_eq!(tree.get(cover).unwrap().id.as_str(), "4");
        assert_eq!(child_ids(&tree, cover), vec!["2", "3"]);
    }

    #[test]
    fn test_cover_flag_on_existing_member_moves_the_cover() {
        let mut tree = CardTree::new();
        reconcile(
            &mut tree,
            &[bundled("3", "123"), bundled("4", "123"), bundled("2", "123")],
        );
        assert_eq!(tree.get(bundle_nodes(&tree)[0]).unwrap().id.as_str(), "3");

        let report = reconcile(
            &mut tree,
            &[TimelineItem {
                is_bundle_cover: true,
                ..bundled("4", "123")
            }],
        );
        assert_eq!(report.bundles, vec!["123".to_string()]);

        let bundles = bundle_nodes(&tree);
        assert_eq!(bundles.len(), 1);
        let cover = tree.get(bundles[0]).unwrap();
        assert_eq!(cover.id.as_str(), "4");
        assert!(cover.is_bundle_cover);
        assert_eq!(child_ids(&tree, bundles[0]), vec!["2", "3"]);

        let old_cover = tree.get(tree.find("3", false).unwrap()).unwrap();
        assert_eq!(old_cover.kind, CardKind::Content);
        assert!(!old_cover.is_bundle_cover);
    }

    #[test]
    fn test_unchanged_bundle_member_does_not_reform() {
        let mut tree = CardTree::new();
        reconcile(&mut tree, &[bundled("3", "123"), bundled("4", "123")]);
        let report = reconcile(&mut tree, &[bundled("4", "123")]);
        assert!(report.bundles.is_empty());
        assert_eq!(tree.get(bundle_nodes(&tree)[0]).unwrap().id.as_str(), "3");
    }

    #[test]
    fn test_single_member_bundle_is_still_a_bundle() {
        let mut tree = CardTree::new();
        reconcile(&mut tree, &[bundled("9", "solo")]);
        let bundles = bundle_nodes(&tree);
        assert_eq!(bundles.len(), 1);
        assert!(tree.get(bundles[0]).unwrap().children().is_empty());
    }

    #[test]
    fn test_cover_never_gets_actions() {
        let mut tree = CardTree::new();
        let items = vec![
            TimelineItem {
                menu_items: vec![MenuItem::builtin("SHARE")],
                ..bundled("3", "123")
            },
            TimelineItem {
                menu_items: vec![MenuItem::builtin("SHARE")],
                ..bundled("4", "123")
            },
        ];
        reconcile(&mut tree, &items);
        let cover = tree.find("3", true).unwrap();
        let member = tree.find("4", false).unwrap();
        assert!(tree.get(cover).unwrap().action_children().is_empty());
        assert_eq!(tree.get(member).unwrap().action_children().len(), 1);
    }

    #[test]
    fn test_items_without_id_are_skipped() {
        let mut tree = CardTree::new();
        let report = reconcile(&mut tree, &[TimelineItem::default(), item("1")]);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.created.len(), 1);
        assert!(tree.find("1", true).is_some());
    }

    #[test]
    fn test_delete_removes_and_unknown_delete_is_ignored() {
        let mut tree = CardTree::new();
        reconcile(&mut tree, &[item("1")]);
        let size = tree.node_count();

        let report = reconcile(&mut tree, &[deleted("404")]);
        assert!(!report.changed());
        assert_eq!(tree.node_count(), size);

        let report = reconcile(&mut tree, &[deleted("1")]);
        assert_eq!(report.removed, vec![CardId::new("1")]);
        assert!(tree.find("1", false).is_none());
    }

    #[test]
    fn test_update_in_place() {
        let mut tree = CardTree::new();
        reconcile(
            &mut tree,
            &[TimelineItem {
                text: Some("before".to_string()),
                ..item("1")
            }],
        );
        let key = tree.find("1", true).unwrap();

        let report = reconcile(
            &mut tree,
            &[TimelineItem {
                html: Some("<p>after</p>".to_string()),
                ..item("1")
            }],
        );
        assert_eq!(report.updated, vec![key]);
        assert_eq!(tree.find("1", true), Some(key));
        let card = tree.get(key).unwrap();
        assert_eq!(card.payload.html(), Some("<p>after</p>"));
        assert_eq!(card.payload.text(), None);
    }

    #[test]
    fn test_member_leaving_bundle_moves_to_root() {
        let mut tree = CardTree::new();
        reconcile(
            &mut tree,
            &[bundled("3", "123"), bundled("4", "123"), bundled("2", "123")],
        );
        let member = tree.find("4", false).unwrap();
        assert!(tree.find("4", true).is_none());

        reconcile(&mut tree, &[item("4")]);
        assert_eq!(tree.find("4", true), Some(member));
        let cover = bundle_nodes(&tree)[0];
        assert_eq!(child_ids(&tree, cover), vec!["2"]);
    }

    #[test]
    fn test_card_joining_existing_bundle_keeps_cover() {
        let mut tree = CardTree::new();
        reconcile(&mut tree, &[bundled("3", "123"), bundled("4", "123"), item("5")]);
        let cover = bundle_nodes(&tree)[0];

        reconcile(&mut tree, &[bundled("5", "123")]);
        assert_eq!(bundle_nodes(&tree), vec![cover]);
        assert_eq!(child_ids(&tree, cover), vec!["4", "5"]);
        assert!(tree.find("5", true).is_none());
    }

    #[test]
    fn test_cover_losing_bundle_releases_members() {
        let mut tree = CardTree::new();
        reconcile(
            &mut tree,
            &[bundled("3", "123"), bundled("4", "123"), bundled("2", "123")],
        );
        let old_cover = tree.find("3", true).unwrap();

        reconcile(&mut tree, &[item("3")]);
        let old = tree.get(old_cover).unwrap();
        assert_eq!(old.kind, CardKind::Content);
        assert!(old.children().is_empty());

        let cover = bundle_nodes(&tree)[0];
        assert_eq!(tree.get(cover).unwrap().id.as_str(), "4");
        assert_eq!(child_ids(&tree, cover), vec!["2"]);
    }

    #[test]
    fn test_deleting_cover_reforms_bundle() {
        let mut tree = CardTree::new();
        reconcile(
            &mut tree,
            &[bundled("3", "123"), bundled("4", "123"), bundled("2", "123")],
        );

        let report = reconcile(&mut tree, &[deleted("3")]);
        assert_eq!(report.removed, vec![CardId::new("3")]);

        let bundles = bundle_nodes(&tree);
        assert_eq!(bundles.len(), 1);
        assert_eq!(tree.get(bundles[0]).unwrap().id.as_str(), "4");
        assert_eq!(child_ids(&tree, bundles[0]), vec!["2"]);
    }

    #[test]
    fn test_create_and_delete_in_one_batch() {
        let mut tree = CardTree::new();
        let report = reconcile(
            &mut tree,
            &[bundled("3", "123"), bundled("4", "123"), deleted("4")],
        );
        assert_eq!(report.removed, vec![CardId::new("4")]);
        let bundles = bundle_nodes(&tree);
        assert_eq!(bundles.len(), 1);
        assert!(tree.get(bundles[0]).unwrap().children().is_empty());
    }

    #[test]
    fn test_poll_schedule() {
        let mut sync = TimelineSync::new(SyncMode::Poll, Duration::from_secs(30));
        let now = Instant::now();
        assert!(!sync.is_due(now), "first poll is started explicitly");

        assert!(sync.begin_poll());
        assert!(!sync.begin_poll());
        sync.finish_poll(now);

        assert!(!sync.is_due(now + Duration::from_secs(29)));
        assert!(sync.is_due(now + Duration::from_secs(30)));

        let push = TimelineSync::new(SyncMode::Push, Duration::from_secs(30));
        assert!(!push.is_due(now + Duration::from_secs(3600)));
    }

    #[test]
    fn test_sync_mode_parsing() {
        assert_eq!("poll".parse::<SyncMode>(), Ok(SyncMode::Poll));
        assert_eq!(" PUSH ".parse::<SyncMode>(), Ok(SyncMode::Push));
        assert!("carrier pigeon".parse::<SyncMode>().is_err());
    }
}
