//! Card Tree
//!
//! Ownership and lookup over [`CardNode`]s.
//!
//! # Storage
//!
//! Nodes live in a generational arena. A [`NodeKey`] names a slot plus the
//! generation it was allocated in, so a key held across an await point (an
//! in-flight action, a pending completion) simply stops resolving once its
//! card is removed instead of aliasing a newer card.
//!
//! # Ownership
//!
//! A parent owns the keys in its `children` and `action_children`; removing
//! it removes them post-order. The `parent` field is a back-reference only.
//! Some nodes are held by the tree without an owning parent (share targets,
//! the reply and map cards) and get a weak parent via [`CardTree::link_parent`]
//! while they are lent out.

use thiserror::Error;

use crate::card::{compare_cards, CardId, CardKind, CardNode, MenuAction, Payload, UpdateOutcome};
use crate::remote::TimelineItem;

/// Handle to a node in a [`CardTree`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeKey {
    index: u32,
    generation: u32,
}

/// Which sibling collection a node belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Plane {
    /// Ordinary children
    Cards,
    /// Action children (the menu plane)
    Actions,
}

impl Plane {
    /// Plane a card of `kind` lives in
    #[must_use]
    pub fn of(kind: CardKind) -> Self {
        if kind == CardKind::Action {
            Self::Actions
        } else {
            Self::Cards
        }
    }
}

/// Structural errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// The key no longer names a live node
    #[error("Card no longer exists: {0:?}")]
    StaleKey(NodeKey),

    /// The node's parent was removed before it could be detached
    #[error("Parent of card {card} was already removed")]
    ParentRemoved {
        /// Card being detached
        card: CardId,
    },

    /// The parent already owns a different node with this id
    #[error("Card {parent} already has a child {id}")]
    DuplicateId {
        /// Parent card
        parent: CardId,
        /// Conflicting id
        id: CardId,
    },

    /// The root card cannot be removed or re-parented
    #[error("The root card cannot be removed or moved")]
    Root,
}

struct Slot {
    generation: u32,
    node: Option<CardNode>,
}

/// Arena-backed card tree rooted at the Start card
pub struct CardTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeKey,
    share_targets: Vec<NodeKey>,
    next_arrival: u64,
}

impl Default for CardTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CardTree {
    /// Create a tree holding only the Start card
    #[must_use]
    pub fn new() -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeKey {
                index: 0,
                generation: 0,
            },
            share_targets: Vec::new(),
            next_arrival: 0,
        };
        tree.root = tree.insert_detached(CardNode::new(crate::card::ids::START, CardKind::Start));
        tree
    }

    /// The Start card
    #[must_use]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Resolve a key
    #[must_use]
    pub fn get(&self, key: NodeKey) -> Option<&CardNode> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    /// Resolve a key mutably
    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut CardNode> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Whether the key names a live node
    #[must_use]
    pub fn contains(&self, key: NodeKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of live nodes, including the root and detached nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    fn node(&self, key: NodeKey) -> Result<&CardNode, TreeError> {
        self.get(key).ok_or(TreeError::StaleKey(key))
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut CardNode, TreeError> {
        self.get_mut(key).ok_or(TreeError::StaleKey(key))
    }

    // =========================================================================
    // Insertion and linking
    // =========================================================================

    /// Store a node without a parent
    pub fn insert_detached(&mut self, mut node: CardNode) -> NodeKey {
        node.parent = None;
        node.arrival = self.next_arrival;
        self.next_arrival += 1;

        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeKey {
                    index,
                    generation: 0,
                }
            }
        }
    }

    fn owned(&self, parent: NodeKey, plane: Plane) -> Result<&[NodeKey], TreeError> {
        let node = self.node(parent)?;
        Ok(match plane {
            Plane::Cards => &node.children,
            Plane::Actions => &node.action_children,
        })
    }

    fn child_with_id(&self, parent: NodeKey, plane: Plane, id: &CardId) -> Result<Option<NodeKey>, TreeError> {
        Ok(self
            .owned(parent, plane)?
            .iter()
            .copied()
            .find(|&key| self.get(key).is_some_and(|n| &n.id == id)))
    }

    /// Insert `node` under `parent` unless a child with the same id exists.
    ///
    /// Returns the key of the new node, or of the existing one.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::StaleKey`] if `parent` is gone.
    pub fn add_child(&mut self, parent: NodeKey, node: CardNode) -> Result<NodeKey, TreeError> {
        self.add_in_plane(parent, node, Plane::Cards)
    }

    /// Insert an action card under `parent` unless one with the same id exists
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::StaleKey`] if `parent` is gone.
    pub fn add_action_child(&mut self, parent: NodeKey, node: CardNode) -> Result<NodeKey, TreeError> {
        self.add_in_plane(parent, node, Plane::Actions)
    }

    fn add_in_plane(&mut self, parent: NodeKey, node: CardNode, plane: Plane) -> Result<NodeKey, TreeError> {
        if let Some(existing) = self.child_with_id(parent, plane, &node.id)? {
            return Ok(existing);
        }
        let key = self.insert_detached(node);
        self.attach(parent, key, plane)?;
        Ok(key)
    }

    /// Make `parent` the owner of `child`, taking it from any current owner
    ///
    /// # Errors
    ///
    /// Fails on stale keys, on moving the root, or when `parent` already owns
    /// another node with the same id.
    pub fn attach(&mut self, parent: NodeKey, child: NodeKey, plane: Plane) -> Result<(), TreeError> {
        if child == self.root {
            return Err(TreeError::Root);
        }
        let child_id = self.node(child)?.id.clone();
        match self.child_with_id(parent, plane, &child_id)? {
            Some(existing) if existing == child => return Ok(()),
            Some(_) => {
                return Err(TreeError::DuplicateId {
                    parent: self.node(parent)?.id.clone(),
                    id: child_id,
                })
            }
            None => {}
        }

        self.unlink(child);
        let owner = self.node_mut(parent)?;
        match plane {
            Plane::Cards => owner.children.push(child),
            Plane::Actions => owner.action_children.push(child),
        }
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Remove `child` from its owner's lists if the owner is alive
    fn unlink(&mut self, child: NodeKey) {
        let Some(parent) = self.get(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(owner) = self.get_mut(parent) {
            owner.children.retain(|&k| k != child);
            owner.action_children.retain(|&k| k != child);
        }
    }

    /// Detach `child` from its parent, leaving it alive and parentless.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::ParentRemoved`] when the recorded parent no longer
    /// exists. The back-reference is cleared either way.
    pub fn detach(&mut self, child: NodeKey) -> Result<(), TreeError> {
        if child == self.root {
            return Err(TreeError::Root);
        }
        let node = self.node(child)?;
        let Some(parent) = node.parent else {
            return Ok(());
        };
        let card = node.id.clone();

        let alive = self.contains(parent);
        self.unlink(child);
        self.node_mut(child)?.parent = None;

        if alive {
            Ok(())
        } else {
            Err(TreeError::ParentRemoved { card })
        }
    }

    /// Point `child`'s back-reference at `parent` without transferring ownership
    ///
    /// # Errors
    ///
    /// Fails if either key is stale.
    pub fn link_parent(&mut self, child: NodeKey, parent: NodeKey) -> Result<(), TreeError> {
        self.node(parent)?;
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Depth-first search below the root by id.
    ///
    /// With `local_only` only the root's immediate children are searched.
    #[must_use]
    pub fn find(&self, id: &str, local_only: bool) -> Option<NodeKey> {
        self.find_in(self.root, id, local_only)
    }

    /// Depth-first search below `scope` (excluding `scope` itself)
    #[must_use]
    pub fn find_in(&self, scope: NodeKey, id: &str, local_only: bool) -> Option<NodeKey> {
        let node = self.get(scope)?;
        for &child in &node.children {
            let Some(card) = self.get(child) else {
                continue;
            };
            if card.id.as_str() == id {
                return Some(child);
            }
            if !local_only {
                if let Some(found) = self.find_in(child, id, false) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Every node below the root carrying `bundle_id`, in arrival order
    #[must_use]
    pub fn find_by_bundle(&self, bundle_id: &str) -> Vec<NodeKey> {
        let mut found = Vec::new();
        self.collect_bundle(self.root, bundle_id, &mut found);
        found.sort_by_key(|&key| self.get(key).map_or(u64::MAX, CardNode::arrival));
        found
    }

    fn collect_bundle(&self, scope: NodeKey, bundle_id: &str, out: &mut Vec<NodeKey>) {
        let Some(node) = self.get(scope) else {
            return;
        };
        for &child in &node.children {
            if self
                .get(child)
                .is_some_and(|c| c.bundle_id.as_deref() == Some(bundle_id))
            {
                out.push(child);
            }
            self.collect_bundle(child, bundle_id, out);
        }
    }

    // =========================================================================
    // Ordering and position
    // =========================================================================

    /// Owned children of `parent` in display order.
    ///
    /// HTML bundle pages keep their page order; everything else is sorted
    /// with [`compare_cards`].
    #[must_use]
    pub fn sorted_children(&self, parent: NodeKey, plane: Plane) -> Vec<NodeKey> {
        let Ok(owned) = self.owned(parent, plane) else {
            return Vec::new();
        };
        let mut keys: Vec<NodeKey> = owned.iter().copied().filter(|&k| self.contains(k)).collect();

        let fixed_order = plane == Plane::Cards
            && self.get(parent).is_some_and(|p| p.kind == CardKind::HtmlBundle);
        if !fixed_order {
            keys.sort_by(|&a, &b| match (self.get(a), self.get(b)) {
                (Some(a), Some(b)) => compare_cards(a, b),
                _ => std::cmp::Ordering::Equal,
            });
        }
        keys
    }

    /// The ordered sibling set `key` navigates within.
    ///
    /// Share targets lent to a SHARE action card are siblings of each other.
    /// A node with no parent, or one only weakly linked, is alone.
    #[must_use]
    pub fn siblings(&self, key: NodeKey) -> Vec<NodeKey> {
        let Some(node) = self.get(key) else {
            return Vec::new();
        };
        let Some(parent) = node.parent.and_then(|p| self.get(p).map(|n| (p, n))) else {
            return vec![key];
        };

        if node.kind == CardKind::Share
            && parent.1.kind == CardKind::Action
            && parent.1.payload.action() == Some(&MenuAction::Share)
        {
            return self
                .share_targets
                .iter()
                .copied()
                .filter(|&k| self.contains(k))
                .collect();
        }

        let siblings = self.sorted_children(parent.0, Plane::of(node.kind));
        if siblings.contains(&key) {
            siblings
        } else {
            vec![key]
        }
    }

    /// Index of `key` among its siblings
    #[must_use]
    pub fn position_of(&self, key: NodeKey) -> Option<usize> {
        self.siblings(key).iter().position(|&k| k == key)
    }

    /// Size of `key`'s sibling set
    #[must_use]
    pub fn sibling_count(&self, key: NodeKey) -> usize {
        self.siblings(key).len()
    }

    /// Sibling of `key` at `index`
    #[must_use]
    pub fn sibling_at(&self, key: NodeKey, index: usize) -> Option<NodeKey> {
        self.siblings(key).get(index).copied()
    }

    // =========================================================================
    // Share targets
    // =========================================================================

    /// Replace the share targets
    pub fn set_share_targets(&mut self, targets: Vec<CardNode>) {
        for key in std::mem::take(&mut self.share_targets) {
            self.free_subtree(key, &mut Vec::new());
        }
        let keys: Vec<NodeKey> = targets
            .into_iter()
            .map(|node| self.insert_detached(node))
            .collect();
        self.share_targets = keys;
    }

    /// Live share targets in contact order
    #[must_use]
    pub fn share_targets(&self) -> Vec<NodeKey> {
        self.share_targets
            .iter()
            .copied()
            .filter(|&k| self.contains(k))
            .collect()
    }

    // =========================================================================
    // Removal and mutation
    // =========================================================================

    /// Remove `key` and everything it owns, children first.
    ///
    /// Returns the removed ids in removal order. A parent that was already
    /// removed is logged, not fatal.
    ///
    /// # Errors
    ///
    /// Fails on a stale key or on the root.
    pub fn remove(&mut self, key: NodeKey) -> Result<Vec<CardId>, TreeError> {
        if key == self.root {
            return Err(TreeError::Root);
        }
        self.node(key)?;

        if let Err(e) = self.detach(key) {
            tracing::warn!(error = %e, "Removing card whose parent is gone");
        }
        self.share_targets.retain(|&k| k != key);

        let mut removed = Vec::new();
        self.free_subtree(key, &mut removed);
        Ok(removed)
    }

    fn free_subtree(&mut self, key: NodeKey, removed: &mut Vec<CardId>) {
        let Some(node) = self.get(key) else {
            return;
        };
        let owned: Vec<NodeKey> = node
            .children
            .iter()
            .chain(node.action_children.iter())
            .copied()
            .collect();
        for child in owned {
            self.free_subtree(child, removed);
        }

        let slot = &mut self.slots[key.index as usize];
        if let Some(node) = slot.node.take() {
            removed.push(node.id);
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
    }

    /// Re-key a card; action children derived from the old id follow it
    ///
    /// # Errors
    ///
    /// Fails if `key` is stale.
    pub fn rename(&mut self, key: NodeKey, new_id: CardId) -> Result<(), TreeError> {
        let node = self.node_mut(key)?;
        let old_id = std::mem::replace(&mut node.id, new_id.clone());
        let actions = node.action_children.clone();

        let prefix = format!("{old_id}_");
        for action in actions {
            if let Some(card) = self.get_mut(action) {
                if let Some(suffix) = card.id.as_str().strip_prefix(&prefix) {
                    card.id = CardId::new(format!("{new_id}_{suffix}"));
                }
            }
        }
        Ok(())
    }

    /// Build the card for a remote item (with pages and action children) and
    /// store it detached.
    ///
    /// Returns `None` for items without an id.
    pub fn insert_item(&mut self, item: &TimelineItem) -> Option<NodeKey> {
        let node = CardNode::from_item(item)?;
        let key = self.insert_detached(node);
        self.sync_pages(key, &item.html_pages);
        self.rebuild_actions(key);
        Some(key)
    }

    /// Refresh an existing card from a newer remote item
    ///
    /// # Errors
    ///
    /// Fails if `key` is stale.
    pub fn refresh_item(&mut self, key: NodeKey, item: &TimelineItem) -> Result<UpdateOutcome, TreeError> {
        let node = self.node_mut(key)?;
        let outcome = node.update(item);
        match (node.kind, item.html_pages.is_empty()) {
            (CardKind::Content, false) => node.kind = CardKind::HtmlBundle,
            (CardKind::HtmlBundle, true) => node.kind = CardKind::Content,
            _ => {}
        }
        if matches!(node.kind, CardKind::HtmlBundle | CardKind::Content) {
            self.sync_pages(key, &item.html_pages);
        }
        self.rebuild_actions(key);
        Ok(outcome)
    }

    /// Make the page children of `key` match `pages`, keeping live keys
    fn sync_pages(&mut self, key: NodeKey, pages: &[String]) {
        let Some(node) = self.get(key) else {
            return;
        };
        let parent_id = node.id.clone();
        let wanted: Vec<CardId> = (0..pages.len()).map(|i| CardId::page(&parent_id, i)).collect();

        let stale: Vec<NodeKey> = node
            .children
            .iter()
            .copied()
            .filter(|&k| {
                self.get(k).is_some_and(|c| {
                    c.id.as_str().starts_with(&format!("{parent_id}_")) && !wanted.contains(&c.id)
                        && c.bundle_id.is_none()
                })
            })
            .collect();
        for page in stale {
            if let Err(e) = self.remove(page) {
                tracing::warn!(card = %parent_id, error = %e, "Failed to drop stale page");
            }
        }

        for (index, html) in pages.iter().enumerate() {
            let id = CardId::page(&parent_id, index);
            match self.find_in(key, id.as_str(), true) {
                Some(existing) => {
                    if let Some(page) = self.get_mut(existing) {
                        page.set_html(html.clone());
                    }
                }
                None => {
                    if let Err(e) = self.add_child(key, CardNode::html_page(&parent_id, index, html)) {
                        tracing::warn!(card = %parent_id, page = index, error = %e, "Failed to add page");
                    }
                }
            }
        }
    }

    /// Recreate the action children of `key` from its menu items.
    ///
    /// Existing action cards whose id is still wanted keep their key, so
    /// in-flight actions against them stay valid. Card bundles get none.
    pub fn rebuild_actions(&mut self, key: NodeKey) {
        let Some(node) = self.get(key) else {
            return;
        };
        let wanted: Vec<CardNode> = if node.kind == CardKind::CardBundle {
            Vec::new()
        } else {
            node.menu_items
                .iter()
                .filter_map(|item| CardNode::action_card(node, item))
                .collect()
        };
        let existing = node.action_children.clone();

        let mut kept = Vec::with_capacity(wanted.len());
        for card in wanted {
            let reuse = existing
                .iter()
                .copied()
                .find(|&k| self.get(k).is_some_and(|c| c.id == card.id));
            match reuse {
                Some(action) => {
                    if let Some(current) = self.get_mut(action) {
                        current.payload = card.payload;
                    }
                    kept.push(action);
                }
                None if kept
                    .iter()
                    .any(|&k| self.get(k).is_some_and(|c| c.id == card.id)) => {}
                None => {
                    let action = self.insert_detached(card);
                    if let Some(stored) = self.get_mut(action) {
                        stored.parent = Some(key);
                    }
                    kept.push(action);
                }
            }
        }

        for action in existing {
            if !kept.contains(&action) {
                let mut removed = Vec::new();
                self.free_subtree(action, &mut removed);
            }
        }
        if let Some(node) = self.get_mut(key) {
            node.action_children = kept;
        }
    }

    /// Drop owned children of `key` that do not carry `bundle_id`
    pub fn retain_bundle_members(&mut self, key: NodeKey, bundle_id: &str) -> Vec<CardId> {
        let Some(node) = self.get(key) else {
            return Vec::new();
        };
        let strays: Vec<NodeKey> = node
            .children
            .iter()
            .copied()
            .filter(|&k| {
                self.get(k)
                    .is_some_and(|c| c.bundle_id.as_deref() != Some(bundle_id))
            })
            .collect();

        let mut removed = Vec::new();
        for stray in strays {
            if let Ok(ids) = self.remove(stray) {
                removed.extend(ids);
            }
        }
        removed
    }

    /// The content card an action card acts on
    #[must_use]
    pub fn action_target(&self, action_card: NodeKey) -> Option<NodeKey> {
        let node = self.get(action_card)?;
        if node.kind != CardKind::Action {
            return None;
        }
        node.parent.filter(|&p| self.contains(p))
    }

    /// The action of an action card
    #[must_use]
    pub fn action_of(&self, action_card: NodeKey) -> Option<&MenuAction> {
        match &self.get(action_card)?.payload {
            Payload::Action { action, .. } => Some(action),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{parse_timestamp, MenuItem};
    use pretty_assertions::assert_eq;

    fn content(id: &str, date: Option<&str>) -> CardNode {
        let mut node = CardNode::new(id, CardKind::Content);
        node.display_date = date.and_then(parse_timestamp);
        node
    }

    fn ids(tree: &CardTree, keys: &[NodeKey]) -> Vec<String> {
        keys.iter()
            .map(|&k| tree.get(k).unwrap().id.to_string())
            .collect()
    }

    #[test]
    fn test_insert_find_remove_round_trip() {
        let mut tree = CardTree::new();
        let root = tree.root();
        let parent = tree.add_child(root, content("1", None)).unwrap();
        let child = tree.add_child(parent, content("1a", None)).unwrap();
        let grandchild = tree.add_child(child, content("1b", None)).unwrap();

        assert_eq!(tree.find("1", false), Some(parent));
        assert_eq!(tree.find("1b", false), Some(grandchild));

        let removed = tree.remove(parent).unwrap();
        assert_eq!(removed, vec![CardId::new("1b"), CardId::new("1a"), CardId::new("1")]);
        assert_eq!(tree.find("1", false), None);
        assert_eq!(tree.find("1b", false), None);
        assert!(!tree.contains(grandchild));
        assert!(tree.get(root).unwrap().children().is_empty());
    }

    #[test]
    fn test_add_child_is_idempotent() {
        let mut tree = CardTree::new();
        let root = tree.root();
        let first = tree.add_child(root, content("1", None)).unwrap();
        let size = tree.node_count();
        let second = tree.add_child(root, content("1", None)).unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.node_count(), size);
    }

    #[test]
    fn test_find_local_only() {
        let mut tree = CardTree::new();
        let root = tree.root();
        let bundle = tree.add_child(root, content("b", None)).unwrap();
        tree.add_child(bundle, content("inner", None)).unwrap();

        assert!(tree.find("inner", true).is_none());
        assert!(tree.find("inner", false).is_some());
        assert!(tree.find("b", true).is_some());
    }

    #[test]
    fn test_stale_key_does_not_alias_new_node() {
        let mut tree = CardTree::new();
        let root = tree.root();
        let old = tree.add_child(root, content("1", None)).unwrap();
        tree.remove(old).unwrap();
        let new = tree.add_child(root, content("2", None)).unwrap();

        assert_ne!(old, new);
        assert!(tree.get(old).is_none());
        assert_eq!(tree.get(new).unwrap().id.as_str(), "2");
    }

    #[test]
    fn test_positions_follow_comparator() {
        let mut tree = CardTree::new();
        let root = tree.root();
        let old = tree
            .add_child(root, content("old", Some("2013-04-01T00:00:00Z")))
            .unwrap();
        let new = tree
            .add_child(root, content("new", Some("2013-04-12T00:00:00Z")))
            .unwrap();
        let clock = tree.add_child(root, CardNode::new("clock", CardKind::Clock)).unwrap();

        assert_eq!(ids(&tree, &tree.siblings(old)), vec!["clock", "new", "old"]);
        assert_eq!(tree.position_of(clock), Some(0));
        assert_eq!(tree.position_of(new), Some(1));
        assert_eq!(tree.position_of(old), Some(2));
        assert_eq!(tree.sibling_count(old), 3);

        tree.get_mut(old).unwrap().is_pinned = true;
        assert_eq!(tree.position_of(old), Some(0));
        assert_eq!(tree.sibling_at(old, 1), Some(clock));
    }

    #[test]
    fn test_html_pages_keep_page_order() {
        let mut tree = CardTree::new();
        let item = TimelineItem {
            html: Some("cover".to_string()),
            html_pages: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            ..TimelineItem::with_id("6")
        };
        let key = tree.insert_item(&item).unwrap();
        let pages = tree.sorted_children(key, Plane::Cards);
        assert_eq!(ids(&tree, &pages), vec!["6_0", "6_1", "6_2"]);
        assert_eq!(tree.get(pages[1]).unwrap().payload.html(), Some("b"));
    }

    #[test]
    fn test_refresh_resyncs_html_pages() {
        let mut tree = CardTree::new();
        let pages = |list: &[&str]| list.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        let key = tree
            .insert_item(&TimelineItem {
                html: Some("cover".to_string()),
                html_pages: pages(&["a", "b", "c"]),
                ..TimelineItem::with_id("6")
            })
            .unwrap();
        let kept = tree.sorted_children(key, Plane::Cards)[1];
        let size = tree.node_count();

        tree.refresh_item(
            key,
            &TimelineItem {
                html: Some("cover".to_string()),
                html_pages: pages(&["a", "b2"]),
                ..TimelineItem::with_id("6")
            },
        )
        .unwrap();
        let now = tree.sorted_children(key, Plane::Cards);
        assert_eq!(ids(&tree, &now), vec!["6_0", "6_1"]);
        assert_eq!(now[1], kept);
        assert_eq!(tree.get(kept).unwrap().payload.html(), Some("b2"));
        assert_eq!(tree.node_count(), size - 1);

        tree.refresh_item(
            key,
            &TimelineItem {
                html: Some("cover".to_string()),
                ..TimelineItem::with_id("6")
            },
        )
        .unwrap();
        assert_eq!(tree.get(key).unwrap().kind, CardKind::Content);
        assert!(tree.get(key).unwrap().children().is_empty());
    }

    #[test]
    fn test_action_children_in_menu_order() {
        let mut tree = CardTree::new();
        let item = TimelineItem {
            text: Some("hello".to_string()),
            menu_items: vec![
                MenuItem::builtin("SHARE"),
                MenuItem::builtin("NAVIGATE"),
                MenuItem::builtin("REPLY"),
                MenuItem::builtin("READ_ALOUD"),
            ],
            ..TimelineItem::with_id("1")
        };
        let key = tree.insert_item(&item).unwrap();
        let actions = tree.sorted_children(key, Plane::Actions);
        assert_eq!(ids(&tree, &actions), vec!["1_SHARE", "1_REPLY", "1_READ_ALOUD"]);
        assert_eq!(tree.position_of(actions[1]), Some(1));
        assert_eq!(tree.action_target(actions[0]), Some(key));
        assert_eq!(tree.action_of(actions[0]), Some(&MenuAction::Share));
    }

    #[test]
    fn test_rebuild_actions_keeps_live_keys() {
        let mut tree = CardTree::new();
        let mut item = TimelineItem {
            menu_items: vec![MenuItem::builtin("SHARE"), MenuItem::builtin("REPLY")],
            ..TimelineItem::with_id("1")
        };
        let key = tree.insert_item(&item).unwrap();
        let share = tree.get(key).unwrap().action_children()[0];
        let reply = tree.get(key).unwrap().action_children()[1];

        item.menu_items = vec![MenuItem::builtin("SHARE")];
        tree.refresh_item(key, &item).unwrap();

        assert_eq!(tree.get(key).unwrap().action_children(), &[share]);
        assert!(tree.contains(share));
        assert!(!tree.contains(reply));
    }

    #[test]
    fn test_detach_from_removed_parent_is_reported() {
        let mut tree = CardTree::new();
        let root = tree.root();
        let parent = tree.add_child(root, content("p", None)).unwrap();
        let orphan = tree.insert_detached(content("o", None));
        tree.link_parent(orphan, parent).unwrap();
        tree.remove(parent).unwrap();

        assert_eq!(
            tree.detach(orphan),
            Err(TreeError::ParentRemoved {
                card: CardId::new("o")
            })
        );
        assert!(tree.get(orphan).unwrap().parent().is_none());
        assert_eq!(tree.detach(orphan), Ok(()));
    }

    #[test]
    fn test_attach_rejects_duplicate_ids() {
        let mut tree = CardTree::new();
        let root = tree.root();
        tree.add_child(root, content("1", None)).unwrap();
        let twin = tree.insert_detached(content("1", None));
        assert!(matches!(
            tree.attach(root, twin, Plane::Cards),
            Err(TreeError::DuplicateId { .. })
        ));
        assert_eq!(tree.remove(root), Err(TreeError::Root));
    }

    #[test]
    fn test_attach_moves_between_owners() {
        let mut tree = CardTree::new();
        let root = tree.root();
        let a = tree.add_child(root, content("a", None)).unwrap();
        let b = tree.add_child(root, content("b", None)).unwrap();
        tree.attach(a, b, Plane::Cards).unwrap();

        assert_eq!(tree.get(root).unwrap().children(), &[a]);
        assert_eq!(tree.get(a).unwrap().children(), &[b]);
        assert_eq!(tree.get(b).unwrap().parent(), Some(a));
    }

    #[test]
    fn test_find_by_bundle_in_arrival_order() {
        let mut tree = CardTree::new();
        let root = tree.root();
        let mut first = content("3", None);
        first.bundle_id = Some("123".to_string());
        let mut second = content("4", None);
        second.bundle_id = Some("123".to_string());
        let mut other = content("5", None);
        other.bundle_id = Some("999".to_string());

        let first = tree.add_child(root, first).unwrap();
        let other = tree.add_child(root, other).unwrap();
        let second = tree.add_child(other, second).unwrap();

        assert_eq!(tree.find_by_bundle("123"), vec![first, second]);
        assert!(tree.find_by_bundle("nope").is_empty());
    }

    #[test]
    fn test_share_targets_are_siblings_under_share_action() {
        let mut tree = CardTree::new();
        let item = TimelineItem {
            menu_items: vec![MenuItem::builtin("SHARE")],
            ..TimelineItem::with_id("1")
        };
        let content = tree.insert_item(&item).unwrap();
        let root = tree.root();
        tree.attach(root, content, Plane::Cards).unwrap();
        let share_action = tree.get(content).unwrap().action_children()[0];

        tree.set_share_targets(vec![
            CardNode::new("fireworks", CardKind::Share),
            CardNode::new("android", CardKind::Share),
        ]);
        let targets = tree.share_targets();
        for &target in &targets {
            tree.link_parent(target, share_action).unwrap();
        }

        assert_eq!(tree.siblings(targets[1]), targets);
        assert_eq!(tree.position_of(targets[1]), Some(1));

        // removing the content card leaves the contacts alone
        tree.remove(content).unwrap();
        assert_eq!(tree.share_targets().len(), 2);
        assert_eq!(tree.siblings(targets[0]), vec![targets[0]]);
    }

    #[test]
    fn test_rename_carries_action_ids() {
        let mut tree = CardTree::new();
        let item = TimelineItem {
            menu_items: vec![MenuItem::builtin("SHARE")],
            ..TimelineItem::with_id("new_1")
        };
        let key = tree.insert_item(&item).unwrap();
        tree.rename(key, CardId::new("42")).unwrap();

        let action = tree.get(key).unwrap().action_children()[0];
        assert_eq!(tree.get(key).unwrap().id.as_str(), "42");
        assert_eq!(tree.get(action).unwrap().id.as_str(), "42_SHARE");
    }

    #[test]
    fn test_retain_bundle_members() {
        let mut tree = CardTree::new();
        let root = tree.root();
        let cover = tree.add_child(root, content("3", None)).unwrap();
        tree.add_child(cover, content("page", None)).unwrap();
        let mut member = content("4", None);
        member.bundle_id = Some("123".to_string());
        let member = tree.add_child(cover, member).unwrap();

        let removed = tree.retain_bundle_members(cover, "123");
        assert_eq!(removed, vec![CardId::new("page")]);
        assert_eq!(tree.get(cover).unwrap().children(), &[member]);
    }
}
