//! Navigation Engine
//!
//! Tracks the active card and turns gestures into transitions over the
//! [`CardTree`].
//!
//! # Transitions
//!
//! ```text
//!   TAP/UP    Share target       -> share request
//!             Action card        -> start its action
//!             page of HTML bundle with actions -> introduce bundle's first action
//!             Content with actions -> introduce first action (content stays as backdrop)
//!             anything with children -> switch to first child (Start prefers Clock)
//!   DOWN      Action card        -> restore its content card
//!             card lent to an action card -> back to the action card
//!             otherwise          -> switch to parent
//!   LEFT      next sibling (no wraparound)
//!   RIGHT     previous sibling (no wraparound)
//! ```
//!
//! Every operation returns a [`NavReport`] describing what changed. Dead ends
//! return an empty report and leave state untouched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::ActionRequest;
use crate::card::{hooks, ids, CardKind, CardNode, Directive, MenuAction, Visibility};
use crate::gesture::Gesture;
use crate::tree::{CardTree, NodeKey, Plane};

/// How a card came on screen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Full replacement (hierarchy moves)
    Switch,
    /// Move to a neighbouring sibling
    Slide,
    /// Overlay on top of the previous card
    Introduce,
    /// Return from an overlay to the card underneath
    Restore,
}

/// Cards the engine creates and jumps to by name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Landmarks {
    /// Start card
    pub root: NodeKey,
    /// Clock, first child of Start
    pub clock: NodeKey,
    /// Camera, only child of Clock
    pub camera: NodeKey,
    /// Reply card, lent to REPLY action cards
    pub reply: NodeKey,
    /// Map card, lent to content cards for routes
    pub map: NodeKey,
}

/// Everything a navigation step changed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NavReport {
    /// Cards taken off screen
    pub hidden: Vec<NodeKey>,
    /// Cards left visible behind an overlay
    pub backdropped: Vec<NodeKey>,
    /// Card made active
    pub shown: Option<(NodeKey, Transition)>,
    /// Device directives from show/hide hooks
    pub directives: Vec<Directive>,
    /// Action to dispatch
    pub request: Option<ActionRequest>,
}

impl NavReport {
    /// Nothing changed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty()
            && self.backdropped.is_empty()
            && self.shown.is_none()
            && self.directives.is_empty()
            && self.request.is_none()
    }

    fn with_request(request: ActionRequest) -> Self {
        Self {
            request: Some(request),
            ..Self::default()
        }
    }
}

/// Active-card state machine
#[derive(Debug)]
pub struct NavigationEngine {
    active: NodeKey,
    backdrop: Option<NodeKey>,
    landmarks: Landmarks,
}

impl NavigationEngine {
    /// Create the engine and the cards it owns (clock, camera, reply, map).
    ///
    /// The Start card is active but not yet shown; call [`Self::start`].
    pub fn new(tree: &mut CardTree) -> Self {
        let root = tree.root();
        let clock = tree
            .add_child(root, CardNode::new(ids::CLOCK, CardKind::Clock))
            .unwrap_or(root);
        let camera = tree
            .add_child(clock, CardNode::new(ids::CAMERA, CardKind::Camera))
            .unwrap_or(clock);

        let mut reply = CardNode::new(ids::REPLY, CardKind::Reply);
        reply.set_media("", None);
        let reply = tree.insert_detached(reply);
        let map = tree.insert_detached(CardNode::new(ids::MAP, CardKind::Content));

        Self {
            active: root,
            backdrop: None,
            landmarks: Landmarks {
                root,
                clock,
                camera,
                reply,
                map,
            },
        }
    }

    /// Active card
    #[must_use]
    pub fn active(&self) -> NodeKey {
        self.active
    }

    /// Card visible behind the active overlay
    #[must_use]
    pub fn backdrop(&self) -> Option<NodeKey> {
        self.backdrop
    }

    /// Engine-owned cards
    #[must_use]
    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    /// Show the Start card
    pub fn start(&mut self, tree: &mut CardTree) -> NavReport {
        let mut report = NavReport::default();
        self.activate(tree, self.landmarks.root, Transition::Switch, false, &mut report);
        report
    }

    /// Apply a classified gesture to the active card
    pub fn handle(&mut self, tree: &mut CardTree, gesture: Gesture) -> NavReport {
        let mut report = self.revalidate(tree);
        let step = match gesture {
            Gesture::Tap | Gesture::Up => self.tap(tree),
            Gesture::Down => self.down(tree),
            Gesture::Left => self.slide(tree, 1),
            Gesture::Right => self.slide(tree, -1),
        };
        if step.is_empty() {
            debug!(gesture = %gesture, "Nothing to do for gesture");
        }
        merge(&mut report, step);
        report
    }

    /// Make `target` the active card with a full switch
    pub fn switch_to(&mut self, tree: &mut CardTree, target: NodeKey) -> NavReport {
        let mut report = NavReport::default();
        if tree.contains(target) {
            self.activate(tree, target, Transition::Switch, false, &mut report);
        }
        report
    }

    fn tap(&mut self, tree: &mut CardTree) -> NavReport {
        let active = self.active;
        let Some((kind, parent)) = tree.get(active).map(|c| (c.kind, c.parent())) else {
            return NavReport::default();
        };
        let mut report = NavReport::default();

        match kind {
            CardKind::Share => {
                let action_card = parent.filter(|&p| tree.contains(p));
                let content = action_card.and_then(|a| tree.action_target(a));
                if let (Some(action_card), Some(content)) = (action_card, content) {
                    report.request = Some(ActionRequest::Share {
                        share_card: active,
                        action_card,
                        content,
                    });
                }
                return report;
            }
            CardKind::Action => return self.start_action(tree, active),
            _ => {}
        }

        let parent_actions = parent
            .and_then(|p| tree.get(p))
            .filter(|p| p.kind == CardKind::HtmlBundle)
            .and_then(|p| p.action_children().first().copied());
        if kind == CardKind::Content {
            if let Some(first_action) = parent_actions {
                self.activate(tree, first_action, Transition::Introduce, false, &mut report);
                return report;
            }
        }

        let actions = tree.sorted_children(active, Plane::Actions);
        if kind == CardKind::Content {
            if let Some(&first_action) = actions.first() {
                self.activate(tree, first_action, Transition::Introduce, true, &mut report);
                return report;
            }
        }

        let children = tree.sorted_children(active, Plane::Cards);
        let target = if kind == CardKind::Start {
            children
                .iter()
                .copied()
                .find(|&k| tree.get(k).is_some_and(|c| c.kind == CardKind::Clock))
                .or_else(|| children.first().copied())
        } else {
            children.first().copied()
        };

        if let Some(target) = target {
            self.activate(tree, target, Transition::Switch, false, &mut report);
        }
        report
    }

    fn down(&mut self, tree: &mut CardTree) -> NavReport {
        let mut report = NavReport::default();
        let Some(card) = tree.get(self.active) else {
            return report;
        };

        if card.kind == CardKind::Action {
            if let Some(content) = tree.action_target(self.active) {
                self.activate(tree, content, Transition::Restore, false, &mut report);
            }
            return report;
        }

        let Some(parent) = card.parent().filter(|&p| tree.contains(p)) else {
            return report;
        };
        let transition = if tree.get(parent).is_some_and(|p| p.kind == CardKind::Action) {
            Transition::Restore
        } else {
            Transition::Switch
        };
        self.activate(tree, parent, transition, false, &mut report);
        report
    }

    fn slide(&mut self, tree: &mut CardTree, step: isize) -> NavReport {
        let mut report = NavReport::default();
        let Some(position) = tree.position_of(self.active) else {
            return report;
        };
        let Some(target) = position
            .checked_add_signed(step)
            .and_then(|index| tree.sibling_at(self.active, index))
        else {
            return report;
        };
        self.activate(tree, target, Transition::Slide, false, &mut report);
        report
    }

    /// Start the action of an action card (TAP on it)
    pub fn start_action(&mut self, tree: &mut CardTree, action_card: NodeKey) -> NavReport {
        let mut report = NavReport::default();
        let Some(action) = tree.action_of(action_card).cloned() else {
            return report;
        };
        let Some(content) = tree.action_target(action_card) else {
            return report;
        };

        match action {
            MenuAction::Share => {
                let targets = tree.share_targets();
                let Some(&first) = targets.first() else {
                    debug!("No share targets");
                    return report;
                };
                for target in targets {
                    let _ = tree.link_parent(target, action_card);
                }
                self.activate(tree, first, Transition::Introduce, false, &mut report);
            }
            MenuAction::Reply => {
                let reply = self.landmarks.reply;
                if let Some(card) = tree.get_mut(reply) {
                    card.set_media("", None);
                }
                let _ = tree.link_parent(reply, action_card);
                self.activate(tree, reply, Transition::Introduce, false, &mut report);
            }
            MenuAction::Custom => {
                report = NavReport::with_request(ActionRequest::Custom {
                    action_card,
                    content,
                });
            }
            MenuAction::Navigate => {
                report = NavReport::with_request(ActionRequest::Navigate {
                    action_card,
                    content,
                });
            }
            MenuAction::TogglePinned => {
                let pinned = match tree.get_mut(content) {
                    Some(card) => {
                        card.is_pinned = !card.is_pinned;
                        card.is_pinned
                    }
                    None => return report,
                };
                self.activate(tree, content, Transition::Restore, false, &mut report);
                report.request = Some(ActionRequest::TogglePinned { content, pinned });
            }
            MenuAction::ReadAloud => {
                if let Some(text) = tree.get(content).and_then(CardNode::readable_text) {
                    report.directives.push(Directive::Speak {
                        text: text.to_string(),
                    });
                }
            }
            MenuAction::Other(name) => debug!(action = %name, "Unsupported action"),
        }
        report
    }

    /// Close an action's feedback: if `feedback_card` is still active, return
    /// to the content card it acted on
    pub fn finish_action(
        &mut self,
        tree: &mut CardTree,
        feedback_card: NodeKey,
        content: NodeKey,
    ) -> NavReport {
        let mut report = NavReport::default();
        if self.active != feedback_card {
            return report;
        }
        if tree.contains(content) {
            self.activate(tree, content, Transition::Restore, false, &mut report);
        } else {
            self.activate(tree, self.landmarks.root, Transition::Switch, false, &mut report);
        }
        report
    }

    /// Show the map card for a route if `action_card` is still active
    pub fn show_map(&mut self, tree: &mut CardTree, action_card: NodeKey, content: NodeKey) -> NavReport {
        let mut report = NavReport::default();
        if self.active != action_card || !tree.contains(content) {
            return report;
        }
        let map = self.landmarks.map;
        let _ = tree.link_parent(map, content);
        self.activate(tree, map, Transition::Switch, false, &mut report);
        report
    }

    /// Recover after tree mutations: a removed backdrop is forgotten, a
    /// removed active card (or one whose parent is gone) falls back to the
    /// Start card
    pub fn revalidate(&mut self, tree: &mut CardTree) -> NavReport {
        let mut report = NavReport::default();
        if self.backdrop.is_some_and(|b| !tree.contains(b)) {
            self.backdrop = None;
        }
        let stranded = match tree.get(self.active) {
            None => true,
            Some(card) => {
                self.active != self.landmarks.root
                    && !card.parent().is_some_and(|p| tree.contains(p))
            }
        };
        if stranded {
            debug!("Active card was removed, returning to start");
            self.activate(tree, self.landmarks.root, Transition::Switch, false, &mut report);
        }
        report
    }

    // =========================================================================
    // Primitives
    // =========================================================================

    /// Make `new` active. With `keep_old` the previous card stays visible
    /// as the backdrop; otherwise it is hidden.
    fn activate(
        &mut self,
        tree: &mut CardTree,
        new: NodeKey,
        transition: Transition,
        keep_old: bool,
        report: &mut NavReport,
    ) {
        let Some(new_kind) = tree.get(new).map(|n| n.kind) else {
            return;
        };
        let old = self.active;

        if old != new {
            let old_visible = tree
                .get(old)
                .is_some_and(|n| n.visibility == Visibility::Active);
            if keep_old && old_visible {
                if let Some(card) = tree.get_mut(old) {
                    card.visibility = Visibility::Backdrop;
                }
                report.backdropped.push(old);
                if let Some(previous) = self.backdrop.replace(old) {
                    Self::hide(tree, previous, report);
                }
            } else {
                Self::hide(tree, old, report);
            }
        }

        if !keep_old {
            if let Some(backdrop) = self.backdrop {
                if backdrop == new {
                    self.backdrop = None;
                } else if !new_kind.is_overlay() {
                    Self::hide(tree, backdrop, report);
                    self.backdrop = None;
                }
            }
        }

        if let Some(card) = tree.get_mut(new) {
            card.visibility = Visibility::Active;
            report.directives.extend((hooks(card.kind).on_show)(card));
        }
        report.shown = Some((new, transition));
        self.active = new;
    }

    fn hide(tree: &mut CardTree, key: NodeKey, report: &mut NavReport) {
        let Some(card) = tree.get_mut(key) else {
            return;
        };
        if card.visibility == Visibility::Hidden {
            return;
        }
        card.visibility = Visibility::Hidden;
        report.hidden.push(key);
        report.directives.extend((hooks(card.kind).on_hide)(card));
    }
}

fn merge(into: &mut NavReport, step: NavReport) {
    into.hidden.extend(step.hidden);
    into.backdropped.extend(step.backdropped);
    if step.shown.is_some() {
        into.shown = step.shown;
    }
    into.directives.extend(step.directives);
    if step.request.is_some() {
        into.request = step.request;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::ListenMode;
    use crate::location::Location;
    use crate::remote::{MenuItem, TimelineItem};
    use pretty_assertions::assert_eq;

    fn setup() -> (CardTree, NavigationEngine) {
        let mut tree = CardTree::new();
        let mut nav = NavigationEngine::new(&mut tree);
        nav.start(&mut tree);
        (tree, nav)
    }

    fn add(tree: &mut CardTree, item: TimelineItem) -> NodeKey {
        let key = tree.insert_item(&item).unwrap();
        let root = tree.root();
        tree.attach(root, key, Plane::Cards).unwrap();
        key
    }

    fn dated(id: &str, date: &str) -> TimelineItem {
        TimelineItem {
            display_date: Some(date.to_string()),
            ..TimelineItem::with_id(id)
        }
    }

    fn id_of(tree: &CardTree, key: NodeKey) -> String {
        tree.get(key).unwrap().id.to_string()
    }

    #[test]
    fn test_tap_on_start_prefers_clock() {
        let (mut tree, mut nav) = setup();
        add(&mut tree, dated("1", "2013-04-12T00:00:00Z"));
        let report = nav.handle(&mut tree, Gesture::Tap);
        assert_eq!(id_of(&tree, nav.active()), "clock");
        assert_eq!(report.shown, Some((nav.landmarks().clock, Transition::Switch)));
        assert_eq!(
            report.directives,
            vec![Directive::StartListening(ListenMode::Hotword)]
        );
    }

    #[test]
    fn test_clock_tap_opens_camera_and_down_returns() {
        let (mut tree, mut nav) = setup();
        nav.handle(&mut tree, Gesture::Tap);
        let report = nav.handle(&mut tree, Gesture::Up);
        assert_eq!(nav.active(), nav.landmarks().camera);
        assert_eq!(
            report.directives,
            vec![Directive::StopListening, Directive::StartCamera]
        );

        nav.handle(&mut tree, Gesture::Down);
        assert_eq!(nav.active(), nav.landmarks().clock);
        nav.handle(&mut tree, Gesture::Down);
        assert_eq!(nav.active(), tree.root());

        // DOWN at the root is a dead end
        assert!(nav.handle(&mut tree, Gesture::Down).is_empty());
    }

    #[test]
    fn test_boundaries_clamp() {
        let (mut tree, mut nav) = setup();
        add(&mut tree, dated("a", "2013-04-12T00:00:00Z"));
        add(&mut tree, dated("b", "2013-04-11T00:00:00Z"));
        nav.handle(&mut tree, Gesture::Tap);

        // clock, a, b
        assert_eq!(tree.position_of(nav.active()), Some(0));
        assert!(nav.handle(&mut tree, Gesture::Right).is_empty());
        assert_eq!(id_of(&tree, nav.active()), "clock");

        nav.handle(&mut tree, Gesture::Left);
        nav.handle(&mut tree, Gesture::Left);
        assert_eq!(id_of(&tree, nav.active()), "b");
        assert!(nav.handle(&mut tree, Gesture::Left).is_empty());

        let report = nav.handle(&mut tree, Gesture::Right);
        assert_eq!(id_of(&tree, nav.active()), "a");
        assert_eq!(report.shown.map(|(_, t)| t), Some(Transition::Slide));
        nav.handle(&mut tree, Gesture::Left);
        assert_eq!(id_of(&tree, nav.active()), "b");
    }

    #[test]
    fn test_tap_without_children_is_noop() {
        let (mut tree, mut nav) = setup();
        let card = add(&mut tree, TimelineItem::with_id("1"));
        nav.switch_to(&mut tree, card);
        assert!(nav.handle(&mut tree, Gesture::Tap).is_empty());
        assert_eq!(nav.active(), card);
    }

    #[test]
    fn test_tap_introduces_first_action() {
        let (mut tree, mut nav) = setup();
        let card = add(
            &mut tree,
            TimelineItem {
                menu_items: vec![MenuItem::builtin("SHARE"), MenuItem::builtin("REPLY")],
                ..TimelineItem::with_id("1")
            },
        );
        nav.switch_to(&mut tree, card);

        let report = nav.handle(&mut tree, Gesture::Tap);
        let share = tree.get(card).unwrap().action_children()[0];
        assert_eq!(nav.active(), share);
        assert_eq!(report.shown, Some((share, Transition::Introduce)));
        assert_eq!(report.backdropped, vec![card]);
        assert!(report.hidden.is_empty());
        assert_eq!(tree.get(card).unwrap().visibility, Visibility::Backdrop);

        // sliding through the menu keeps the content behind it
        nav.handle(&mut tree, Gesture::Left);
        assert_eq!(id_of(&tree, nav.active()), "1_REPLY");
        assert_eq!(nav.backdrop(), Some(card));

        // DOWN dismisses the overlay
        let report = nav.handle(&mut tree, Gesture::Down);
        assert_eq!(report.shown, Some((card, Transition::Restore)));
        assert_eq!(nav.backdrop(), None);
        assert_eq!(tree.get(card).unwrap().visibility, Visibility::Active);
    }

    #[test]
    fn test_share_flow_through_targets() {
        let (mut tree, mut nav) = setup();
        tree.set_share_targets(vec![
            CardNode::new("fireworks", CardKind::Share),
            CardNode::new("android", CardKind::Share),
        ]);
        let card = add(
            &mut tree,
            TimelineItem {
                menu_items: vec![MenuItem::builtin("SHARE")],
                ..TimelineItem::with_id("1")
            },
        );
        nav.switch_to(&mut tree, card);
        nav.handle(&mut tree, Gesture::Tap);
        let action = nav.active();

        let report = nav.handle(&mut tree, Gesture::Tap);
        assert_eq!(id_of(&tree, nav.active()), "fireworks");
        assert_eq!(report.hidden, vec![action]);
        assert_eq!(nav.backdrop(), Some(card));

        nav.handle(&mut tree, Gesture::Left);
        assert_eq!(id_of(&tree, nav.active()), "android");

        let report = nav.handle(&mut tree, Gesture::Tap);
        assert_eq!(
            report.request,
            Some(ActionRequest::Share {
                share_card: nav.active(),
                action_card: action,
                content: card,
            })
        );

        // DOWN from a target goes back to the action card
        nav.handle(&mut tree, Gesture::Down);
        assert_eq!(nav.active(), action);
        assert_eq!(nav.backdrop(), Some(card));
    }

    #[test]
    fn test_share_without_targets_is_noop() {
        let (mut tree, mut nav) = setup();
        let card = add(
            &mut tree,
            TimelineItem {
                menu_items: vec![MenuItem::builtin("SHARE")],
                ..TimelineItem::with_id("1")
            },
        );
        nav.switch_to(&mut tree, card);
        nav.handle(&mut tree, Gesture::Tap);
        assert!(nav.handle(&mut tree, Gesture::Tap).is_empty());
    }

    #[test]
    fn test_reply_lends_reply_card() {
        let (mut tree, mut nav) = setup();
        let card = add(
            &mut tree,
            TimelineItem {
                menu_items: vec![MenuItem::builtin("REPLY")],
                ..TimelineItem::with_id("1")
            },
        );
        nav.switch_to(&mut tree, card);
        nav.handle(&mut tree, Gesture::Tap);
        let action = nav.active();

        let report = nav.handle(&mut tree, Gesture::Tap);
        let reply = nav.landmarks().reply;
        assert_eq!(nav.active(), reply);
        assert_eq!(tree.get(reply).unwrap().parent(), Some(action));
        assert_eq!(
            report.directives,
            vec![Directive::StartListening(ListenMode::Dictation)]
        );
    }

    #[test]
    fn test_custom_and_navigate_emit_requests() {
        let (mut tree, mut nav) = setup();
        let card = add(
            &mut tree,
            TimelineItem {
                location: Some(Location::at(42.0, -71.0)),
                menu_items: vec![
                    MenuItem {
                        action: Some("CUSTOM".to_string()),
                        id: Some("smile".to_string()),
                        ..Default::default()
                    },
                    MenuItem::builtin("NAVIGATE"),
                ],
                ..TimelineItem::with_id("4")
            },
        );
        nav.switch_to(&mut tree, card);
        nav.handle(&mut tree, Gesture::Tap);
        let custom = nav.active();
        let report = nav.handle(&mut tree, Gesture::Tap);
        assert_eq!(
            report.request,
            Some(ActionRequest::Custom {
                action_card: custom,
                content: card
            })
        );
        assert_eq!(nav.active(), custom);

        nav.handle(&mut tree, Gesture::Left);
        let navigate = nav.active();
        let report = nav.handle(&mut tree, Gesture::Tap);
        assert_eq!(
            report.request,
            Some(ActionRequest::Navigate {
                action_card: navigate,
                content: card
            })
        );

        let report = nav.show_map(&mut tree, navigate, card);
        assert_eq!(nav.active(), nav.landmarks().map);
        assert!(report.hidden.contains(&card));
        nav.handle(&mut tree, Gesture::Down);
        assert_eq!(nav.active(), card);
    }

    #[test]
    fn test_toggle_pinned_flips_and_returns() {
        let (mut tree, mut nav) = setup();
        let card = add(
            &mut tree,
            TimelineItem {
                menu_items: vec![MenuItem::builtin("TOGGLE_PINNED")],
                ..TimelineItem::with_id("1")
            },
        );
        nav.switch_to(&mut tree, card);
        nav.handle(&mut tree, Gesture::Tap);
        let report = nav.handle(&mut tree, Gesture::Tap);

        assert!(tree.get(card).unwrap().is_pinned);
        assert_eq!(nav.active(), card);
        assert_eq!(
            report.request,
            Some(ActionRequest::TogglePinned {
                content: card,
                pinned: true
            })
        );
    }

    #[test]
    fn test_read_aloud_speaks() {
        let (mut tree, mut nav) = setup();
        let card = add(
            &mut tree,
            TimelineItem {
                text: Some("hello there".to_string()),
                speakable_text: Some("hello, there".to_string()),
                menu_items: vec![MenuItem::builtin("READ_ALOUD")],
                ..TimelineItem::with_id("1")
            },
        );
        nav.switch_to(&mut tree, card);
        nav.handle(&mut tree, Gesture::Tap);
        let report = nav.handle(&mut tree, Gesture::Tap);
        assert_eq!(
            report.directives,
            vec![Directive::Speak {
                text: "hello, there".to_string()
            }]
        );
    }

    #[test]
    fn test_html_page_tap_introduces_bundle_action() {
        let (mut tree, mut nav) = setup();
        let bundle = add(
            &mut tree,
            TimelineItem {
                html: Some("cover".to_string()),
                html_pages: vec!["p0".to_string(), "p1".to_string()],
                menu_items: vec![MenuItem::builtin("SHARE")],
                ..TimelineItem::with_id("6")
            },
        );
        nav.switch_to(&mut tree, bundle);
        nav.handle(&mut tree, Gesture::Tap);
        let page = nav.active();
        assert_eq!(id_of(&tree, page), "6_0");

        let report = nav.handle(&mut tree, Gesture::Tap);
        assert_eq!(id_of(&tree, nav.active()), "6_SHARE");
        assert_eq!(report.hidden, vec![page]);
        assert!(report.backdropped.is_empty());

        nav.handle(&mut tree, Gesture::Down);
        assert_eq!(nav.active(), bundle);
    }

    #[test]
    fn test_finish_action_only_when_still_active() {
        let (mut tree, mut nav) = setup();
        let card = add(
            &mut tree,
            TimelineItem {
                menu_items: vec![MenuItem::builtin("REPLY")],
                ..TimelineItem::with_id("1")
            },
        );
        nav.switch_to(&mut tree, card);
        nav.handle(&mut tree, Gesture::Tap);
        nav.handle(&mut tree, Gesture::Tap);
        let reply = nav.landmarks().reply;

        assert!(nav.finish_action(&mut tree, card, card).is_empty());

        let report = nav.finish_action(&mut tree, reply, card);
        assert_eq!(nav.active(), card);
        assert_eq!(report.directives, vec![Directive::StopListening]);
        assert_eq!(nav.backdrop(), None);
    }

    #[test]
    fn test_removed_active_card_falls_back_to_start() {
        let (mut tree, mut nav) = setup();
        let card = add(&mut tree, TimelineItem::with_id("1"));
        nav.switch_to(&mut tree, card);
        tree.remove(card).unwrap();

        let report = nav.revalidate(&mut tree);
        assert_eq!(nav.active(), tree.root());
        assert_eq!(report.shown, Some((tree.root(), Transition::Switch)));
    }

    #[test]
    fn test_lent_card_falls_back_when_owner_removed() {
        let (mut tree, mut nav) = setup();
        tree.set_share_targets(vec![CardNode::new("fireworks", CardKind::Share)]);
        let card = add(
            &mut tree,
            TimelineItem {
                menu_items: vec![MenuItem::builtin("SHARE")],
                ..TimelineItem::with_id("1")
            },
        );
        nav.switch_to(&mut tree, card);
        nav.handle(&mut tree, Gesture::Tap);
        nav.handle(&mut tree, Gesture::Tap);
        assert_eq!(id_of(&tree, nav.active()), "fireworks");

        tree.remove(card).unwrap();
        nav.revalidate(&mut tree);
        assert_eq!(nav.active(), tree.root());
        assert_eq!(nav.backdrop(), None);
    }
}
