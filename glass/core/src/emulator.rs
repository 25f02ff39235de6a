//! Emulator - The Session Context
//!
//! The `Emulator` owns everything one running timeline needs: the card tree,
//! the navigation engine, the action dispatcher and the sync schedule. It is
//! driven by three inputs, all handled on the task that owns it:
//!
//! - [`InputEvent`]s from a surface ([`Emulator::handle_event`])
//! - [`Completion`]s of remote work it spawned ([`Emulator::apply_completion`])
//! - timer ticks ([`Emulator::tick`])
//!
//! Everything it wants drawn goes out as [`RenderMessage`]s.
//!
//! Remote calls never run on the owning task. They are spawned, and their
//! results come back through the completion channel returned by
//! [`Emulator::new`], so the tree is only ever mutated between awaits.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::actions::{
    self, ActionDispatcher, ActionError, ActionJob, ActionKind, ActionOutcome, ActionRequest,
    ActionState, FlightId,
};
use crate::card::{ids, CardId, CardKind, CardNode, Image, Payload};
use crate::config::{EmulatorConfig, LocationConfig};
use crate::events::InputEvent;
use crate::location::{Geolocator, Location};
use crate::messages::{CardSnapshot, RenderMessage};
use crate::navigation::{NavReport, NavigationEngine};
use crate::remote::{
    Contact, InsertReceipt, MenuItem, RemoteError, RemoteTimelineClient, TimelineItem,
    TimelineList, TimelinePatch,
};
use crate::sync::{self, TimelineSync};
use crate::tree::{CardTree, NodeKey};

/// Phrases that open the camera from the clock card
const PHOTO_HOTWORDS: [&str; 2] = ["take a picture", "take a photo"];

/// Result of remote work spawned by the emulator
#[derive(Debug)]
pub enum Completion {
    /// A timeline poll finished
    Timeline(Result<TimelineList, RemoteError>),

    /// A pushed item was fetched
    Item {
        /// Id that was fetched
        id: String,
        /// The item
        result: Result<TimelineItem, RemoteError>,
    },

    /// An action flight finished
    Action {
        /// Flight the result belongs to
        flight: FlightId,
        /// Outcome
        result: Result<ActionOutcome, ActionError>,
    },

    /// A pin toggle was written back
    Pinned {
        /// Card id
        id: String,
        /// Outcome
        result: Result<InsertReceipt, RemoteError>,
    },

    /// A location report was posted
    LocationReported(Result<Location, ActionError>),
}

/// Receiving side of the completion channel
pub type CompletionReceiver = mpsc::UnboundedReceiver<Completion>;

/// A running timeline session
pub struct Emulator<R: RemoteTimelineClient + ?Sized + 'static> {
    remote: Arc<R>,
    geolocator: Arc<dyn Geolocator>,

    tree: CardTree,
    nav: NavigationEngine,
    dispatcher: ActionDispatcher,
    sync: TimelineSync,
    contacts: Vec<Contact>,

    location: LocationConfig,
    next_location_report: Option<Instant>,
    photo_count: u64,
    /// Labels last sent for the active card
    shown_labels: Option<(NodeKey, Option<String>, Option<String>)>,

    tx: mpsc::Sender<RenderMessage>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<R: RemoteTimelineClient + ?Sized + 'static> Emulator<R> {
    /// Create a session. The returned receiver yields the results of remote
    /// work; feed them back through [`Self::apply_completion`].
    pub fn new(
        remote: Arc<R>,
        geolocator: Arc<dyn Geolocator>,
        config: &EmulatorConfig,
        tx: mpsc::Sender<RenderMessage>,
    ) -> (Self, CompletionReceiver) {
        let (completions, completion_rx) = mpsc::unbounded_channel();
        let mut tree = CardTree::new();
        let nav = NavigationEngine::new(&mut tree);

        let emulator = Self {
            remote,
            geolocator,
            tree,
            nav,
            dispatcher: ActionDispatcher::new(),
            sync: TimelineSync::new(config.sync.mode, config.sync.poll_interval),
            contacts: Vec::new(),
            location: config.location,
            next_location_report: None,
            photo_count: 0,
            shown_labels: None,
            tx,
            completions,
        };
        (emulator, completion_rx)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The card tree
    pub fn tree(&self) -> &CardTree {
        &self.tree
    }

    /// The navigation engine
    pub fn navigation(&self) -> &NavigationEngine {
        &self.nav
    }

    /// The action dispatcher
    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// The poll schedule
    pub fn timeline_sync(&self) -> &TimelineSync {
        &self.sync
    }

    /// Contacts available as share targets
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// The remote client
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// The active card
    pub fn active(&self) -> NodeKey {
        self.nav.active()
    }

    /// The active card's node
    pub fn active_card(&self) -> Option<&CardNode> {
        self.tree.get(self.nav.active())
    }

    /// Snapshot of a card as it would be drawn now
    pub fn snapshot(&self, key: NodeKey) -> Option<CardSnapshot> {
        CardSnapshot::capture(&self.tree, key, &Local::now())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load contacts and the initial timeline, then show the Start card.
    ///
    /// Remote failures are logged; the session starts with whatever loaded.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();

        match self.remote.list_contacts().await {
            Ok(contacts) => self.set_contacts(contacts),
            Err(e) => warn!(remote = self.remote.name(), error = %e, "Failed to load contacts"),
        }

        let report = self.nav.start(&mut self.tree);
        self.emit(report);

        match self.remote.list().await {
            Ok(list) => self.apply_timeline(&list.items),
            Err(e) => warn!(remote = self.remote.name(), error = %e, "Initial timeline load failed"),
        }
        self.sync.finish_poll(now);

        if self.location.enabled {
            self.next_location_report = Some(now);
        }

        info!(
            remote = self.remote.name(),
            mode = %self.sync.mode(),
            cards = self.tree.node_count(),
            "Emulator started"
        );
        Ok(())
    }

    /// Replace the share targets
    pub fn set_contacts(&mut self, contacts: Vec<Contact>) {
        let targets = contacts.iter().filter_map(CardNode::share_target).collect();
        self.tree.set_share_targets(targets);
        debug!(count = contacts.len(), "Share targets loaded");
        self.contacts = contacts;
    }

    // =========================================================================
    // Surface events
    // =========================================================================

    /// Handle one event from the surface
    pub async fn handle_event(&mut self, event: InputEvent) -> anyhow::Result<()> {
        if let Some(gesture) = event.navigation() {
            let report = self.nav.handle(&mut self.tree, gesture);
            self.emit(report);
            return Ok(());
        }

        match event {
            InputEvent::Dictation { text } => self.dictation(text),
            InputEvent::Hotword { phrase } => self.hotword(&phrase),
            InputEvent::PhotoCaptured {
                data_uri,
                content_type,
            } => self.photo_captured(data_uri, content_type)?,
            InputEvent::TimelineChanged { item_id } => self.fetch_item(item_id),
            InputEvent::SyncRequested => self.sync_now(),
            InputEvent::Pointer { .. } | InputEvent::Key { .. } | InputEvent::Gesture { .. } => {}
        }
        Ok(())
    }

    fn active_kind(&self) -> Option<CardKind> {
        self.active_card().map(|c| c.kind)
    }

    fn dictation(&mut self, text: String) {
        if self.active_kind() != Some(CardKind::Reply) {
            debug!("Dictation outside the reply card");
            return;
        }
        let reply_card = self.nav.active();
        let Some(action_card) = self.tree.get(reply_card).and_then(CardNode::parent) else {
            return;
        };
        let Some(content) = self.tree.action_target(action_card) else {
            debug!("Reply card is not lent to an action card");
            return;
        };

        if let Some(card) = self.tree.get_mut(reply_card) {
            card.set_media(text.clone(), None);
        }
        self.send_update(reply_card);

        self.dispatch(ActionRequest::Reply {
            reply_card,
            action_card,
            content,
            text,
        });
    }

    fn hotword(&mut self, phrase: &str) {
        if self.active_kind() != Some(CardKind::Clock) {
            return;
        }
        let phrase = phrase.to_lowercase();
        if PHOTO_HOTWORDS.iter().any(|h| phrase.contains(h)) {
            let camera = self.nav.landmarks().camera;
            let report = self.nav.switch_to(&mut self.tree, camera);
            self.emit(report);
        } else {
            debug!(phrase = %phrase, "Unrecognised hotword");
        }
    }

    fn photo_captured(&mut self, data_uri: String, content_type: String) -> anyhow::Result<()> {
        if self.active_kind() != Some(CardKind::Camera) {
            debug!("Photo captured outside the camera card");
            return Ok(());
        }
        self.photo_count += 1;

        let mut card = CardNode::new(
            CardId::new(format!("{}{}", ids::PHOTO_PREFIX, self.photo_count)),
            CardKind::Content,
        );
        card.set_media(
            "",
            Some(Image {
                url: data_uri,
                content_type: Some(content_type),
            }),
        );
        card.display_date = Some(Utc::now());
        card.local_only = true;
        card.menu_items = vec![MenuItem::builtin("SHARE")];

        let root = self.tree.root();
        let key = self
            .tree
            .add_child(root, card)
            .context("Failed to attach captured photo")?;
        self.tree.rebuild_actions(key);
        info!(card = %self.tree.get(key).map_or("", |c| c.id.as_str()), "Photo captured");

        let report = self.nav.switch_to(&mut self.tree, key);
        self.emit(report);
        Ok(())
    }

    // =========================================================================
    // Timeline sync
    // =========================================================================

    /// Start a full timeline poll unless one is already running
    pub fn sync_now(&mut self) {
        if !self.sync.begin_poll() {
            debug!("Poll already in flight");
            return;
        }
        let remote = Arc::clone(&self.remote);
        self.spawn(async move { Completion::Timeline(remote.list().await) });
    }

    fn fetch_item(&mut self, id: String) {
        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let result = remote.get(&id).await;
            Completion::Item { id, result }
        });
    }

    fn apply_timeline(&mut self, items: &[TimelineItem]) {
        let report = sync::reconcile(&mut self.tree, items);
        for id in &report.removed {
            self.send(RenderMessage::CardRemoved { id: id.clone() });
        }
        if !report.changed() {
            return;
        }
        self.send(RenderMessage::synced(&report));

        let nav = self.nav.revalidate(&mut self.tree);
        if nav.is_empty() {
            self.send_update(self.nav.active());
            if let Some(backdrop) = self.nav.backdrop() {
                self.send_update(backdrop);
            }
        } else {
            self.emit(nav);
        }
    }

    // =========================================================================
    // Completions
    // =========================================================================

    /// Apply the result of spawned remote work
    pub fn apply_completion(&mut self, completion: Completion, now: Instant) {
        match completion {
            Completion::Timeline(result) => {
                match result {
                    Ok(list) => self.apply_timeline(&list.items),
                    Err(e) => warn!(remote = self.remote.name(), error = %e, "Timeline poll failed"),
                }
                self.sync.finish_poll(now);
            }
            Completion::Item { id, result } => match result {
                Ok(item) => self.apply_timeline(&[item]),
                Err(RemoteError::NotFound(_)) => {
                    debug!(card = %id, "Pushed item is gone, deleting");
                    let deleted = TimelineItem {
                        is_deleted: true,
                        ..TimelineItem::with_id(id)
                    };
                    self.apply_timeline(&[deleted]);
                }
                Err(e) => warn!(card = %id, error = %e, "Failed to fetch pushed item"),
            },
            Completion::Action { flight, result } => self.finish_flight(flight, result, now),
            Completion::Pinned { id, result } => match result {
                Ok(_) => debug!(card = %id, "Pin state saved"),
                Err(e) => warn!(card = %id, error = %e, "Failed to save pin state"),
            },
            Completion::LocationReported(result) => match result {
                Ok(location) => debug!(
                    latitude = ?location.latitude,
                    longitude = ?location.longitude,
                    "Location reported"
                ),
                Err(e) => warn!(error = %e, "Location report failed"),
            },
        }
    }

    fn finish_flight(
        &mut self,
        flight: FlightId,
        result: Result<ActionOutcome, ActionError>,
        now: Instant,
    ) {
        let Some(f) = self.dispatcher.flight(flight).cloned() else {
            return;
        };
        if !self.tree.contains(f.action_card) || !self.tree.contains(f.content) {
            debug!(action = f.kind.label(), "Card removed while action was in flight");
            self.dispatcher.abandon(flight);
            return;
        }

        let ok = result.is_ok();
        match result {
            Ok(ActionOutcome::Shared { new_id: Some(id) }) => {
                match self.tree.rename(f.content, CardId::new(id.clone())) {
                    Ok(()) => {
                        if let Some(card) = self.tree.get_mut(f.content) {
                            card.local_only = false;
                        }
                        info!(card = %id, "Local card persisted");
                    }
                    Err(e) => warn!(error = %e, "Failed to re-key shared card"),
                }
            }
            Ok(ActionOutcome::Route { from, to }) => {
                self.send(RenderMessage::MapRequested { from, to });
                let report = self.nav.show_map(&mut self.tree, f.action_card, f.content);
                self.emit(report);
            }
            Ok(outcome) => info!(action = f.kind.label(), ?outcome, "Action succeeded"),
            Err(e) => warn!(action = f.kind.label(), error = %e, "Action failed"),
        }

        if let Some(settled) = self.dispatcher.settle(flight, ok, now) {
            let state = settled.state;
            self.send_feedback(f.feedback_card, f.kind, state);
        }
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Advance timers: take down expired feedback, start a due poll, refresh
    /// the active card's labels, report the location when due
    pub fn tick(&mut self, now: Instant) {
        for flight in self.dispatcher.expire(now) {
            self.send_feedback(flight.feedback_card, flight.kind, ActionState::Idle);
            let report = self
                .nav
                .finish_action(&mut self.tree, flight.feedback_card, flight.content);
            self.emit(report);
        }

        if self.sync.is_due(now) {
            self.sync_now();
        }

        self.refresh_labels();

        if self.location.enabled && self.next_location_report.is_some_and(|at| now >= at) {
            self.next_location_report = Some(now + self.location.report_interval);
            self.report_location();
        }
    }

    fn refresh_labels(&mut self) {
        let active = self.nav.active();
        let Some(snapshot) = self.snapshot(active) else {
            return;
        };
        let labels = (active, snapshot.title.clone(), snapshot.date_label.clone());
        if self.shown_labels.as_ref() != Some(&labels) {
            self.shown_labels = Some(labels);
            self.send(RenderMessage::CardUpdated { card: snapshot });
        }
    }

    fn report_location(&self) {
        let remote = Arc::clone(&self.remote);
        let geolocator = Arc::clone(&self.geolocator);
        self.spawn(async move {
            let result = async {
                let location = geolocator.current().await?;
                remote.insert_location(&location).await?;
                Ok::<Location, ActionError>(location)
            }
            .await;
            Completion::LocationReported(result)
        });
    }

    // =========================================================================
    // Action dispatch
    // =========================================================================

    fn dispatch(&mut self, request: ActionRequest) {
        let (kind, action_card, feedback_card, content, job) = match request {
            ActionRequest::Share {
                share_card,
                action_card,
                content,
            } => {
                let Some(recipient) = self.recipient(share_card) else {
                    warn!("Share target has no matching contact");
                    return;
                };
                let Some(card) = self.tree.get(content) else {
                    return;
                };
                let job = ActionJob::Share {
                    content_id: card.id.to_string(),
                    local_only: card.local_only,
                    text: card.payload.text().unwrap_or_default().to_string(),
                    image_url: card.payload.image().map(|i| i.url.clone()),
                    menu_items: card.menu_items.clone(),
                    recipient,
                };
                (ActionKind::Share, action_card, share_card, content, job)
            }
            ActionRequest::Reply {
                reply_card,
                action_card,
                content,
                text,
            } => {
                let Some(card) = self.tree.get(content) else {
                    return;
                };
                let job = ActionJob::Reply {
                    content_id: card.id.to_string(),
                    text,
                };
                (ActionKind::Reply, action_card, reply_card, content, job)
            }
            ActionRequest::Custom {
                action_card,
                content,
            } => {
                let action_id = match self.tree.get(action_card).map(|c| &c.payload) {
                    Some(Payload::Action { action_id, .. }) => action_id.clone(),
                    _ => return,
                };
                let Some(card) = self.tree.get(content) else {
                    return;
                };
                let job = ActionJob::Custom {
                    content_id: card.id.to_string(),
                    action_id,
                };
                (ActionKind::Custom, action_card, action_card, content, job)
            }
            ActionRequest::Navigate {
                action_card,
                content,
            } => {
                let destination = self.tree.get(content).and_then(|c| c.location.clone());
                let job = ActionJob::Navigate { destination };
                (ActionKind::Navigate, action_card, action_card, content, job)
            }
            ActionRequest::TogglePinned { content, pinned } => {
                self.save_pin(content, pinned);
                return;
            }
        };

        let Some(flight) = self
            .dispatcher
            .begin(kind, action_card, feedback_card, content)
        else {
            debug!(action = kind.label(), "Action already sending, ignoring");
            return;
        };
        self.send_feedback(feedback_card, kind, ActionState::Sending);

        let remote = Arc::clone(&self.remote);
        let geolocator = Arc::clone(&self.geolocator);
        self.spawn(async move {
            let result = actions::run(remote.as_ref(), geolocator.as_ref(), job).await;
            Completion::Action { flight, result }
        });
    }

    fn recipient(&self, share_card: NodeKey) -> Option<Contact> {
        let id = &self.tree.get(share_card)?.id;
        self.contacts
            .iter()
            .find(|c| c.id.as_deref() == Some(id.as_str()))
            .cloned()
    }

    fn save_pin(&self, content: NodeKey, pinned: bool) {
        let Some(card) = self.tree.get(content) else {
            return;
        };
        if card.local_only {
            return;
        }
        let id = card.id.to_string();
        let remote = Arc::clone(&self.remote);
        self.spawn(async move {
            let patch = TimelinePatch {
                is_pinned: Some(pinned),
                ..Default::default()
            };
            let result = remote.patch(&id, &patch).await;
            Completion::Pinned { id, result }
        });
    }

    // =========================================================================
    // Output
    // =========================================================================

    fn spawn<F>(&self, work: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let completions = self.completions.clone();
        tokio::spawn(async move {
            if completions.send(work.await).is_err() {
                debug!("Emulator dropped before remote work finished");
            }
        });
    }

    /// Turn a navigation report into render messages and dispatch its request
    fn emit(&mut self, report: NavReport) {
        for key in &report.hidden {
            if let Some(card) = self.tree.get(*key) {
                self.send(RenderMessage::CardHidden {
                    id: card.id.clone(),
                });
            }
        }
        for key in &report.backdropped {
            if let Some(card) = self.tree.get(*key) {
                self.send(RenderMessage::CardBackdrop {
                    id: card.id.clone(),
                });
            }
        }
        for directive in report.directives {
            self.send(RenderMessage::Directive(directive));
        }
        if let Some((key, transition)) = report.shown {
            if let Some(card) = self.snapshot(key) {
                self.shown_labels = Some((key, card.title.clone(), card.date_label.clone()));
                self.send(RenderMessage::CardShown { card, transition });
            }
        }
        if let Some(request) = report.request {
            self.dispatch(request);
        }
    }

    fn send_update(&self, key: NodeKey) {
        if let Some(card) = self.snapshot(key) {
            self.send(RenderMessage::CardUpdated { card });
        }
    }

    fn send_feedback(&self, feedback_card: NodeKey, action: ActionKind, state: ActionState) {
        if let Some(card) = self.tree.get(feedback_card) {
            self.send(RenderMessage::ActionFeedback {
                card: card.id.clone(),
                action,
                state,
            });
        }
    }

    /// Send a message to the surface
    fn send(&self, msg: RenderMessage) {
        if let Err(e) = self.tx.try_send(msg) {
            warn!("Failed to send render message (channel may be full): {}", e);
        }
    }
}
