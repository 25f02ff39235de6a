//! Display State Types
//!
//! Types that represent the current display state for the TUI.
//! These are derived from `RenderMessage`s and used for rendering.
//!
//! # Design Philosophy
//!
//! The TUI is a "thin client" - it just renders what the emulator tells it to.
//! Display state is the bridge between `RenderMessage`s and rendering.
//!
//! - `DisplayState`: The card on screen, the card behind it and any overlays
//! - `DisplayFeedback`: Progress of an action drawn over a card
//! - `DeviceState`: What the simulated device hardware is doing

use std::collections::VecDeque;

use glass_core::{
    ids, ActionKind, ActionState, CardId, CardSnapshot, Directive, ListenMode, Location,
    RenderMessage, Transition,
};

/// How many activity lines to keep
const ACTIVITY_LIMIT: usize = 8;

/// Feedback for one action card
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayFeedback {
    /// Card the feedback is drawn on
    pub card: CardId,
    /// Workflow
    pub action: ActionKind,
    /// Current state (never `Idle`)
    pub state: ActionState,
}

impl DisplayFeedback {
    /// Banner text
    pub fn banner(&self) -> String {
        match self.state {
            ActionState::Sending => format!("{}...", self.action.label()),
            ActionState::Success => format!("{} \u{2713}", self.action.label()),
            ActionState::Failure => format!("{} failed", self.action.label()),
            ActionState::Idle => String::new(),
        }
    }
}

/// Simulated device hardware
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceState {
    /// Speech recogniser mode, if listening
    pub listening: Option<ListenMode>,
    /// Camera viewfinder open
    pub camera_on: bool,
    /// Last text read aloud
    pub spoken: Option<String>,
}

impl DeviceState {
    fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::StartListening(mode) => self.listening = Some(mode),
            Directive::StopListening => self.listening = None,
            Directive::StartCamera => self.camera_on = true,
            Directive::StopCamera => self.camera_on = false,
            Directive::Speak { text } => self.spoken = Some(text),
        }
    }
}

/// The full display state for the TUI
#[derive(Debug, Default)]
pub struct DisplayState {
    /// The active card
    pub active: Option<CardSnapshot>,
    /// Card left visible behind the active overlay
    pub backdrop: Option<CardSnapshot>,
    /// How the active card arrived
    pub transition: Option<Transition>,
    /// Action feedback banner
    pub feedback: Option<DisplayFeedback>,
    /// Last requested route
    pub route: Option<(Option<Location>, Location)>,
    /// Device hardware
    pub device: DeviceState,
    /// Summary of the last sync that changed something
    pub last_sync: Option<String>,
    /// Recent activity, newest last
    pub activity: VecDeque<String>,
}

impl DisplayState {
    /// Create a new display state
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a `RenderMessage` to update display state
    pub fn apply_message(&mut self, msg: RenderMessage) {
        match msg {
            // Navigation
            RenderMessage::CardShown { card, transition } => {
                if self.backdrop.as_ref().is_some_and(|b| b.id == card.id) {
                    self.backdrop = None;
                }
                self.active = Some(card);
                self.transition = Some(transition);
            }
            RenderMessage::CardHidden { id } => {
                if self.active.as_ref().is_some_and(|c| c.id == id) {
                    self.active = None;
                }
                if self.backdrop.as_ref().is_some_and(|c| c.id == id) {
                    self.backdrop = None;
                }
            }
            RenderMessage::CardBackdrop { id } => {
                if self.active.as_ref().is_some_and(|c| c.id == id) {
                    self.backdrop = self.active.take();
                }
            }

            // Tree changes
            RenderMessage::CardUpdated { card } => {
                if let Some(active) = self.active.as_mut().filter(|c| c.id == card.id) {
                    *active = card;
                } else if let Some(backdrop) = self.backdrop.as_mut().filter(|c| c.id == card.id)
                {
                    *backdrop = card;
                }
            }
            RenderMessage::CardRemoved { id } => {
                if self.feedback.as_ref().is_some_and(|f| f.card == id) {
                    self.feedback = None;
                }
                self.log(format!("removed {id}"));
            }
            RenderMessage::TimelineSynced {
                created,
                updated,
                removed,
                bundles,
            } => {
                let summary = format!("+{created} ~{updated} -{removed}");
                self.log(format!("synced {summary}"));
                for bundle in bundles {
                    self.log(format!("bundle {bundle}"));
                }
                self.last_sync = Some(summary);
            }

            // Actions
            RenderMessage::ActionFeedback {
                card,
                action,
                state,
            } => {
                if state == ActionState::Idle {
                    if self.feedback.as_ref().is_some_and(|f| f.card == card) {
                        self.feedback = None;
                    }
                } else {
                    if state.is_terminal() {
                        self.log(format!("{} {card}: {state:?}", action.label()));
                    }
                    self.feedback = Some(DisplayFeedback {
                        card,
                        action,
                        state,
                    });
                }
            }
            RenderMessage::MapRequested { from, to } => {
                self.route = Some((from, to));
            }
            RenderMessage::Directive(directive) => {
                if let Directive::Speak { text } = &directive {
                    self.log(format!("speak: {text}"));
                }
                self.device.apply(directive);
            }
        }
    }

    /// Feedback drawn on the active card, if any
    pub fn active_feedback(&self) -> Option<&DisplayFeedback> {
        let active = self.active.as_ref()?;
        self.feedback.as_ref().filter(|f| f.card == active.id)
    }

    /// Route to draw, when the map card is showing
    pub fn visible_route(&self) -> Option<&(Option<Location>, Location)> {
        let active = self.active.as_ref()?;
        if active.id.as_str() == ids::MAP {
            self.route.as_ref()
        } else {
            None
        }
    }

    /// Whether typed text goes to the reply card
    pub fn is_dictating(&self) -> bool {
        self.device.listening == Some(ListenMode::Dictation)
    }

    fn log(&mut self, line: String) {
        if self.activity.len() == ACTIVITY_LIMIT {
            self.activity.pop_front();
        }
        self.activity.push_back(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glass_core::{CardKind, Payload, ShadowCues};
    use pretty_assertions::assert_eq;

    fn snapshot(id: &str, kind: CardKind) -> CardSnapshot {
        CardSnapshot {
            id: CardId::new(id),
            kind,
            payload: Payload::Empty,
            title: None,
            date_label: None,
            position: 0,
            count: 1,
            shadows: ShadowCues::default(),
            style: "card".to_string(),
            pinned: false,
            local_only: false,
        }
    }

    fn shown(id: &str, kind: CardKind, transition: Transition) -> RenderMessage {
        RenderMessage::CardShown {
            card: snapshot(id, kind),
            transition,
        }
    }

    #[test]
    fn test_card_shown_replaces_active() {
        let mut state = DisplayState::new();
        state.apply_message(shown("clock", CardKind::Clock, Transition::Switch));
        state.apply_message(RenderMessage::CardHidden {
            id: CardId::new("clock"),
        });
        state.apply_message(shown("5", CardKind::Content, Transition::Slide));

        assert_eq!(state.active.as_ref().unwrap().id.as_str(), "5");
        assert_eq!(state.transition, Some(Transition::Slide));
        assert!(state.backdrop.is_none());
    }

    #[test]
    fn test_overlay_keeps_backdrop_until_restore() {
        let mut state = DisplayState::new();
        state.apply_message(shown("1_SHARE", CardKind::Action, Transition::Switch));
        state.apply_message(RenderMessage::CardBackdrop {
            id: CardId::new("1_SHARE"),
        });
        state.apply_message(shown("fireworks", CardKind::Share, Transition::Introduce));

        assert_eq!(state.backdrop.as_ref().unwrap().id.as_str(), "1_SHARE");
        assert_eq!(state.active.as_ref().unwrap().id.as_str(), "fireworks");

        state.apply_message(RenderMessage::CardHidden {
            id: CardId::new("fireworks"),
        });
        state.apply_message(shown("1_SHARE", CardKind::Action, Transition::Restore));
        assert!(state.backdrop.is_none());
        assert_eq!(state.active.as_ref().unwrap().id.as_str(), "1_SHARE");
    }

    #[test]
    fn test_card_updated_touches_matching_card_only() {
        let mut state = DisplayState::new();
        state.apply_message(shown("reply", CardKind::Reply, Transition::Introduce));

        let mut other = snapshot("5", CardKind::Content);
        other.title = Some("ignored".to_string());
        state.apply_message(RenderMessage::CardUpdated { card: other });
        assert_eq!(state.active.as_ref().unwrap().title, None);

        let mut reply = snapshot("reply", CardKind::Reply);
        reply.payload = Payload::Media {
            text: "on my way".to_string(),
            image: None,
        };
        state.apply_message(RenderMessage::CardUpdated { card: reply });
        assert_eq!(
            state.active.as_ref().unwrap().payload.text(),
            Some("on my way")
        );
    }

    #[test]
    fn test_feedback_lifecycle() {
        let mut state = DisplayState::new();
        state.apply_message(shown("1_REPLY", CardKind::Action, Transition::Switch));

        let feedback = |s| RenderMessage::ActionFeedback {
            card: CardId::new("1_REPLY"),
            action: ActionKind::Reply,
            state: s,
        };

        state.apply_message(feedback(ActionState::Sending));
        assert_eq!(state.active_feedback().unwrap().state, ActionState::Sending);

        state.apply_message(feedback(ActionState::Success));
        assert_eq!(state.active_feedback().unwrap().state, ActionState::Success);
        assert_eq!(state.activity.len(), 1);

        state.apply_message(feedback(ActionState::Idle));
        assert!(state.feedback.is_none());
    }

    #[test]
    fn test_feedback_banner_text() {
        let feedback = DisplayFeedback {
            card: CardId::new("1_SHARE"),
            action: ActionKind::Share,
            state: ActionState::Failure,
        };
        assert_eq!(
            feedback.banner(),
            format!("{} failed", ActionKind::Share.label())
        );
    }

    #[test]
    fn test_directives_drive_device_state() {
        let mut state = DisplayState::new();
        state.apply_message(RenderMessage::Directive(Directive::StartListening(
            ListenMode::Dictation,
        )));
        assert!(state.is_dictating());

        state.apply_message(RenderMessage::Directive(Directive::StopListening));
        state.apply_message(RenderMessage::Directive(Directive::StartCamera));
        assert!(!state.is_dictating());
        assert!(state.device.camera_on);

        state.apply_message(RenderMessage::Directive(Directive::Speak {
            text: "hello".to_string(),
        }));
        assert_eq!(state.device.spoken.as_deref(), Some("hello"));
    }

    #[test]
    fn test_route_only_visible_on_map_card() {
        let mut state = DisplayState::new();
        state.apply_message(RenderMessage::MapRequested {
            from: Some(Location::at(42.0, -71.0)),
            to: Location::at(42.36959, -71.107132),
        });
        state.apply_message(shown("8_NAVIGATE", CardKind::Action, Transition::Switch));
        assert!(state.visible_route().is_none());

        state.apply_message(shown(ids::MAP, CardKind::Content, Transition::Switch));
        assert!(state.visible_route().is_some());
    }

    #[test]
    fn test_activity_is_bounded() {
        let mut state = DisplayState::new();
        for _ in 0..20 {
            state.apply_message(RenderMessage::TimelineSynced {
                created: 1,
                updated: 0,
                removed: 0,
                bundles: Vec::new(),
            });
        }
        assert_eq!(state.activity.len(), ACTIVITY_LIMIT);
        assert_eq!(state.last_sync.as_deref(), Some("+1 ~0 -0"));
    }
}
