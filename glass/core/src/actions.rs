//! Action Dispatcher
//!
//! One state machine per action card:
//!
//! ```text
//!   Idle ──begin──▶ Sending ──settle(ok)──▶ Success ─┐
//!                      │                             ├─ FEEDBACK_DURATION ─▶ Idle (hidden)
//!                      └────settle(err)──▶ Failure ──┘
//! ```
//!
//! The dispatcher only tracks state. The remote work for a flight is an
//! [`ActionJob`] executed by [`run`] in a spawned task; its result comes back
//! through the session's completion channel and is fed to
//! [`ActionDispatcher::settle`]. Terminal states are cleared by
//! [`ActionDispatcher::expire`] once their deadline passes, whatever the
//! outcome was.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::location::{Geolocator, Location, LocationError};
use crate::remote::{
    Contact, MediaUpload, MenuItem, RemoteError, RemoteTimelineClient, TimelineItem, UserAction,
};
use crate::tree::NodeKey;

/// How long Success/Failure feedback stays on screen
pub const FEEDBACK_DURATION: Duration = Duration::from_millis(2000);

// =============================================================================
// State machine
// =============================================================================

/// Which workflow a flight runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Share with a contact
    Share,
    /// Reply with dictated text
    Reply,
    /// Custom service action
    Custom,
    /// Route to the card location
    Navigate,
}

impl ActionKind {
    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Share => "Share",
            Self::Reply => "Reply",
            Self::Custom => "Custom",
            Self::Navigate => "Navigate",
        }
    }
}

/// Feedback state of one action card
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionState {
    /// Nothing shown
    #[default]
    Idle,
    /// Remote call in flight
    Sending,
    /// Remote call succeeded
    Success,
    /// Remote call failed
    Failure,
}

impl ActionState {
    /// Whether this is `Success` or `Failure`
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// Identifies one dispatch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlightId(u64);

/// One dispatch of an action card
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flight {
    /// Flight id
    pub id: FlightId,
    /// Workflow
    pub kind: ActionKind,
    /// Action card the flight belongs to
    pub action_card: NodeKey,
    /// Card the feedback is drawn on
    pub feedback_card: NodeKey,
    /// Content card acted on
    pub content: NodeKey,
    /// Current state
    pub state: ActionState,
    /// When terminal feedback is taken down
    pub hide_at: Option<Instant>,
}

/// Tracks every in-flight or recently settled action
#[derive(Debug, Default)]
pub struct ActionDispatcher {
    flights: Vec<Flight>,
    next_id: u64,
}

impl ActionDispatcher {
    /// Create an idle dispatcher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `Sending` for `action_card`.
    ///
    /// Returns `None` while a previous dispatch of the same card is still
    /// sending. Stale terminal feedback for the card is replaced.
    pub fn begin(
        &mut self,
        kind: ActionKind,
        action_card: NodeKey,
        feedback_card: NodeKey,
        content: NodeKey,
    ) -> Option<FlightId> {
        if self.is_busy(action_card) {
            return None;
        }
        self.flights.retain(|f| f.action_card != action_card);

        let id = FlightId(self.next_id);
        self.next_id += 1;
        self.flights.push(Flight {
            id,
            kind,
            action_card,
            feedback_card,
            content,
            state: ActionState::Sending,
            hide_at: None,
        });
        Some(id)
    }

    /// Move a sending flight to `Success` or `Failure` and start its
    /// feedback timer
    pub fn settle(&mut self, id: FlightId, ok: bool, now: Instant) -> Option<&Flight> {
        let flight = self
            .flights
            .iter_mut()
            .find(|f| f.id == id && f.state == ActionState::Sending)?;
        flight.state = if ok {
            ActionState::Success
        } else {
            ActionState::Failure
        };
        flight.hide_at = Some(now + FEEDBACK_DURATION);
        Some(&*flight)
    }

    /// Take down every terminal flight whose feedback deadline has passed
    pub fn expire(&mut self, now: Instant) -> Vec<Flight> {
        let (expired, kept): (Vec<Flight>, Vec<Flight>) = std::mem::take(&mut self.flights)
            .into_iter()
            .partition(|f| f.hide_at.is_some_and(|at| at <= now));
        self.flights = kept;
        expired
    }

    /// Forget a flight whose cards are gone
    pub fn abandon(&mut self, id: FlightId) -> Option<Flight> {
        let index = self.flights.iter().position(|f| f.id == id)?;
        Some(self.flights.remove(index))
    }

    /// Look up a flight
    #[must_use]
    pub fn flight(&self, id: FlightId) -> Option<&Flight> {
        self.flights.iter().find(|f| f.id == id)
    }

    /// Current state of an action card
    #[must_use]
    pub fn state_of(&self, action_card: NodeKey) -> ActionState {
        self.flights
            .iter()
            .find(|f| f.action_card == action_card)
            .map_or(ActionState::Idle, |f| f.state)
    }

    /// Whether an action card has a dispatch still sending
    #[must_use]
    pub fn is_busy(&self, action_card: NodeKey) -> bool {
        self.state_of(action_card) == ActionState::Sending
    }

    /// Earliest pending feedback deadline
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.flights.iter().filter_map(|f| f.hide_at).min()
    }
}

// =============================================================================
// Requests and jobs
// =============================================================================

/// Something the navigation engine wants dispatched
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionRequest {
    /// TAP on a share target
    Share {
        /// Share target tapped
        share_card: NodeKey,
        /// SHARE action card the target was lent to
        action_card: NodeKey,
        /// Content being shared
        content: NodeKey,
    },
    /// Dictation finished on the reply card
    Reply {
        /// Reply card
        reply_card: NodeKey,
        /// REPLY action card
        action_card: NodeKey,
        /// Content replied to
        content: NodeKey,
        /// Dictated text
        text: String,
    },
    /// TAP on a CUSTOM action card
    Custom {
        /// Action card
        action_card: NodeKey,
        /// Content acted on
        content: NodeKey,
    },
    /// TAP on a NAVIGATE action card
    Navigate {
        /// Action card
        action_card: NodeKey,
        /// Content whose location is the destination
        content: NodeKey,
    },
    /// TAP on a TOGGLE_PINNED action card (already applied locally)
    TogglePinned {
        /// Content card
        content: NodeKey,
        /// New pin state
        pinned: bool,
    },
}

/// Remote work for one flight, detached from the tree
#[derive(Clone, Debug, PartialEq)]
pub enum ActionJob {
    /// Share a card, persisting it first when it only exists locally
    Share {
        /// Content card id
        content_id: String,
        /// Whether the card still needs inserting
        local_only: bool,
        /// Card text
        text: String,
        /// Card image URL (a `data:` URI for local captures)
        image_url: Option<String>,
        /// Menu items to persist with the card
        menu_items: Vec<MenuItem>,
        /// Contact shared with
        recipient: Contact,
    },
    /// Insert a reply and record it
    Reply {
        /// Content card id
        content_id: String,
        /// Reply text
        text: String,
    },
    /// Record a custom action
    Custom {
        /// Content card id
        content_id: String,
        /// Custom action id
        action_id: String,
    },
    /// Resolve a route to the card location
    Navigate {
        /// Destination
        destination: Option<Location>,
    },
}

impl ActionJob {
    /// Workflow this job belongs to
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Share { .. } => ActionKind::Share,
            Self::Reply { .. } => ActionKind::Reply,
            Self::Custom { .. } => ActionKind::Custom,
            Self::Navigate { .. } => ActionKind::Navigate,
        }
    }
}

/// What a successful job produced
#[derive(Clone, Debug, PartialEq)]
pub enum ActionOutcome {
    /// Shared; `new_id` is set when a local card got persisted
    Shared {
        /// Remote id assigned to a previously local card
        new_id: Option<String>,
    },
    /// Reply inserted
    Replied {
        /// Id of the reply item
        reply_id: String,
    },
    /// Custom action recorded
    Sent,
    /// Route endpoints resolved
    Route {
        /// Current position, when the device could tell
        from: Option<Location>,
        /// Destination
        to: Location,
    },
}

/// Reasons an action ends in `Failure`
#[derive(Debug, Error)]
pub enum ActionError {
    /// The remote call failed
    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// The device position could not be determined
    #[error("Location failed: {0}")]
    Location(#[from] LocationError),

    /// The service answered `success: false`
    #[error("Service rejected the {action} action")]
    Rejected {
        /// Wire action name
        action: String,
    },

    /// An insert came back without an id
    #[error("Service did not assign an id")]
    MissingId,

    /// Nothing to share (no text and no image)
    #[error("Nothing to share")]
    EmptyShare,

    /// Local image is not an inline `data:image/...` URI
    #[error("Only inline images can be uploaded")]
    UnsupportedMedia,

    /// Reply text was empty
    #[error("Reply text is empty")]
    EmptyReply,

    /// The card has no coordinates to navigate to
    #[error("Card has no location")]
    NoLocation,
}

async fn record<R: RemoteTimelineClient + ?Sized>(
    remote: &R,
    action: UserAction,
) -> Result<(), ActionError> {
    let receipt = remote.insert_action(&action).await?;
    if receipt.success {
        Ok(())
    } else {
        Err(ActionError::Rejected {
            action: action.action,
        })
    }
}

/// Execute a job against the remote service
///
/// # Errors
///
/// Any [`ActionError`]; the caller turns it into the `Failure` state.
pub async fn run<R: RemoteTimelineClient + ?Sized>(
    remote: &R,
    geolocator: &dyn Geolocator,
    job: ActionJob,
) -> Result<ActionOutcome, ActionError> {
    match job {
        ActionJob::Share {
            content_id,
            local_only,
            text,
            image_url,
            menu_items,
            recipient,
        } => {
            let recipient_id = recipient.id.clone().unwrap_or_default();
            let item_id = if local_only {
                let item = TimelineItem {
                    text: (!text.is_empty()).then(|| text.clone()),
                    menu_items,
                    recipients: vec![recipient],
                    ..Default::default()
                };
                let receipt = match image_url {
                    Some(url) => {
                        let media =
                            MediaUpload::from_data_uri(&url).ok_or(ActionError::UnsupportedMedia)?;
                        remote.insert(&item, Some(&media)).await?
                    }
                    None if !text.is_empty() => remote.insert(&item, None).await?,
                    None => return Err(ActionError::EmptyShare),
                };
                receipt.id.ok_or(ActionError::MissingId)?
            } else {
                content_id
            };

            record(
                remote,
                UserAction::timeline(item_id.clone(), "SHARE").with_value(recipient_id),
            )
            .await?;
            Ok(ActionOutcome::Shared {
                new_id: local_only.then_some(item_id),
            })
        }

        ActionJob::Reply { content_id, text } => {
            let text = text.trim();
            if text.is_empty() {
                return Err(ActionError::EmptyReply);
            }
            let item = TimelineItem {
                text: Some(text.to_string()),
                in_reply_to: Some(content_id.clone()),
                ..Default::default()
            };
            let reply_id = remote
                .insert(&item, None)
                .await?
                .id
                .ok_or(ActionError::MissingId)?;
            record(
                remote,
                UserAction::timeline(content_id, "REPLY").with_value(reply_id.clone()),
            )
            .await?;
            Ok(ActionOutcome::Replied { reply_id })
        }

        ActionJob::Custom {
            content_id,
            action_id,
        } => {
            record(
                remote,
                UserAction::timeline(content_id, "CUSTOM").with_value(action_id),
            )
            .await?;
            Ok(ActionOutcome::Sent)
        }

        ActionJob::Navigate { destination } => {
            let to = destination
                .filter(|d| d.coordinates().is_some())
                .ok_or(ActionError::NoLocation)?;
            let from = match geolocator.current().await {
                Ok(here) if here.coordinates().is_some() => Some(here),
                Ok(_) => None,
                Err(e) => {
                    debug!(error = %e, "No current position, showing destination only");
                    None
                }
            };
            Ok(ActionOutcome::Route { from, to })
        }
    }
}
