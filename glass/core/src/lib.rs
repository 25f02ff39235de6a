//! Glass Core - Headless Card Timeline Engine
//!
//! This crate holds everything behind the Glass emulator's card timeline,
//! independent of any UI framework. It can drive a TUI, a web surface or a
//! test harness.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        UI Surfaces                              │
//! │        ┌──────────────┐            ┌─────────────────────┐      │
//! │        │     TUI      │            │  Headless / Tests   │      │
//! │        │  (ratatui)   │            │                     │      │
//! │        └──────┬───────┘            └──────────┬──────────┘      │
//! │               └──────────────┬────────────────┘                 │
//! │                       InputEvent (up)                           │
//! │                     RenderMessage (down)                        │
//! └──────────────────────────────┼──────────────────────────────────┘
//!                                │
//! ┌──────────────────────────────┼──────────────────────────────────┐
//! │                         GLASS CORE                               │
//! │  ┌───────────────────────────┴───────────────────────────────┐  │
//! │  │                        Emulator                            │  │
//! │  │  ┌──────────┐ ┌────────────┐ ┌────────────┐ ┌───────────┐ │  │
//! │  │  │ Gesture  │ │ Navigation │ │  Action    │ │ Timeline  │ │  │
//! │  │  │ classify │ │  Engine    │ │ Dispatcher │ │   Sync    │ │  │
//! │  │  └──────────┘ └─────┬──────┘ └─────┬──────┘ └─────┬─────┘ │  │
//! │  │                     └──────────┬───┴──────────────┘       │  │
//! │  │                            CardTree                        │  │
//! │  └────────────────────────────────┬──────────────────────────┘  │
//! │                      RemoteTimelineClient                        │
//! │                   (HTTP service / in-memory demo)                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Emulator`]: The session context that owns the tree and drives everything
//! - [`RenderMessage`]: Messages sent from the emulator to a surface
//! - [`InputEvent`]: Events sent from a surface to the emulator
//! - [`CardTree`]: Arena of cards with generational keys
//! - [`NavigationEngine`]: Active-card state machine
//! - [`ActionDispatcher`]: Per-action-card feedback state machines
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use glass_core::{DemoTimeline, Emulator, EmulatorConfig, FixedGeolocator, InputEvent, Key};
//! use tokio::sync::mpsc;
//! use tokio::time::Instant;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (tx, mut rx) = mpsc::channel(256);
//!     let config = EmulatorConfig::demo();
//!     let (mut emulator, mut completions) = Emulator::new(
//!         Arc::new(DemoTimeline::seeded()),
//!         Arc::new(FixedGeolocator::unavailable()),
//!         &config,
//!         tx,
//!     );
//!     emulator.start().await?;
//!     emulator.handle_event(InputEvent::key(Key::Enter)).await?;
//!
//!     while let Some(done) = completions.recv().await {
//!         emulator.apply_completion(done, Instant::now());
//!         while let Ok(msg) = rx.try_recv() {
//!             // draw msg
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`gesture`]: Pointer strokes to directional gestures
//! - [`card`]: Card model, per-kind hooks and date labels
//! - [`tree`]: Card ownership, lookup and ordering
//! - [`navigation`]: Active card and transitions
//! - [`actions`]: Share/reply/custom/navigate workflows
//! - [`sync`]: Timeline reconciliation and bundling
//! - [`remote`]: Remote timeline client (HTTP and demo)
//! - [`location`]: Geolocation seam
//! - [`config`]: TOML/env configuration
//! - [`events`] / [`messages`]: Surface protocol
//! - [`emulator`]: The session context
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on ratatui, crossterm, or any other
//! UI framework.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actions;
pub mod card;
pub mod config;
pub mod emulator;
pub mod events;
pub mod gesture;
pub mod location;
pub mod messages;
pub mod navigation;
pub mod remote;
pub mod sync;
pub mod tree;

// Re-exports for convenience
pub use actions::{
    ActionDispatcher, ActionError, ActionJob, ActionKind, ActionOutcome, ActionRequest,
    ActionState, Flight, FlightId, FEEDBACK_DURATION,
};
pub use card::{
    compare_cards, ids, CardId, CardKind, CardNode, Directive, Image, ListenMode, MenuAction,
    Payload, Visibility,
};
pub use emulator::{Completion, CompletionReceiver, Emulator};
pub use events::{InputEvent, Key};
pub use gesture::{classify, classify_click, Gesture, PointerStroke};
pub use location::{FixedGeolocator, Geolocator, Location, LocationError};
pub use messages::{CardSnapshot, RenderMessage, ShadowCues};
pub use navigation::{Landmarks, NavReport, NavigationEngine, Transition};
pub use remote::{
    Contact, DemoTimeline, HttpTimelineClient, MenuItem, RemoteError, RemoteTimelineClient,
    TimelineItem,
};
pub use sync::{reconcile, SyncMode, SyncReport, TimelineSync, DEFAULT_POLL_INTERVAL};
pub use tree::{CardTree, NodeKey, Plane, TreeError};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, EmulatorConfig,
};
