//! Emulator Client
//!
//! Thin wrapper around the Glass emulator for TUI integration.
//! The emulator is embedded directly; the remote timeline is either the
//! HTTP service from the config or the in-memory demo timeline.
//!
//! # Architecture
//!
//! The TUI is a "thin client" - it doesn't decide what a gesture means or
//! which card comes next. Its job is:
//! 1. Convert terminal events to `InputEvent`s
//! 2. Send them to the emulator
//! 3. Feed remote completions and clock ticks back in
//! 4. Render display state based on `RenderMessage`s

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::time::Instant;

use glass_core::{
    Completion, CompletionReceiver, DemoTimeline, Emulator, EmulatorConfig, Gesture, Geolocator,
    HttpTimelineClient, InputEvent, Key, RemoteTimelineClient, RenderMessage,
};

/// Render channel depth
const RENDER_CHANNEL_CAPACITY: usize = 256;

/// A one-pixel PNG standing in for a camera frame
pub const DEMO_PHOTO: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// Build the remote timeline the config asks for
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or no base URL is set
/// outside demo mode.
pub fn build_remote(config: &EmulatorConfig) -> anyhow::Result<Arc<dyn RemoteTimelineClient>> {
    if config.demo {
        return Ok(Arc::new(DemoTimeline::seeded()));
    }
    let base_url = config
        .remote
        .base_url
        .clone()
        .context("No remote base URL configured (use --base-url or --demo)")?;
    let client = HttpTimelineClient::new(
        base_url,
        config.remote.access_token.clone(),
        config.remote.request_timeout,
    )
    .context("Failed to build HTTP timeline client")?;
    Ok(Arc::new(client))
}

/// Client for driving the embedded emulator
pub struct EmulatorClient {
    /// The embedded emulator
    emulator: Emulator<dyn RemoteTimelineClient>,
    /// Results of remote work
    completions: CompletionReceiver,
    /// Receiver for messages from the emulator
    rx: mpsc::Receiver<RenderMessage>,
}

impl EmulatorClient {
    /// Create a client for the configured remote
    ///
    /// # Errors
    ///
    /// Returns an error if the remote client cannot be built.
    pub fn new(config: &EmulatorConfig, geolocator: Arc<dyn Geolocator>) -> anyhow::Result<Self> {
        let remote = build_remote(config)?;
        Ok(Self::with_remote(remote, geolocator, config))
    }

    /// Create a client over an existing remote
    pub fn with_remote(
        remote: Arc<dyn RemoteTimelineClient>,
        geolocator: Arc<dyn Geolocator>,
        config: &EmulatorConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(RENDER_CHANNEL_CAPACITY);
        let (emulator, completions) = Emulator::new(remote, geolocator, config, tx);
        Self {
            emulator,
            completions,
            rx,
        }
    }

    /// Load contacts, show the clock and run the first sync
    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.emulator.start().await
    }

    /// Send a key press
    pub async fn key(&mut self, key: Key) -> anyhow::Result<()> {
        self.send_event(InputEvent::key(key)).await
    }

    /// Send a pointer stroke in card coordinates
    pub async fn pointer(&mut self, start: (f64, f64), end: (f64, f64)) -> anyhow::Result<()> {
        self.send_event(InputEvent::pointer(start, end)).await
    }

    /// Send an already-classified gesture
    pub async fn gesture(&mut self, gesture: Gesture) -> anyhow::Result<()> {
        self.send_event(InputEvent::gesture(gesture)).await
    }

    /// Deliver dictated reply text
    pub async fn dictate(&mut self, text: String) -> anyhow::Result<()> {
        self.send_event(InputEvent::Dictation { text }).await
    }

    /// Deliver a recognised hotword phrase
    pub async fn hotword(&mut self, phrase: impl Into<String>) -> anyhow::Result<()> {
        self.send_event(InputEvent::Hotword {
            phrase: phrase.into(),
        })
        .await
    }

    /// Deliver a captured photo
    pub async fn capture_photo(&mut self) -> anyhow::Result<()> {
        self.send_event(InputEvent::PhotoCaptured {
            data_uri: DEMO_PHOTO.to_string(),
            content_type: "image/png".to_string(),
        })
        .await
    }

    /// Ask for a timeline poll now
    pub async fn request_sync(&mut self) -> anyhow::Result<()> {
        self.send_event(InputEvent::SyncRequested).await
    }

    /// Send any event
    pub async fn send_event(&mut self, event: InputEvent) -> anyhow::Result<()> {
        self.emulator.handle_event(event).await
    }

    /// Wait for the next finished piece of remote work
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions.recv().await
    }

    /// Feed a finished piece of remote work back in
    pub fn apply_completion(&mut self, completion: Completion) {
        self.emulator.apply_completion(completion, Instant::now());
    }

    /// Advance timers (feedback auto-hide, polling, labels)
    pub fn tick(&mut self) {
        self.emulator.tick(Instant::now());
    }

    /// Try to receive a message (non-blocking)
    pub fn try_recv(&mut self) -> Option<RenderMessage> {
        self.rx.try_recv().ok()
    }

    /// Receive all pending messages
    pub fn recv_all(&mut self) -> Vec<RenderMessage> {
        let mut messages = Vec::new();
        while let Some(msg) = self.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// The embedded emulator
    pub fn emulator(&self) -> &Emulator<dyn RemoteTimelineClient> {
        &self.emulator
    }
}
