//! Remote Timeline Abstraction
//!
//! The timeline feed lives on a remote service. The emulator only needs a
//! handful of calls against it, collected in [`RemoteTimelineClient`]:
//!
//! - list / get timeline items (reconciliation)
//! - insert / patch items (sharing local cards, replies, pinning)
//! - record user actions (share, reply, custom)
//! - list contacts (share targets) and report the device location
//!
//! Two implementations ship with the crate: [`HttpTimelineClient`] talks to a
//! Mirror-style REST endpoint, [`DemoTimeline`] keeps everything in memory.

pub mod demo;
pub mod http;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::location::Location;

pub use demo::DemoTimeline;
pub use http::HttpTimelineClient;
pub use types::{
    parse_timestamp, ActionReceipt, Attachment, Contact, ContactList, InsertReceipt, MediaUpload,
    MenuItem, MenuValue, TimelineItem, TimelineList, TimelinePatch, UserAction,
};

/// Errors from the remote timeline service
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Remote returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("Failed to decode remote response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The requested item does not exist
    #[error("Timeline item not found: {0}")]
    NotFound(String),

    /// The service refused to serve the request
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

/// Client for the remote timeline service
#[async_trait]
pub trait RemoteTimelineClient: Send + Sync {
    /// Get the client name (for logging)
    fn name(&self) -> &'static str;

    /// List the current timeline
    async fn list(&self) -> Result<TimelineList, RemoteError>;

    /// Fetch a single item
    async fn get(&self, id: &str) -> Result<TimelineItem, RemoteError>;

    /// Insert a new item, optionally with media
    async fn insert(
        &self,
        item: &TimelineItem,
        media: Option<&MediaUpload>,
    ) -> Result<InsertReceipt, RemoteError>;

    /// Patch an existing item
    async fn patch(&self, id: &str, patch: &TimelinePatch) -> Result<InsertReceipt, RemoteError>;

    /// Delete an item
    async fn delete(&self, id: &str) -> Result<(), RemoteError>;

    /// Record a user action against an item
    async fn insert_action(&self, action: &UserAction) -> Result<ActionReceipt, RemoteError>;

    /// List share targets
    async fn list_contacts(&self) -> Result<Vec<Contact>, RemoteError> {
        Ok(Vec::new())
    }

    /// Report the device location
    async fn insert_location(&self, _location: &Location) -> Result<(), RemoteError> {
        Ok(())
    }
}
