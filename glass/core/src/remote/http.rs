//! HTTP Timeline Client
//!
//! [`RemoteTimelineClient`] over a Mirror-style REST API.
//!
//! # Endpoints
//!
//! All JSON endpoints live under `{base}/_ah/api/mirror/v1/`:
//! - `timeline` - list items
//! - `timeline/{id}` - get, patch, delete an item
//! - `internal/timeline` - insert an item created on the device
//! - `internal/actions` - record a user action
//! - `internal/locations` - report the device location
//! - `contacts` - list share targets
//!
//! Items carrying media are uploaded as `multipart/mixed` to
//! `{base}/upload/mirror/v1/timeline`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;

use super::types::{
    ActionReceipt, Contact, ContactList, InsertReceipt, MediaUpload, TimelineItem, TimelineList,
    TimelinePatch, UserAction,
};
use super::{RemoteError, RemoteTimelineClient};
use crate::location::Location;

const API_PREFIX: &str = "_ah/api/mirror/v1";
const UPLOAD_PREFIX: &str = "upload/mirror/v1";
const MULTIPART_BOUNDARY: &str = "-------314159265358979323846";

/// Longest error body kept in [`RemoteError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// REST client for the remote timeline
#[derive(Clone)]
pub struct HttpTimelineClient {
    /// Base URL without trailing slash
    base_url: String,
    /// OAuth bearer token, if the server wants one
    access_token: Option<String>,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpTimelineClient {
    /// Create a client for `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            access_token,
            http_client,
        })
    }

    /// Base URL this client talks to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.http_client.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body
    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, RemoteError> {
        let body = self.execute_raw(builder).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send a request, map non-2xx to [`RemoteError::Status`], return the body
    async fn execute_raw(&self, builder: RequestBuilder) -> Result<String, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(RemoteError::NotFound(body));
            }
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    fn multipart_body(item: &TimelineItem, media: &MediaUpload) -> Result<String, RemoteError> {
        let metadata = serde_json::to_string(item)?;
        let delimiter = format!("\r\n--{MULTIPART_BOUNDARY}\r\n");
        let close = format!("\r\n--{MULTIPART_BOUNDARY}--");
        Ok(format!(
            "{delimiter}Content-Type: application/json\r\n\r\n{metadata}{delimiter}\
             Content-Type: {}\r\nContent-Transfer-Encoding: base64\r\n\r\n{}{close}",
            media.content_type, media.base64_data
        ))
    }
}

#[async_trait]
impl RemoteTimelineClient for HttpTimelineClient {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn list(&self) -> Result<TimelineList, RemoteError> {
        let url = self.api_url("timeline");
        self.execute(self.request(Method::GET, url)).await
    }

    async fn get(&self, id: &str) -> Result<TimelineItem, RemoteError> {
        let url = self.api_url(&format!("timeline/{id}"));
        self.execute(self.request(Method::GET, url)).await
    }

    async fn insert(
        &self,
        item: &TimelineItem,
        media: Option<&MediaUpload>,
    ) -> Result<InsertReceipt, RemoteError> {
        match media {
            Some(media) => {
                let url = format!("{}/{}/timeline", self.base_url, UPLOAD_PREFIX);
                let body = Self::multipart_body(item, media)?;
                let builder = self
                    .request(Method::POST, url)
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        format!("multipart/mixed; boundary=\"{MULTIPART_BOUNDARY}\""),
                    )
                    .body(body);
                self.execute(builder).await
            }
            None => {
                let url = self.api_url("internal/timeline");
                self.execute(self.request(Method::POST, url).json(item)).await
            }
        }
    }

    async fn patch(&self, id: &str, patch: &TimelinePatch) -> Result<InsertReceipt, RemoteError> {
        let url = self.api_url(&format!("timeline/{id}"));
        self.execute(self.request(Method::PATCH, url).json(patch))
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let url = self.api_url(&format!("timeline/{id}"));
        self.execute_raw(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn insert_action(&self, action: &UserAction) -> Result<ActionReceipt, RemoteError> {
        let url = self.api_url("internal/actions");
        self.execute(self.request(Method::POST, url).json(action))
            .await
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, RemoteError> {
        let url = self.api_url("contacts");
        let list: ContactList = self.execute(self.request(Method::GET, url)).await?;
        Ok(list.items)
    }

    async fn insert_location(&self, location: &Location) -> Result<(), RemoteError> {
        let url = self.api_url("internal/locations");
        self.execute_raw(self.request(Method::POST, url).json(location))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpTimelineClient {
        HttpTimelineClient::new("http://localhost:8080/", None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(
            client.api_url("timeline/7"),
            "http://localhost:8080/_ah/api/mirror/v1/timeline/7"
        );
    }

    #[test]
    fn test_multipart_body_layout() {
        let item = TimelineItem {
            text: Some("photo".to_string()),
            ..Default::default()
        };
        let media = MediaUpload {
            content_type: "image/jpeg".to_string(),
            base64_data: "AAAA".to_string(),
        };
        let body = HttpTimelineClient::multipart_body(&item, &media).unwrap();
        assert!(body.starts_with(&format!("\r\n--{MULTIPART_BOUNDARY}\r\n")));
        assert!(body.contains("{\"text\":\"photo\"}"));
        assert!(body.contains("Content-Type: image/jpeg\r\nContent-Transfer-Encoding: base64\r\n\r\nAAAA"));
        assert!(body.ends_with(&format!("--{MULTIPART_BOUNDARY}--")));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client =
            HttpTimelineClient::new("http://127.0.0.1:9", None, Duration::from_millis(500)).unwrap();
        match client.list().await {
            Err(RemoteError::Transport(_)) => {}
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
