//! HTTP client for the upstream artwork and feed endpoints.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE, REFERER, USER_AGENT};
use reqwest::{Client, Proxy, RequestBuilder};
use serde_json::Value;
use tracing::{debug, info, warn};

use pixshelf_core::{ArtworkSource, CredentialStore, Error, RawArtwork, Result};

use crate::config::UpstreamConfig;
use crate::error::{to_pixshelf_error, UpstreamErrorCode};
use crate::feeds::{FollowLatestQuery, FollowingQuery, RecommendQuery};

/// Longest slice of an error response body kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Account id the upstream expects alongside account-scoped calls.
const X_USER_ID: &str = "x-user-id";

/// Fetches raw artwork documents and account feeds from the upstream platform.
pub struct PixivClient {
    client: Client,
    config: UpstreamConfig,
    credentials: Arc<dyn CredentialStore>,
}

impl PixivClient {
    /// Create a new client with the given configuration and credential source.
    pub fn new(config: UpstreamConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

        if let Some(ref proxy_url) = config.proxy_url {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| Error::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "upstream",
            component = "client",
            op = "init",
            base_url = %config.base_url,
            proxy = config.proxy_url.is_some(),
            timeout_secs = config.timeout_seconds,
            "Initializing upstream client"
        );

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    /// Create from environment variables.
    pub fn from_env(credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        Self::new(UpstreamConfig::from_env(), credentials)
    }

    /// Get the current configuration.
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Fetch one page of the accounts a user follows.
    ///
    /// Returns the upstream document as-is.
    pub async fn fetch_following(&self, query: &FollowingQuery) -> Result<Value> {
        query.validate()?;
        let resource = format!("following of user {}", query.user_id);
        let request = self
            .build_request(
                self.config.following_url(&query.user_id),
                &self.config.following_page_url(&query.user_id),
                Some(query.user_id.as_str()),
            )
            .await?
            .query(&query.params());

        let text = self.send("fetch_following", &resource, request).await?;
        parse_document(&resource, &text)
    }

    /// Fetch one page of the newest works from followed accounts.
    pub async fn fetch_follow_latest(&self, query: &FollowLatestQuery) -> Result<Value> {
        query.validate()?;
        let resource = format!("follow feed page {} of user {}", query.page, query.user_id);
        let request = self
            .build_request(
                self.config.follow_latest_url(),
                &self.config.follow_latest_page_url(),
                Some(query.user_id.as_str()),
            )
            .await?
            .query(&query.params());

        let text = self.send("fetch_follow_latest", &resource, request).await?;
        parse_document(&resource, &text)
    }

    /// Fetch the works recommended alongside one artwork.
    pub async fn fetch_recommendations(&self, query: &RecommendQuery) -> Result<Value> {
        let resource = format!("recommendations for pid {}", query.pid);
        let request = self
            .build_request(
                self.config.recommend_url(query.pid),
                &self.config.artwork_page_url(query.pid),
                query.user_id.as_deref(),
            )
            .await?
            .query(&query.params());

        let text = self.send("fetch_recommendations", &resource, request).await?;
        parse_document(&resource, &text)
    }

    async fn build_request(
        &self,
        url: String,
        referer: &str,
        user_id: Option<&str>,
    ) -> Result<RequestBuilder> {
        let mut req = self
            .client
            .get(url)
            .header(USER_AGENT, &self.config.user_agent)
            .header(REFERER, referer)
            .header(ACCEPT, "application/json");

        if let Some(user_id) = user_id {
            req = req.header(X_USER_ID, user_id);
        }
        if let Some(credential) = self.credentials.get_credential().await? {
            req = req.header(COOKIE, credential);
        }

        Ok(req)
    }

    /// Send a request and return the text of a successful response. Other
    /// statuses are classified through [`UpstreamErrorCode`].
    async fn send(
        &self,
        op: &'static str,
        resource: &str,
        request: RequestBuilder,
    ) -> Result<String> {
        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            warn!(
                subsystem = "upstream",
                component = "client",
                op,
                resource,
                status = status.as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Upstream returned non-success status"
            );
            let code = UpstreamErrorCode::from_status(status.as_u16());
            return Err(to_pixshelf_error(code, resource, status.as_u16(), &message));
        }

        let text = response.text().await?;
        debug!(
            subsystem = "upstream",
            component = "client",
            op,
            resource,
            duration_ms = start.elapsed().as_millis() as u64,
            "Upstream call completed"
        );
        Ok(text)
    }
}

#[async_trait]
impl ArtworkSource for PixivClient {
    async fn fetch_artwork(&self, pid: i64) -> Result<RawArtwork> {
        debug!(
            subsystem = "upstream",
            component = "client",
            op = "fetch_artwork",
            pid,
            "Fetching artwork"
        );

        let request = self
            .build_request(self.config.artwork_url(pid), &self.config.referer, None)
            .await?;
        let text = self
            .send("fetch_artwork", &format!("artwork pid {}", pid), request)
            .await?;
        parse_envelope(pid, &text)
    }
}

fn parse_document(resource: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| Error::Malformed(format!("{}: response is not JSON: {}", resource, e)))
}

/// Extract the content object from an upstream response envelope.
///
/// Non-JSON text is `Malformed`; a `body` that is missing, null, or not an
/// object is `EmptyBody`.
pub fn parse_envelope(pid: i64, text: &str) -> Result<RawArtwork> {
    let envelope: Value = serde_json::from_str(text)
        .map_err(|e| Error::Malformed(format!("pid {}: response is not JSON: {}", pid, e)))?;

    match envelope.get("body") {
        Some(body @ Value::Object(_)) => Ok(RawArtwork {
            pid,
            body: body.clone(),
        }),
        _ => Err(Error::EmptyBody(pid)),
    }
}
