// Authenticated Mastodon REST + streaming client.
//
// A thin reqwest wrapper: generic GET/POST/DELETE helpers that attach the
// bearer token, turn non-2xx responses into errors and deserialize JSON.
// The endpoint-specific methods live in the `MastodonApi` impl below.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::api::{EventStream, MastodonApi};
use super::models::{Account, AccountId, FollowGraph, NewStatus, Relationship, Status};
use super::stream;

/// Mastodon's maximum page size for follower/following listings.
const FOLLOW_PAGE_LIMIT: &str = "80";

/// How many recent statuses to scan when looking for an orphaned reply.
const STATUS_PAGE_LIMIT: &str = "40";

/// Ids per relationships request, to keep query strings reasonable.
const RELATIONSHIP_CHUNK: usize = 40;

/// Mastodon sends a `:thump` heartbeat every 15 seconds on an idle stream.
/// Three missed heartbeats and the connection is treated as dead.
pub const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(45);

pub struct MastodonClient {
    client: reqwest::Client,
    /// Streaming responses never finish, so they get a client with a read
    /// timeout instead of the per-request one.
    stream_client: reqwest::Client,
    api_url: String,
    streaming_url: String,
    access_token: String,
}

impl MastodonClient {
    /// Create a client for the instance at `api_url`.
    ///
    /// `api_url` may be given with or without a trailing `/api/v1`.
    pub fn new(
        api_url: &str,
        streaming_url: Option<&str>,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_stream_read_timeout(
            api_url,
            streaming_url,
            access_token,
            timeout,
            STREAM_READ_TIMEOUT,
        )
    }

    /// Like `new`, with an explicit limit on how long the user stream may
    /// stay silent before the read fails.
    pub fn with_stream_read_timeout(
        api_url: &str,
        streaming_url: Option<&str>,
        access_token: &str,
        timeout: Duration,
        stream_read_timeout: Duration,
    ) -> Result<Self> {
        let user_agent = concat!("altbot/", env!("CARGO_PKG_VERSION"));

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let stream_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .read_timeout(stream_read_timeout)
            .build()
            .context("Failed to build streaming HTTP client")?;

        let api_url = normalize_base_url(api_url);
        let streaming_url = streaming_url
            .map(normalize_base_url)
            .unwrap_or_else(|| api_url.clone());

        Ok(Self {
            client,
            stream_client,
            api_url,
            streaming_url,
            access_token: access_token.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.api_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    /// Send a request and fail on non-2xx, returning the raw response.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        debug!(endpoint = what, "Mastodon API request");

        let response = request
            .send()
            .await
            .with_context(|| format!("Mastodon request failed: {what}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mastodon {what} returned {status}: {body}");
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let request = self.request(Method::GET, &self.endpoint(path)).query(params);
        self.send(request, path)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize {path} response"))
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.request(Method::POST, &self.endpoint(path)).json(body);
        self.send(request, path)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize {path} response"))
    }

    async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.request(Method::DELETE, &self.endpoint(path));
        self.send(request, path)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize {path} response"))
    }

    /// Collect every account id from a paginated account listing, following
    /// `Link: rel="next"` headers until the server stops sending one.
    async fn collect_account_ids(&self, path: &str) -> Result<HashSet<AccountId>> {
        let mut ids = HashSet::new();
        let mut url = self.endpoint(path);
        let mut first_page = true;

        loop {
            let mut request = self.request(Method::GET, &url);
            if first_page {
                request = request.query(&[("limit", FOLLOW_PAGE_LIMIT)]);
            }

            let response = self.send(request, path).await?;
            let next = next_page_url(response.headers());
            let accounts: Vec<Account> = response
                .json()
                .await
                .with_context(|| format!("Failed to deserialize {path} response"))?;

            debug!(
                endpoint = path,
                page_size = accounts.len(),
                total = ids.len() + accounts.len(),
                "Fetched page of accounts"
            );

            let empty_page = accounts.is_empty();
            ids.extend(accounts.into_iter().map(|a| a.id));

            match next {
                Some(next) if !empty_page => {
                    url = next;
                    first_page = false;
                }
                _ => break,
            }
        }

        Ok(ids)
    }
}

#[async_trait]
impl MastodonApi for MastodonClient {
    async fn account_id(&self) -> Result<AccountId> {
        let account: Account = self
            .get_json("accounts/verify_credentials", &[])
            .await
            .context("Failed to verify credentials")?;
        Ok(account.id)
    }

    async fn statuses(&self, account_id: &str) -> Result<Vec<Status>> {
        self.get_json(
            &format!("accounts/{account_id}/statuses"),
            &[("limit", STATUS_PAGE_LIMIT)],
        )
        .await
        .with_context(|| format!("Failed to fetch statuses of account {account_id}"))
    }

    async fn send_status(&self, status: &NewStatus) -> Result<Status> {
        self.post_json("statuses", status)
            .await
            .context("Failed to send status")
    }

    async fn delete_status(&self, id: &str) -> Result<Status> {
        self.delete_json(&format!("statuses/{id}"))
            .await
            .with_context(|| format!("Failed to delete status {id}"))
    }

    async fn follow(&self, id: &str) -> Result<AccountId> {
        let relationship: Relationship = self
            .post_json(
                &format!("accounts/{id}/follow"),
                &FollowParams { reblogs: false },
            )
            .await
            .with_context(|| format!("Failed to follow account {id}"))?;
        Ok(relationship.id)
    }

    async fn unfollow(&self, id: &str) -> Result<AccountId> {
        let relationship: Relationship = self
            .post_json(&format!("accounts/{id}/unfollow"), &serde_json::json!({}))
            .await
            .with_context(|| format!("Failed to unfollow account {id}"))?;
        Ok(relationship.id)
    }

    async fn followers_and_following(&self, account_id: &str) -> Result<FollowGraph> {
        let followers_path = format!("accounts/{account_id}/followers");
        let following_path = format!("accounts/{account_id}/following");

        let (follower_ids, following_ids) = tokio::try_join!(
            self.collect_account_ids(&followers_path),
            self.collect_account_ids(&following_path),
        )?;

        info!(
            followers = follower_ids.len(),
            following = following_ids.len(),
            "Fetched follow graph"
        );

        Ok(FollowGraph {
            follower_ids,
            following_ids,
        })
    }

    async fn relationships(&self, ids: &[AccountId]) -> Result<Vec<Relationship>> {
        let mut relationships = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(RELATIONSHIP_CHUNK) {
            let params: Vec<(&str, &str)> = chunk.iter().map(|id| ("id[]", id.as_str())).collect();
            let page: Vec<Relationship> = self
                .get_json("accounts/relationships", &params)
                .await
                .context("Failed to fetch relationships")?;
            relationships.extend(page);
        }

        Ok(relationships)
    }

    async fn user_stream(&self) -> Result<EventStream> {
        let url = format!("{}/api/v1/streaming/user", self.streaming_url);

        let request = self
            .stream_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "text/event-stream");

        let response = request
            .send()
            .await
            .context("Failed to connect to the user stream")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mastodon streaming/user returned {status}: {body}");
        }

        info!(url = %url, "Connected to the user stream");
        Ok(stream::event_stream(response))
    }
}

#[derive(Serialize)]
struct FollowParams {
    reblogs: bool,
}

/// Strip trailing slashes and an optional `/api/v1` suffix.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/api/v1")
        .unwrap_or(trimmed)
        .to_string()
}

/// Extract the `rel="next"` target from a `Link` header, if any.
pub fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    parse_next_link(link)
}

/// Parse `<https://...>; rel="next", <https://...>; rel="prev"`.
pub fn parse_next_link(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| matches!(p.trim(), "rel=\"next\"" | "rel=next"));
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(target.to_string())
    })
}
