// Mastodon capability trait — everything the bot needs from the server.
//
// The stream processor, the reconciler and the web handlers all receive an
// `Arc<dyn MastodonApi>` rather than reaching for a global client, so tests
// can hand them an in-memory fake.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use super::models::{AccountId, FollowGraph, NewStatus, Relationship, Status, StreamEvent};

/// A lazy, non-restartable sequence of stream events. A transport error is
/// yielded once, after which the stream ends.
pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

#[async_trait]
pub trait MastodonApi: Send + Sync {
    /// The bot's own account id.
    async fn account_id(&self) -> Result<AccountId>;

    /// Recent statuses posted by `account_id`, newest first.
    async fn statuses(&self, account_id: &str) -> Result<Vec<Status>>;

    async fn send_status(&self, status: &NewStatus) -> Result<Status>;

    async fn delete_status(&self, id: &str) -> Result<Status>;

    /// Follow an account (without its boosts). Returns the followed id.
    async fn follow(&self, id: &str) -> Result<AccountId>;

    /// Returns the unfollowed id.
    async fn unfollow(&self, id: &str) -> Result<AccountId>;

    /// Full follower and following id sets of `account_id`.
    async fn followers_and_following(&self, account_id: &str) -> Result<FollowGraph>;

    /// The bot's relationship to each of `ids`, in one batched lookup.
    async fn relationships(&self, ids: &[AccountId]) -> Result<Vec<Relationship>>;

    /// Subscribe to the authenticated user's event stream.
    async fn user_stream(&self) -> Result<EventStream>;
}

