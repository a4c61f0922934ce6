// Mastodon entities — just the fields altbot needs.
//
// Everything is deserialized leniently (`#[serde(default)]`) because the
// streaming API is allowed to deliver partial payloads, and a missing field
// should turn into "no action" rather than a parse failure.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque Mastodon account id.
pub type AccountId = String;

/// Opaque Mastodon status id.
pub type StatusId = String;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// `user` for local accounts, `user@instance` for remote ones.
    #[serde(default)]
    pub acct: String,
    #[serde(default)]
    pub username: String,
}

/// A single media attachment on a status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Alt text. `None` means the attachment is uncaptioned.
    #[serde(default)]
    pub description: Option<String>,
}

impl MediaAttachment {
    pub fn is_captioned(&self) -> bool {
        self.description.is_some()
    }
}

/// A status (toot).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: StatusId,
    #[serde(default)]
    pub account: Option<Account>,
    /// HTML content as rendered by the server.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media_attachments: Vec<MediaAttachment>,
    /// The boosted status, when this status is a reblog.
    #[serde(default)]
    pub reblog: Option<Box<Status>>,
    #[serde(default)]
    pub in_reply_to_id: Option<StatusId>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// The bot's relationship to one other account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: AccountId,
    #[serde(default)]
    pub followed_by: bool,
    #[serde(default)]
    pub following: bool,
    #[serde(default)]
    pub requested: bool,
    #[serde(default)]
    pub muting: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// "follow", "favourite", "mention", "reblog", ...
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub account: Option<Account>,
    #[serde(default)]
    pub status: Option<Status>,
}

/// One event read off the user stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Notification(Notification),
    /// Carries only the id of the deleted status.
    Delete(StatusId),
    Update(Status),
    /// Any stream event altbot doesn't act on, by name.
    Other(String),
}

impl StreamEvent {
    /// Stream event name, as Mastodon labels it.
    pub fn name(&self) -> &str {
        match self {
            StreamEvent::Notification(_) => "notification",
            StreamEvent::Delete(_) => "delete",
            StreamEvent::Update(_) => "update",
            StreamEvent::Other(name) => name,
        }
    }
}

/// Body of `POST /api/v1/statuses`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<StatusId>,
    pub visibility: String,
}

impl NewStatus {
    /// A direct-visibility reply threaded under `in_reply_to_id`.
    pub fn direct_reply(in_reply_to_id: &str, status: String) -> Self {
        Self {
            status,
            in_reply_to_id: Some(in_reply_to_id.to_string()),
            visibility: "direct".to_string(),
        }
    }
}

/// Follower and following id sets for one account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FollowGraph {
    pub follower_ids: HashSet<AccountId>,
    pub following_ids: HashSet<AccountId>,
}

/// Which accounts reconciliation wants to follow and unfollow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FollowDecision {
    pub to_follow: BTreeSet<AccountId>,
    pub to_unfollow: BTreeSet<AccountId>,
}

impl FollowDecision {
    pub fn is_empty(&self) -> bool {
        self.to_follow.is_empty() && self.to_unfollow.is_empty()
    }
}
