// In-memory MastodonApi fake shared by the integration tests.
//
// Holds a fixed follow graph, relationships and bot statuses, records every
// mutating call, and can be told to fail specific ones.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Notify;

use altbot::mastodon::api::{EventStream, MastodonApi};
use altbot::mastodon::models::{
    Account, AccountId, FollowGraph, MediaAttachment, NewStatus, Relationship, Status,
    StreamEvent,
};

pub const BOT_ID: &str = "bot";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Follow(AccountId),
    Unfollow(AccountId),
    Delete(String),
    Send(NewStatus),
    Relationships(Vec<AccountId>),
}

#[derive(Default)]
pub struct FakeApi {
    pub followers: HashSet<AccountId>,
    pub following: HashSet<AccountId>,
    pub relationships: HashMap<AccountId, Relationship>,
    pub statuses: Vec<Status>,
    pub failing_follows: HashSet<AccountId>,
    pub fail_graph: bool,
    pub fail_sends: bool,
    /// When set, `send_status` records the call and then waits for a permit.
    pub send_gate: Option<Arc<Notify>>,
    pub events: Mutex<Option<Vec<Result<StreamEvent>>>>,
    pub calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn with_graph(followers: &[&str], following: &[&str]) -> Self {
        Self {
            followers: followers.iter().map(|s| s.to_string()).collect(),
            following: following.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Add a relationship that passes the follow filter unless modified.
    pub fn relationship(mut self, id: &str, edit: impl FnOnce(&mut Relationship)) -> Self {
        let mut relationship = Relationship {
            id: id.to_string(),
            followed_by: true,
            ..Default::default()
        };
        edit(&mut relationship);
        self.relationships.insert(id.to_string(), relationship);
        self
    }

    pub fn with_events(self, events: Vec<Result<StreamEvent>>) -> Self {
        *self.events.lock().unwrap() = Some(events);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn follows(&self) -> Vec<AccountId> {
        let mut ids: Vec<_> = self
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Follow(id) => Some(id),
                _ => None,
            })
            .collect();
        ids.sort();
        ids
    }

    pub fn unfollows(&self) -> Vec<AccountId> {
        let mut ids: Vec<_> = self
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Unfollow(id) => Some(id),
                _ => None,
            })
            .collect();
        ids.sort();
        ids
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn sends(&self) -> Vec<NewStatus> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MastodonApi for FakeApi {
    async fn account_id(&self) -> Result<AccountId> {
        Ok(BOT_ID.to_string())
    }

    async fn statuses(&self, account_id: &str) -> Result<Vec<Status>> {
        assert_eq!(account_id, BOT_ID);
        Ok(self.statuses.clone())
    }

    async fn send_status(&self, status: &NewStatus) -> Result<Status> {
        self.record(Call::Send(status.clone()));
        if let Some(gate) = &self.send_gate {
            gate.notified().await;
        }
        if self.fail_sends {
            anyhow::bail!("Mastodon statuses returned 422 Unprocessable Entity");
        }
        Ok(Status {
            id: format!("sent-{}", self.sends().len()),
            in_reply_to_id: status.in_reply_to_id.clone(),
            ..Default::default()
        })
    }

    async fn delete_status(&self, id: &str) -> Result<Status> {
        self.record(Call::Delete(id.to_string()));
        Ok(Status {
            id: id.to_string(),
            ..Default::default()
        })
    }

    async fn follow(&self, id: &str) -> Result<AccountId> {
        self.record(Call::Follow(id.to_string()));
        if self.failing_follows.contains(id) {
            anyhow::bail!("Mastodon accounts/{id}/follow returned 500 Internal Server Error");
        }
        Ok(id.to_string())
    }

    async fn unfollow(&self, id: &str) -> Result<AccountId> {
        self.record(Call::Unfollow(id.to_string()));
        Ok(id.to_string())
    }

    async fn followers_and_following(&self, account_id: &str) -> Result<FollowGraph> {
        assert_eq!(account_id, BOT_ID);
        if self.fail_graph {
            anyhow::bail!("Mastodon accounts/bot/followers returned 503 Service Unavailable");
        }
        Ok(FollowGraph {
            follower_ids: self.followers.clone(),
            following_ids: self.following.clone(),
        })
    }

    async fn relationships(&self, ids: &[AccountId]) -> Result<Vec<Relationship>> {
        self.record(Call::Relationships(ids.to_vec()));
        Ok(ids
            .iter()
            .filter_map(|id| self.relationships.get(id).cloned())
            .collect())
    }

    async fn user_stream(&self) -> Result<EventStream> {
        let events = self.events.lock().unwrap().take().unwrap_or_default();
        Ok(futures::stream::iter(events).boxed())
    }
}

// -- Status builders --

pub fn account(acct: &str) -> Account {
    Account {
        id: format!("id-{acct}"),
        acct: acct.to_string(),
        username: acct.split('@').next().unwrap_or(acct).to_string(),
    }
}

pub fn media(description: Option<&str>) -> MediaAttachment {
    MediaAttachment {
        id: "media".to_string(),
        kind: "image".to_string(),
        description: description.map(String::from),
    }
}

pub fn status(id: &str, acct: &str, content: &str, media: Vec<MediaAttachment>) -> Status {
    Status {
        id: id.to_string(),
        account: Some(account(acct)),
        content: content.to_string(),
        media_attachments: media,
        ..Default::default()
    }
}

pub fn boost(id: &str, booster: &str, original: Status) -> Status {
    Status {
        id: id.to_string(),
        account: Some(account(booster)),
        reblog: Some(Box::new(original)),
        ..Default::default()
    }
}

pub fn bot_reply(id: &str, in_reply_to_id: &str) -> Status {
    Status {
        id: id.to_string(),
        account: Some(Account {
            id: BOT_ID.to_string(),
            acct: "altbot".to_string(),
            username: "altbot".to_string(),
        }),
        in_reply_to_id: Some(in_reply_to_id.to_string()),
        visibility: Some("direct".to_string()),
        ..Default::default()
    }
}
