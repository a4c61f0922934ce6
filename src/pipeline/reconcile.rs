// Follower reconciliation: follow back new followers, drop accounts that
// stopped following.
//
// Steps:
// 1. Fetch the bot's follower and following id sets
// 2. Followers the bot doesn't follow yet become follow candidates
// 3. One batched relationship lookup filters out candidates with a pending
//    request, an existing follow, or a mute on the bot
// 4. Accounts the bot follows that don't follow back get unfollowed
// 5. All follows and unfollows run concurrently; failures are collected,
//    never fatal to the batch
//
// Nothing is remembered between runs. Every decision comes from the remote
// state at the time of the call.

use std::collections::{BTreeSet, HashSet};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::mastodon::api::MastodonApi;
use crate::mastodon::models::{AccountId, FollowDecision, FollowGraph, Relationship};

/// Default cap on in-flight follow/unfollow calls.
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowAction {
    Follow,
    Unfollow,
}

/// One follow/unfollow call that failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionFailure {
    pub account_id: AccountId,
    pub action: FollowAction,
    pub error: String,
}

/// What a reconciliation run decided and what it managed to do.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub decision: FollowDecision,
    pub followed: Vec<AccountId>,
    pub unfollowed: Vec<AccountId>,
    pub failures: Vec<ActionFailure>,
}

/// Followers the bot doesn't follow yet, sorted for a stable lookup order.
pub fn follow_candidates(graph: &FollowGraph) -> Vec<AccountId> {
    let mut candidates: Vec<AccountId> = graph
        .follower_ids
        .difference(&graph.following_ids)
        .cloned()
        .collect();
    candidates.sort();
    candidates
}

/// Accounts the bot follows that don't follow it back.
pub fn unfollow_candidates(graph: &FollowGraph) -> BTreeSet<AccountId> {
    graph
        .following_ids
        .difference(&graph.follower_ids)
        .cloned()
        .collect()
}

/// Whether a follow request to this account is wanted.
///
/// `followed_by` is re-checked even though every candidate came from the
/// follower list; the relationship lookup is fresher than the listing.
pub fn should_follow(relationship: &Relationship) -> bool {
    relationship.followed_by
        && !relationship.requested
        && !relationship.following
        && !relationship.muting
}

/// Compute the follow decision for `bot_id` without changing anything.
pub async fn decide(api: &dyn MastodonApi, bot_id: &str) -> Result<FollowDecision> {
    let graph = api
        .followers_and_following(bot_id)
        .await
        .context("Failed to fetch followers and following")?;

    let candidates = follow_candidates(&graph);
    let to_unfollow = unfollow_candidates(&graph);

    let to_follow = if candidates.is_empty() {
        BTreeSet::new()
    } else {
        let wanted: HashSet<&AccountId> = candidates.iter().collect();
        let relationships = api
            .relationships(&candidates)
            .await
            .context("Failed to fetch relationships for follow candidates")?;

        relationships
            .iter()
            .filter(|r| wanted.contains(&r.id))
            .filter(|r| {
                let keep = should_follow(r);
                if !keep {
                    debug!(account_id = %r.id, "Skipping follow candidate");
                }
                keep
            })
            .map(|r| r.id.clone())
            .collect()
    };

    info!(
        followers = graph.follower_ids.len(),
        following = graph.following_ids.len(),
        candidates = candidates.len(),
        to_follow = to_follow.len(),
        to_unfollow = to_unfollow.len(),
        "Computed follow decision"
    );

    Ok(FollowDecision {
        to_follow,
        to_unfollow,
    })
}

/// Carry out a decision. Calls run concurrently, at most `concurrency` at a
/// time; each failure is logged and reported without stopping the others.
pub async fn execute(
    api: &dyn MastodonApi,
    decision: &FollowDecision,
    concurrency: usize,
) -> ReconcileReport {
    let jobs: Vec<(FollowAction, AccountId)> = decision
        .to_follow
        .iter()
        .map(|id| (FollowAction::Follow, id.clone()))
        .chain(
            decision
                .to_unfollow
                .iter()
                .map(|id| (FollowAction::Unfollow, id.clone())),
        )
        .collect();

    let results: Vec<(FollowAction, AccountId, Result<AccountId>)> =
        stream::iter(jobs.into_iter().map(|(action, id)| async move {
            let result = match action {
                FollowAction::Follow => api.follow(&id).await,
                FollowAction::Unfollow => api.unfollow(&id).await,
            };
            (action, id, result)
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = ReconcileReport {
        decision: decision.clone(),
        ..Default::default()
    };

    for (action, id, result) in results {
        match (action, result) {
            (FollowAction::Follow, Ok(_)) => {
                info!(account_id = %id, "Followed back");
                report.followed.push(id);
            }
            (FollowAction::Unfollow, Ok(_)) => {
                info!(account_id = %id, "Unfollowed");
                report.unfollowed.push(id);
            }
            (action, Err(e)) => {
                warn!(account_id = %id, action = ?action, error = %e, "Follow change failed");
                report.failures.push(ActionFailure {
                    account_id: id,
                    action,
                    error: format!("{e:#}"),
                });
            }
        }
    }

    report.followed.sort();
    report.unfollowed.sort();
    report
        .failures
        .sort_by(|a, b| a.account_id.cmp(&b.account_id));

    report
}

/// One full reconciliation pass for the authenticated account.
pub async fn reconcile(api: &dyn MastodonApi, concurrency: usize) -> Result<ReconcileReport> {
    info!("Reconciling followers and following");

    let bot_id = api.account_id().await?;
    let decision = decide(api, &bot_id).await?;
    let report = execute(api, &decision, concurrency).await;

    info!(
        followed = report.followed.len(),
        unfollowed = report.unfollowed.len(),
        failed = report.failures.len(),
        "Reconciliation complete"
    );

    Ok(report)
}
