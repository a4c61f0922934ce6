// Stream processing loop: read events in order, act on them in the background.
//
// Events are pulled one at a time and classified synchronously, so decisions
// happen in arrival order. The resulting remote call runs in its own task and
// the loop moves straight on to the next event; a slow API call never holds
// up the stream.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::mastodon::api::MastodonApi;
use crate::mastodon::models::{NewStatus, StatusId, StreamEvent};

use super::classify::{classify, Action};

pub struct StreamProcessor {
    api: Arc<dyn MastodonApi>,
}

impl StreamProcessor {
    pub fn new(api: Arc<dyn MastodonApi>) -> Self {
        Self { api }
    }

    /// Subscribe to the user stream and process it until it fails.
    ///
    /// Returns `Err` on transport failure. Reconnecting is left to whatever
    /// supervises the process.
    pub async fn run(&self) -> Result<()> {
        let events = self
            .api
            .user_stream()
            .await
            .context("Failed to subscribe to the user stream")?;
        self.process(events).await
    }

    /// Process every event of `events`, in order.
    ///
    /// When the stream ends (or errors), actions still in flight are awaited
    /// before returning.
    pub async fn process<S>(&self, mut events: S) -> Result<()>
    where
        S: Stream<Item = Result<StreamEvent>> + Unpin,
    {
        info!("Listening on the timeline for events");

        let mut tasks = JoinSet::new();
        let mut outcome = Ok(());

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    error!(error = %e, "User stream failed");
                    outcome = Err(e);
                    break;
                }
            };

            let action = classify(&event);
            debug!(event = event.name(), action = ?action, "Stream event received");

            if action != Action::Ignore {
                tasks.spawn(perform(self.api.clone(), action));
            }

            while let Some(finished) = tasks.try_join_next() {
                log_join_error(finished);
            }
        }

        while let Some(finished) = tasks.join_next().await {
            log_join_error(finished);
        }

        outcome
    }
}

fn log_join_error(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!(error = %e, "Action task panicked");
    }
}

/// Carry out one action. Remote failures are logged here and go no further.
pub async fn perform(api: Arc<dyn MastodonApi>, action: Action) {
    match action {
        Action::FollowBack { account_id } => match api.follow(&account_id).await {
            Ok(id) => info!(account_id = %id, "Followed back"),
            Err(e) => warn!(account_id = %account_id, error = %e, "Failed to follow back"),
        },

        Action::DeleteStatus { status_id } => match api.delete_status(&status_id).await {
            Ok(deleted) => info!(status_id = %deleted.id, "Deleted favourited reply"),
            Err(e) => warn!(status_id = %status_id, error = %e, "Failed to delete status"),
        },

        Action::DeleteReplyTo { status_id } => {
            if let Err(e) = delete_reply_to(api.as_ref(), &status_id).await {
                warn!(status_id = %status_id, error = %e, "Failed to clean up reply");
            }
        }

        Action::Reply {
            in_reply_to_id,
            acct,
            template,
        } => {
            let reply = NewStatus::direct_reply(&in_reply_to_id, template.render(&acct));
            match api.send_status(&reply).await {
                Ok(sent) => info!(
                    status_id = %sent.id,
                    in_reply_to_id = %in_reply_to_id,
                    acct = %acct,
                    template = ?template,
                    "Sent reply"
                ),
                Err(e) => warn!(
                    in_reply_to_id = %in_reply_to_id,
                    acct = %acct,
                    error = %e,
                    "Failed to send reply"
                ),
            }
        }

        Action::Ignore => {}
    }
}

/// Delete the bot's reply to `deleted_id`, if it has one among its recent
/// statuses. Returns the id of the deleted reply.
pub async fn delete_reply_to(api: &dyn MastodonApi, deleted_id: &str) -> Result<Option<StatusId>> {
    let bot_id = api.account_id().await?;
    let statuses = api.statuses(&bot_id).await?;

    let Some(reply) = statuses
        .iter()
        .find(|s| s.in_reply_to_id.as_deref() == Some(deleted_id))
    else {
        info!(status_id = %deleted_id, "No reply of ours to clean up");
        return Ok(None);
    };

    let deleted = api.delete_status(&reply.id).await?;
    info!(
        status_id = %deleted.id,
        in_reply_to_id = %deleted_id,
        "Deleted reply to removed status"
    );
    Ok(Some(reply.id.clone()))
}
