// Event classification — decide what, if anything, to do about one event.
//
// Each event is judged on its own; nothing here looks at history or touches
// the network. The stream processor carries out the returned `Action`.

use crate::detect::attachments::{has_uncaptioned_images, target_status};
use crate::detect::formatting::is_fancy_formatted;
use crate::mastodon::models::{AccountId, Notification, Status, StatusId, StreamEvent};

use super::replies::{has_delete_marker, ReplyTemplate};

/// The side effect a stream event calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Follow back an account that just followed the bot.
    FollowBack { account_id: AccountId },
    /// Delete a status outright (a favourited bot reply).
    DeleteStatus { status_id: StatusId },
    /// A status was deleted; remove any bot reply threaded under it.
    DeleteReplyTo { status_id: StatusId },
    /// Send a direct nudge to `acct`, threaded under `in_reply_to_id`.
    Reply {
        in_reply_to_id: StatusId,
        acct: String,
        template: ReplyTemplate,
    },
    Ignore,
}

pub fn classify(event: &StreamEvent) -> Action {
    match event {
        StreamEvent::Notification(notification) => classify_notification(notification),
        StreamEvent::Delete(status_id) => Action::DeleteReplyTo {
            status_id: status_id.clone(),
        },
        StreamEvent::Update(status) => classify_update(status),
        StreamEvent::Other(_) => Action::Ignore,
    }
}

fn classify_notification(notification: &Notification) -> Action {
    match notification.kind.as_str() {
        "follow" => match &notification.account {
            Some(account) => Action::FollowBack {
                account_id: account.id.clone(),
            },
            None => Action::Ignore,
        },
        // Anyone favouriting a marked status triggers the delete; the
        // favouriting account is not checked.
        "favourite" => match &notification.status {
            Some(status) if has_delete_marker(&status.content) => Action::DeleteStatus {
                status_id: status.id.clone(),
            },
            _ => Action::Ignore,
        },
        _ => Action::Ignore,
    }
}

/// Pick the nudge for a status, if it needs one.
///
/// Fancy formatting wins over missing captions. A boost and an original
/// post get different wording, since a booster didn't write the post.
pub fn reply_template(status: &Status) -> Option<ReplyTemplate> {
    let target = target_status(status);
    let boosted = status.reblog.is_some();

    if is_fancy_formatted(&target.content) {
        Some(if boosted {
            ReplyTemplate::FancyBoost
        } else {
            ReplyTemplate::FancyFormatting
        })
    } else if has_uncaptioned_images(status) {
        Some(if boosted {
            ReplyTemplate::UncaptionedBoost
        } else {
            ReplyTemplate::UncaptionedPost
        })
    } else {
        None
    }
}

fn classify_update(status: &Status) -> Action {
    let Some(template) = reply_template(status) else {
        return Action::Ignore;
    };

    // Partial payloads without an author can't be answered.
    let Some(account) = &status.account else {
        return Action::Ignore;
    };
    if account.acct.is_empty() {
        return Action::Ignore;
    }

    Action::Reply {
        in_reply_to_id: target_status(status).id.clone(),
        acct: account.acct.clone(),
        template,
    }
}
