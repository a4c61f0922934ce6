// Missing alt text detection.

use crate::mastodon::models::Status;

/// The status whose content actually matters: the boosted original for a
/// reblog, the status itself otherwise. Resolves exactly one level.
pub fn target_status(status: &Status) -> &Status {
    status.reblog.as_deref().unwrap_or(status)
}

/// True iff the status (or, for a boost, the boosted original) has at least
/// one media attachment without a description.
pub fn has_uncaptioned_images(status: &Status) -> bool {
    target_status(status)
        .media_attachments
        .iter()
        .any(|attachment| !attachment.is_captioned())
}
