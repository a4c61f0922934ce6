// Remediation messages sent as direct replies.
//
// Every message carries DELETE_MARKER. Favouriting a bot reply that
// contains it makes the bot delete the reply, which gives recipients a
// one-click way to dismiss the nudge.

/// Phrase whose presence in a favourited status means "delete me".
pub const DELETE_MARKER: &str = "Favourite this message and I'll delete it.";

/// Which nudge to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTemplate {
    /// The post uses styled Unicode letters.
    FancyFormatting,
    /// The account boosted a post that uses styled Unicode letters.
    FancyBoost,
    /// The account boosted a post whose images lack alt text.
    UncaptionedBoost,
    /// The account posted images without alt text.
    UncaptionedPost,
}

impl ReplyTemplate {
    pub fn text(self) -> &'static str {
        match self {
            ReplyTemplate::FancyFormatting => concat!(
                "Hi! Your post uses fancy Unicode letters. Screen readers read these out ",
                "one symbol at a time, or skip them entirely, so some people can't follow ",
                "what you wrote. Plain text works for everyone. ",
                "Favourite this message and I'll delete it."
            ),
            ReplyTemplate::FancyBoost => concat!(
                "Hi! You boosted a post that uses fancy Unicode letters. Screen readers ",
                "read these out one symbol at a time, or skip them entirely, so some of ",
                "your followers can't follow it. ",
                "Favourite this message and I'll delete it."
            ),
            ReplyTemplate::UncaptionedBoost => concat!(
                "Hi! You boosted a post with an image that has no description, so people ",
                "using screen readers can't tell what it shows. Consider boosting a version ",
                "with alt text, or asking the author to add some. ",
                "Favourite this message and I'll delete it."
            ),
            ReplyTemplate::UncaptionedPost => concat!(
                "Hi! Your post has an image without a description. Adding alt text lets ",
                "people using screen readers know what it shows, and you can edit the post ",
                "to add it. Favourite this message and I'll delete it."
            ),
        }
    }

    /// Full reply body, addressed to `acct`.
    pub fn render(self, acct: &str) -> String {
        format!("@{} {}", acct.trim_start_matches('@'), self.text())
    }
}

/// True if `content` is one of our replies that its recipient wants gone.
pub fn has_delete_marker(content: &str) -> bool {
    content.contains(DELETE_MARKER) || content.contains(&escape_html(DELETE_MARKER))
}

// Statuses come back as HTML, where the apostrophe may be escaped.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('\'', "&#39;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
