// altbot: a Mastodon bot that asks people to caption their images and to
// skip fancy Unicode letters.
//
// This is the library root. Each module corresponds to a major subsystem
// of the bot.

pub mod config;
pub mod detect;
pub mod mastodon;
pub mod pipeline;

#[cfg(feature = "web")]
pub mod web;
