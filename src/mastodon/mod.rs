// Mastodon API surface — the capability trait, its reqwest implementation,
// entity types, and SSE decoding for the user stream.

pub mod api;
pub mod client;
pub mod models;
pub mod stream;
