// Pure, side-effect-free checks applied to every timeline status.

pub mod attachments;
pub mod formatting;
