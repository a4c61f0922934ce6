// Bot behaviour: classify stream events, act on them, and reconcile the
// follow graph.

pub mod classify;
pub mod reconcile;
pub mod replies;
pub mod stream;
