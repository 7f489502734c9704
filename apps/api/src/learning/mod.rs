pub mod handlers;
pub mod patterns;
pub mod swipes;
pub mod worker;

/// Redis list the swipe flow pushes user ids onto; the background worker
/// drains it and re-runs pattern detection.
pub const LEARNING_QUEUE_KEY: &str = "matching:learning:pending";
