// Engine exports
pub mod ranking;
pub mod retry;
pub mod sync;
pub mod trigger;

pub use ranking::RankedQueryService;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use sync::{MatchSynchronizer, SyncPolicy};
pub use trigger::{affects_scoring, RecomputeTrigger};
