use crate::moderation::{ModerationRequest, ProviderOutcome, Verdict};
use crate::ports::BoxFuture;

/// Specialized media/text analysis service. May decline to judge.
pub trait MediaModerationProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, request: &ModerationRequest) -> BoxFuture<'_, ProviderOutcome>;
}

/// Last-resort reviewer. Always produces a verdict, degrading to a
/// flagged one when the upstream service is unreachable.
pub trait GenerativeModerationProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn review(&self, request: &ModerationRequest) -> BoxFuture<'_, Verdict>;
}
