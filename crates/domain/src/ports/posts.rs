use crate::posts::Post;
use crate::ports::BoxFuture;
use crate::DomainResult;

/// Two logical collections: a moderation queue and the live feed.
/// A post id appears in at most one of them at a time.
pub trait PostStore: Send + Sync {
    fn insert_pending(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>>;
    fn get_pending(&self, post_id: &str) -> BoxFuture<'_, DomainResult<Option<Post>>>;
    fn update_pending(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>>;
    fn delete_pending(&self, post_id: &str) -> BoxFuture<'_, DomainResult<()>>;
    fn list_pending(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<Post>>>;
    fn list_pending_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<Post>>>;

    /// Fails with `Conflict` when the post id is already live.
    fn insert_live(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>>;
    fn get_live(&self, post_id: &str) -> BoxFuture<'_, DomainResult<Option<Post>>>;
    fn delete_live(&self, post_id: &str) -> BoxFuture<'_, DomainResult<()>>;
    fn list_live(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<Post>>>;
    fn list_live_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<Post>>>;
}
