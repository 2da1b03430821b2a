use crate::ports::BoxFuture;
use crate::stories::Story;
use crate::DomainResult;

pub trait StoryRepository: Send + Sync {
    fn insert(&self, story: &Story) -> BoxFuture<'_, DomainResult<Story>>;
    fn get(&self, story_id: &str) -> BoxFuture<'_, DomainResult<Option<Story>>>;
    fn list(&self) -> BoxFuture<'_, DomainResult<Vec<Story>>>;
}
