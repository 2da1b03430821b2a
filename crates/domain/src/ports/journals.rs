use crate::journals::JournalEntry;
use crate::ports::BoxFuture;
use crate::DomainResult;

pub trait JournalRepository: Send + Sync {
    fn insert(&self, entry: &JournalEntry) -> BoxFuture<'_, DomainResult<JournalEntry>>;
    fn get(&self, entry_id: &str) -> BoxFuture<'_, DomainResult<Option<JournalEntry>>>;
    fn update(&self, entry: &JournalEntry) -> BoxFuture<'_, DomainResult<JournalEntry>>;
    fn delete(&self, entry_id: &str) -> BoxFuture<'_, DomainResult<()>>;
    fn list_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<JournalEntry>>>;
}
