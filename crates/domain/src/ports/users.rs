use crate::ports::BoxFuture;
use crate::users::User;
use crate::DomainResult;

pub trait UserRepository: Send + Sync {
    fn upsert(&self, user: &User) -> BoxFuture<'_, DomainResult<User>>;
    fn get(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<User>>>;
    fn search(&self, query: &str, limit: usize) -> BoxFuture<'_, DomainResult<Vec<User>>>;
    fn list(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<User>>>;
    fn count(&self) -> BoxFuture<'_, DomainResult<usize>>;
}
