use crate::friends::{FriendRequest, Friendship};
use crate::ports::BoxFuture;
use crate::DomainResult;

pub trait FriendRepository: Send + Sync {
    fn insert_request(&self, request: &FriendRequest) -> BoxFuture<'_, DomainResult<FriendRequest>>;
    fn get_request(&self, request_id: &str) -> BoxFuture<'_, DomainResult<Option<FriendRequest>>>;
    /// Pending request in either direction between the two users.
    fn find_request_between(
        &self,
        a: &str,
        b: &str,
    ) -> BoxFuture<'_, DomainResult<Option<FriendRequest>>>;
    fn delete_request(&self, request_id: &str) -> BoxFuture<'_, DomainResult<()>>;
    fn list_incoming(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<FriendRequest>>>;

    fn insert_friendship(&self, friendship: &Friendship) -> BoxFuture<'_, DomainResult<()>>;
    fn are_friends(&self, a: &str, b: &str) -> BoxFuture<'_, DomainResult<bool>>;
    fn list_friends(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<Friendship>>>;
}
