use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::ports::friends::FriendRepository;
use crate::ports::users::UserRepository;
use crate::util::{now_ms, uuid_v7_without_dashes};
use crate::DomainResult;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: String,
    pub from_user_id: String,
    pub from_user_name: String,
    pub to_user_id: String,
    pub created_at_ms: i64,
}

/// One direction of a mutual link; accepting a request stores both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Friendship {
    pub user_id: String,
    pub friend_id: String,
    pub created_at_ms: i64,
}

/// Re-sending to an existing friend or an open request is not an error.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestOutcome {
    Sent(FriendRequest),
    AlreadyFriends,
    AlreadyPending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestResponse {
    Accept,
    Decline,
}

#[derive(Clone)]
pub struct FriendService {
    repo: Arc<dyn FriendRepository>,
    users: Arc<dyn UserRepository>,
}

impl FriendService {
    pub fn new(repo: Arc<dyn FriendRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { repo, users }
    }

    pub async fn send_request(
        &self,
        actor: &ActorIdentity,
        to_user_id: &str,
    ) -> DomainResult<RequestOutcome> {
        if to_user_id == actor.user_id {
            return Err(DomainError::Validation(
                "cannot send a friend request to yourself".into(),
            ));
        }
        let target = self
            .users
            .get(to_user_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        if !target.is_verified {
            return Err(DomainError::NotFound);
        }

        if self.repo.are_friends(&actor.user_id, to_user_id).await? {
            return Ok(RequestOutcome::AlreadyFriends);
        }
        if self
            .repo
            .find_request_between(&actor.user_id, to_user_id)
            .await?
            .is_some()
        {
            return Ok(RequestOutcome::AlreadyPending);
        }

        let request = FriendRequest {
            id: uuid_v7_without_dashes(),
            from_user_id: actor.user_id.clone(),
            from_user_name: actor.username.clone(),
            to_user_id: to_user_id.to_string(),
            created_at_ms: now_ms(),
        };
        let stored = self.repo.insert_request(&request).await?;
        info!(from = %actor.user_id, to = to_user_id, "friend request sent");
        Ok(RequestOutcome::Sent(stored))
    }

    pub async fn incoming(&self, actor: &ActorIdentity) -> DomainResult<Vec<FriendRequest>> {
        self.repo.list_incoming(&actor.user_id).await
    }

    /// Only the addressee may respond. Accepting stores the link in both
    /// directions; either way the request is consumed.
    pub async fn respond(
        &self,
        actor: &ActorIdentity,
        request_id: &str,
        response: RequestResponse,
    ) -> DomainResult<()> {
        let request = self
            .repo
            .get_request(request_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        if request.to_user_id != actor.user_id {
            return Err(DomainError::NotFound);
        }

        if response == RequestResponse::Accept {
            let now = now_ms();
            self.repo
                .insert_friendship(&Friendship {
                    user_id: request.from_user_id.clone(),
                    friend_id: request.to_user_id.clone(),
                    created_at_ms: now,
                })
                .await?;
            self.repo
                .insert_friendship(&Friendship {
                    user_id: request.to_user_id.clone(),
                    friend_id: request.from_user_id.clone(),
                    created_at_ms: now,
                })
                .await?;
            info!(
                from = %request.from_user_id,
                to = %request.to_user_id,
                "friend request accepted"
            );
        }
        self.repo.delete_request(request_id).await
    }

    pub async fn friends(&self, actor: &ActorIdentity) -> DomainResult<Vec<Friendship>> {
        self.repo.list_friends(&actor.user_id).await
    }
}
