use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Role;
use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::ports::users::UserRepository;
use crate::util::now_ms;
use crate::DomainResult;

const SEARCH_LIMIT: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellerStatus {
    NotApplied,
    Pending,
    Approved,
}

impl SellerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SellerStatus::NotApplied => "not_applied",
            SellerStatus::Pending => "pending",
            SellerStatus::Approved => "approved",
        }
    }

    pub fn parse(value: &str) -> DomainResult<Self> {
        match value {
            "not_applied" => Ok(SellerStatus::NotApplied),
            "pending" => Ok(SellerStatus::Pending),
            "approved" => Ok(SellerStatus::Approved),
            other => Err(DomainError::Validation(format!(
                "unknown seller status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub seller_status: SellerStatus,
    pub profile_pic: Option<String>,
    pub bio: Option<String>,
    pub is_verified: bool,
    pub created_at_ms: i64,
}

/// Public projection of a profile, safe to return to other users.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublicProfile {
    pub id: String,
    pub full_name: String,
    pub profile_pic: Option<String>,
    pub bio: Option<String>,
    pub seller_status: SellerStatus,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            profile_pic: user.profile_pic,
            bio: user.bio,
            seller_status: user.seller_status,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Provisions a minimal profile on first sight of an authenticated
    /// identity. Existing profiles are left untouched.
    pub async fn ensure_user(&self, actor: &ActorIdentity, role: Role) -> DomainResult<User> {
        if let Some(existing) = self.repo.get(&actor.user_id).await? {
            return Ok(existing);
        }
        let user = User {
            id: actor.user_id.clone(),
            email: String::new(),
            full_name: actor.username.clone(),
            role,
            seller_status: SellerStatus::NotApplied,
            profile_pic: None,
            bio: None,
            is_verified: true,
            created_at_ms: now_ms(),
        };
        let stored = self.repo.upsert(&user).await?;
        info!(user_id = %stored.id, "profile provisioned");
        Ok(stored)
    }

    pub async fn profile(&self, user_id: &str) -> DomainResult<PublicProfile> {
        let user = self.repo.get(user_id).await?.ok_or(DomainError::NotFound)?;
        if !user.is_verified {
            return Err(DomainError::NotFound);
        }
        Ok(user.into())
    }

    /// Verified users matching the query, never including the searcher.
    pub async fn search(&self, actor: &ActorIdentity, query: &str) -> DomainResult<Vec<PublicProfile>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DomainError::Validation("search query is required".into()));
        }
        let users = self.repo.search(query, SEARCH_LIMIT + 1).await?;
        Ok(users
            .into_iter()
            .filter(|user| user.is_verified && user.id != actor.user_id)
            .take(SEARCH_LIMIT)
            .map(PublicProfile::from)
            .collect())
    }

    pub async fn admin_list(&self, limit: usize) -> DomainResult<Vec<User>> {
        self.repo.list(limit).await
    }

    pub async fn count(&self) -> DomainResult<usize> {
        self.repo.count().await
    }

    /// Seller application review. Re-approving is an idempotent no-op.
    pub async fn approve_seller(&self, admin: &ActorIdentity, user_id: &str) -> DomainResult<User> {
        let user = self.repo.get(user_id).await?.ok_or(DomainError::NotFound)?;
        match user.seller_status {
            SellerStatus::Approved => Ok(user),
            SellerStatus::Pending | SellerStatus::NotApplied => {
                let mut approved = user;
                approved.seller_status = SellerStatus::Approved;
                if approved.role == Role::User {
                    approved.role = Role::Seller;
                }
                let stored = self.repo.upsert(&approved).await?;
                info!(user_id, admin_id = %admin.user_id, "seller approved");
                Ok(stored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::BoxFuture;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    struct MockUserRepo {
        users: RwLock<HashMap<String, User>>,
    }

    impl UserRepository for MockUserRepo {
        fn upsert(&self, user: &User) -> BoxFuture<'_, DomainResult<User>> {
            let user = user.clone();
            Box::pin(async move {
                self.users
                    .write()
                    .unwrap()
                    .insert(user.id.clone(), user.clone());
                Ok(user)
            })
        }

        fn get(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<User>>> {
            let user_id = user_id.to_string();
            Box::pin(async move { Ok(self.users.read().unwrap().get(&user_id).cloned()) })
        }

        fn search(&self, query: &str, limit: usize) -> BoxFuture<'_, DomainResult<Vec<User>>> {
            let query = query.to_lowercase();
            Box::pin(async move {
                let mut hits: Vec<User> = self
                    .users
                    .read()
                    .unwrap()
                    .values()
                    .filter(|user| {
                        user.full_name.to_lowercase().contains(&query)
                            || user.email.to_lowercase().contains(&query)
                    })
                    .cloned()
                    .collect();
                hits.truncate(limit);
                Ok(hits)
            })
        }

        fn list(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<User>>> {
            Box::pin(async move {
                let mut users: Vec<User> = self.users.read().unwrap().values().cloned().collect();
                users.truncate(limit);
                Ok(users)
            })
        }

        fn count(&self) -> BoxFuture<'_, DomainResult<usize>> {
            Box::pin(async move { Ok(self.users.read().unwrap().len()) })
        }
    }

    fn service() -> (Arc<MockUserRepo>, UserService) {
        let repo = Arc::new(MockUserRepo::default());
        (repo.clone(), UserService::new(repo))
    }

    fn user(id: &str, name: &str, verified: bool) -> User {
        User {
            id: id.to_string(),
            email: format!("{name}@example.com"),
            full_name: name.to_string(),
            role: Role::User,
            seller_status: SellerStatus::NotApplied,
            profile_pic: None,
            bio: None,
            is_verified: verified,
            created_at_ms: now_ms(),
        }
    }

    fn actor(id: &str, name: &str) -> ActorIdentity {
        ActorIdentity::new(id, name)
    }

    #[tokio::test]
    async fn ensure_user_provisions_once() {
        let (repo, service) = service();
        let mira = actor("user-1", "mira");

        let first = service.ensure_user(&mira, Role::User).await.unwrap();
        assert_eq!(first.full_name, "mira");

        repo.users.write().unwrap().get_mut("user-1").unwrap().bio =
            Some("hello".to_string());
        let second = service.ensure_user(&mira, Role::User).await.unwrap();
        assert_eq!(second.bio.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn unverified_profiles_are_hidden() {
        let (repo, service) = service();
        repo.users
            .write()
            .unwrap()
            .insert("user-2".to_string(), user("user-2", "sam", false));

        let err = service.profile("user-2").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[tokio::test]
    async fn search_excludes_self_and_unverified() {
        let (repo, service) = service();
        {
            let mut guard = repo.users.write().unwrap();
            guard.insert("user-1".to_string(), user("user-1", "mira", true));
            guard.insert("user-2".to_string(), user("user-2", "miranda", true));
            guard.insert("user-3".to_string(), user("user-3", "mirabel", false));
        }

        let hits = service.search(&actor("user-1", "mira"), "mira").await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|profile| profile.id.as_str()).collect();
        assert_eq!(ids, vec!["user-2"]);
    }

    #[tokio::test]
    async fn approving_a_seller_twice_is_a_no_op() {
        let (repo, service) = service();
        let mut applicant = user("user-2", "sam", true);
        applicant.seller_status = SellerStatus::Pending;
        repo.users
            .write()
            .unwrap()
            .insert("user-2".to_string(), applicant);

        let approved = service
            .approve_seller(&actor("admin-1", "root"), "user-2")
            .await
            .unwrap();
        assert_eq!(approved.seller_status, SellerStatus::Approved);
        assert_eq!(approved.role, Role::Seller);

        let again = service
            .approve_seller(&actor("admin-1", "root"), "user-2")
            .await
            .unwrap();
        assert_eq!(again.seller_status, SellerStatus::Approved);
    }
}
