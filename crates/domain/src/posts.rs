use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::moderation::{ModerationOutcome, ModerationPipeline, ModerationRequest, Verdict, VerdictStatus};
use crate::ports::posts::PostStore;
use crate::util::{now_ms, uuid_v7_without_dashes};
use crate::DomainResult;

pub const MAX_POST_CHARS: usize = 5000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Pending,
    Approved,
    Rejected,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Approved => "approved",
            PostStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> DomainResult<Self> {
        match value {
            "pending" => Ok(PostStatus::Pending),
            "approved" => Ok(PostStatus::Approved),
            "rejected" => Ok(PostStatus::Rejected),
            other => Err(DomainError::Validation(format!(
                "unknown post status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub status: PostStatus,
    pub verdict: Option<Verdict>,
    pub rejection_reason: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewPost {
    pub body: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

/// Result of an admin transition. Retries of an already-applied
/// transition are reported as such instead of failing.
#[derive(Clone, Debug, PartialEq)]
pub enum TransitionOutcome {
    Applied(Post),
    AlreadyInTarget(Post),
}

impl TransitionOutcome {
    pub fn post(&self) -> &Post {
        match self {
            TransitionOutcome::Applied(post) | TransitionOutcome::AlreadyInTarget(post) => post,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn PostStore>,
    pipeline: ModerationPipeline,
}

impl PostService {
    pub fn new(store: Arc<dyn PostStore>, pipeline: ModerationPipeline) -> Self {
        Self { store, pipeline }
    }

    fn validate_url(label: &str, url: &Option<String>) -> DomainResult<()> {
        if let Some(url) = url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DomainError::Validation(format!(
                    "{label} must be an http(s) url"
                )));
            }
        }
        Ok(())
    }

    fn validate_new_post(input: &NewPost) -> DomainResult<()> {
        let body = input.body.trim();
        if body.is_empty() {
            return Err(DomainError::Validation("post body is required".into()));
        }
        if body.chars().count() > MAX_POST_CHARS {
            return Err(DomainError::Validation(format!(
                "post body exceeds {MAX_POST_CHARS} characters"
            )));
        }
        Self::validate_url("image_url", &input.image_url)?;
        Self::validate_url("video_url", &input.video_url)?;
        Ok(())
    }

    /// Moderates the content inline and routes the post to the live feed
    /// or the review queue based on the verdict.
    pub async fn submit(&self, author: &ActorIdentity, input: NewPost) -> DomainResult<Post> {
        Self::validate_new_post(&input)?;

        let id = uuid_v7_without_dashes();
        let request = ModerationRequest::new(
            &id,
            input.body.trim(),
            input.image_url.clone(),
            input.video_url.clone(),
        );
        let ModerationOutcome { verdict, attempts } = self.pipeline.check_content(&request).await;
        info!(
            post_id = %id,
            author_id = %author.user_id,
            status = verdict.status.as_str(),
            source = verdict.source.as_str(),
            stages = attempts.len(),
            "post moderated"
        );

        let now = now_ms();
        let status = match verdict.status {
            VerdictStatus::Approved => PostStatus::Approved,
            VerdictStatus::Rejected => PostStatus::Rejected,
            VerdictStatus::Flagged => PostStatus::Pending,
        };
        let rejection_reason = match verdict.status {
            VerdictStatus::Rejected => Some(
                verdict
                    .category
                    .clone()
                    .unwrap_or_else(|| "policy violation".to_string()),
            ),
            _ => None,
        };
        let post = Post {
            id,
            author_id: author.user_id.clone(),
            author_name: author.username.clone(),
            body: input.body.trim().to_string(),
            image_url: input.image_url,
            video_url: input.video_url,
            status,
            verdict: Some(verdict),
            rejection_reason,
            created_at_ms: now,
            updated_at_ms: now,
        };

        match post.status {
            PostStatus::Approved => self.store.insert_live(&post).await,
            PostStatus::Pending | PostStatus::Rejected => self.store.insert_pending(&post).await,
        }
    }

    pub async fn feed(&self, limit: usize) -> DomainResult<Vec<Post>> {
        self.store.list_live(limit).await
    }

    pub async fn get(&self, post_id: &str) -> DomainResult<Post> {
        if let Some(post) = self.store.get_live(post_id).await? {
            return Ok(post);
        }
        self.store
            .get_pending(post_id)
            .await?
            .ok_or(DomainError::NotFound)
    }

    /// Everything by one author, live and queued, newest first.
    pub async fn posts_by_author(&self, author_id: &str) -> DomainResult<Vec<Post>> {
        let mut posts = self.store.list_live_by_author(author_id).await?;
        posts.extend(self.store.list_pending_by_author(author_id).await?);
        posts.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        Ok(posts)
    }

    pub async fn review_queue(&self, limit: usize) -> DomainResult<Vec<Post>> {
        self.store.list_pending(limit).await
    }

    /// Admin override: moves a queued post into the live feed. A retry
    /// after a partially applied move still converges on the live copy.
    pub async fn approve(
        &self,
        admin: &ActorIdentity,
        post_id: &str,
    ) -> DomainResult<TransitionOutcome> {
        let pending = match self.store.get_pending(post_id).await? {
            Some(post) => post,
            None => {
                return match self.store.get_live(post_id).await? {
                    Some(live) => Ok(TransitionOutcome::AlreadyInTarget(live)),
                    None => Err(DomainError::NotFound),
                };
            }
        };

        let mut approved = pending;
        approved.status = PostStatus::Approved;
        approved.rejection_reason = None;
        approved.updated_at_ms = now_ms();

        let live = match self.store.insert_live(&approved).await {
            Ok(post) => post,
            // A previous approve inserted the live copy but died before
            // clearing the queue entry.
            Err(DomainError::Conflict) => self
                .store
                .get_live(post_id)
                .await?
                .ok_or(DomainError::Conflict)?,
            Err(err) => return Err(err),
        };
        self.store.delete_pending(post_id).await?;
        info!(post_id, admin_id = %admin.user_id, "post approved");
        Ok(TransitionOutcome::Applied(live))
    }

    /// Admin override: marks a queued post rejected in place, keeping the
    /// record visible to its author.
    pub async fn reject(
        &self,
        admin: &ActorIdentity,
        post_id: &str,
        reason: &str,
    ) -> DomainResult<TransitionOutcome> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::Validation(
                "rejection reason is required".into(),
            ));
        }

        let pending = match self.store.get_pending(post_id).await? {
            Some(post) => post,
            None => {
                if self.store.get_live(post_id).await?.is_some() {
                    return Err(DomainError::Conflict);
                }
                return Err(DomainError::NotFound);
            }
        };

        // A repeat rejection still writes through so the latest reason wins.
        let was_rejected = pending.status == PostStatus::Rejected;
        let mut rejected = pending;
        rejected.status = PostStatus::Rejected;
        rejected.rejection_reason = Some(reason.to_string());
        rejected.updated_at_ms = now_ms();
        let stored = self.store.update_pending(&rejected).await?;
        info!(post_id, admin_id = %admin.user_id, reason, "post rejected");
        if was_rejected {
            Ok(TransitionOutcome::AlreadyInTarget(stored))
        } else {
            Ok(TransitionOutcome::Applied(stored))
        }
    }

    pub async fn delete(&self, actor: &ActorIdentity, is_admin: bool, post_id: &str) -> DomainResult<()> {
        let post = self.get(post_id).await?;
        if !is_admin && post.author_id != actor.user_id {
            return Err(DomainError::Forbidden(
                "only the author or an admin can delete a post".into(),
            ));
        }
        match post.status {
            PostStatus::Approved => self.store.delete_live(post_id).await,
            PostStatus::Pending | PostStatus::Rejected => self.store.delete_pending(post_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::VerdictSource;
    use crate::ports::BoxFuture;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    struct MockPostStore {
        pending: RwLock<HashMap<String, Post>>,
        live: RwLock<HashMap<String, Post>>,
    }

    impl MockPostStore {
        fn seed_pending(&self, post: Post) {
            self.pending
                .write()
                .unwrap()
                .insert(post.id.clone(), post);
        }
    }

    impl PostStore for MockPostStore {
        fn insert_pending(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>> {
            let post = post.clone();
            Box::pin(async move {
                self.pending
                    .write()
                    .unwrap()
                    .insert(post.id.clone(), post.clone());
                Ok(post)
            })
        }

        fn get_pending(&self, post_id: &str) -> BoxFuture<'_, DomainResult<Option<Post>>> {
            let post_id = post_id.to_string();
            Box::pin(async move { Ok(self.pending.read().unwrap().get(&post_id).cloned()) })
        }

        fn update_pending(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>> {
            let post = post.clone();
            Box::pin(async move {
                let mut guard = self.pending.write().unwrap();
                if !guard.contains_key(&post.id) {
                    return Err(DomainError::NotFound);
                }
                guard.insert(post.id.clone(), post.clone());
                Ok(post)
            })
        }

        fn delete_pending(&self, post_id: &str) -> BoxFuture<'_, DomainResult<()>> {
            let post_id = post_id.to_string();
            Box::pin(async move {
                self.pending.write().unwrap().remove(&post_id);
                Ok(())
            })
        }

        fn list_pending(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
            Box::pin(async move {
                let mut posts: Vec<Post> = self.pending.read().unwrap().values().cloned().collect();
                posts.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
                posts.truncate(limit);
                Ok(posts)
            })
        }

        fn list_pending_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
            let author_id = author_id.to_string();
            Box::pin(async move {
                Ok(self
                    .pending
                    .read()
                    .unwrap()
                    .values()
                    .filter(|post| post.author_id == author_id)
                    .cloned()
                    .collect())
            })
        }

        fn insert_live(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>> {
            let post = post.clone();
            Box::pin(async move {
                let mut guard = self.live.write().unwrap();
                if guard.contains_key(&post.id) {
                    return Err(DomainError::Conflict);
                }
                guard.insert(post.id.clone(), post.clone());
                Ok(post)
            })
        }

        fn get_live(&self, post_id: &str) -> BoxFuture<'_, DomainResult<Option<Post>>> {
            let post_id = post_id.to_string();
            Box::pin(async move { Ok(self.live.read().unwrap().get(&post_id).cloned()) })
        }

        fn delete_live(&self, post_id: &str) -> BoxFuture<'_, DomainResult<()>> {
            let post_id = post_id.to_string();
            Box::pin(async move {
                self.live.write().unwrap().remove(&post_id);
                Ok(())
            })
        }

        fn list_live(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
            Box::pin(async move {
                let mut posts: Vec<Post> = self.live.read().unwrap().values().cloned().collect();
                posts.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
                posts.truncate(limit);
                Ok(posts)
            })
        }

        fn list_live_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
            let author_id = author_id.to_string();
            Box::pin(async move {
                Ok(self
                    .live
                    .read()
                    .unwrap()
                    .values()
                    .filter(|post| post.author_id == author_id)
                    .cloned()
                    .collect())
            })
        }
    }

    fn service() -> (Arc<MockPostStore>, PostService) {
        let store = Arc::new(MockPostStore::default());
        let pipeline = ModerationPipeline::new(None, None);
        (store.clone(), PostService::new(store, pipeline))
    }

    fn author() -> ActorIdentity {
        ActorIdentity::new("user-1", "mira")
    }

    fn admin() -> ActorIdentity {
        ActorIdentity::new("admin-1", "root")
    }

    fn pending_post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            author_id: "user-1".to_string(),
            author_name: "mira".to_string(),
            body: "a long ambiguous ramble about work".to_string(),
            image_url: None,
            video_url: None,
            status: PostStatus::Pending,
            verdict: Some(Verdict::flagged(
                0.5,
                "needs_review",
                vec!["no moderation stage reached a verdict".to_string()],
                VerdictSource::ErrorDefault,
            )),
            rejection_reason: None,
            created_at_ms: now_ms(),
            updated_at_ms: now_ms(),
        }
    }

    #[tokio::test]
    async fn clean_post_goes_straight_to_the_feed() {
        let (store, service) = service();
        let post = service
            .submit(
                &author(),
                NewPost {
                    body: "Grateful for a calm morning walk".to_string(),
                    image_url: None,
                    video_url: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(post.status, PostStatus::Approved);
        assert!(store.live.read().unwrap().contains_key(&post.id));
        assert!(store.pending.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn spam_post_is_stored_rejected_with_a_reason() {
        let (store, service) = service();
        let post = service
            .submit(
                &author(),
                NewPost {
                    body: "Click here to make money fast".to_string(),
                    image_url: None,
                    video_url: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(post.status, PostStatus::Rejected);
        assert_eq!(post.rejection_reason.as_deref(), Some("spam"));
        assert!(store.live.read().unwrap().is_empty());
        assert!(store.pending.read().unwrap().contains_key(&post.id));
    }

    #[tokio::test]
    async fn ambiguous_post_waits_in_the_review_queue() {
        let (store, service) = service();
        let post = service
            .submit(
                &author(),
                NewPost {
                    body: "a long ambiguous ramble about work".to_string(),
                    image_url: None,
                    video_url: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(post.status, PostStatus::Pending);
        assert!(store.pending.read().unwrap().contains_key(&post.id));
        let queue = service.review_queue(10).await.unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn empty_text_is_a_validation_error() {
        let (_, service) = service();
        let err = service
            .submit(
                &author(),
                NewPost {
                    body: "   ".to_string(),
                    image_url: None,
                    video_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn approve_moves_the_post_out_of_the_queue() {
        let (store, service) = service();
        store.seed_pending(pending_post("post-1"));

        let outcome = service.approve(&admin(), "post-1").await.unwrap();

        assert!(outcome.was_applied());
        assert_eq!(outcome.post().status, PostStatus::Approved);
        assert!(store.pending.read().unwrap().is_empty());
        assert!(store.live.read().unwrap().contains_key("post-1"));
    }

    #[tokio::test]
    async fn approving_twice_reports_already_in_target() {
        let (store, service) = service();
        store.seed_pending(pending_post("post-1"));

        service.approve(&admin(), "post-1").await.unwrap();
        let second = service.approve(&admin(), "post-1").await.unwrap();

        assert!(matches!(second, TransitionOutcome::AlreadyInTarget(_)));
        assert_eq!(second.post().status, PostStatus::Approved);
    }

    #[tokio::test]
    async fn approve_recovers_from_a_partially_applied_move() {
        let (store, service) = service();
        let post = pending_post("post-1");
        store.seed_pending(post.clone());
        let mut live = post;
        live.status = PostStatus::Approved;
        store.live.write().unwrap().insert("post-1".to_string(), live);

        let outcome = service.approve(&admin(), "post-1").await.unwrap();

        assert!(outcome.was_applied());
        assert!(store.pending.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn approve_of_unknown_post_is_not_found() {
        let (_, service) = service();
        let err = service.approve(&admin(), "missing").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[tokio::test]
    async fn reject_updates_the_queued_post_in_place() {
        let (store, service) = service();
        store.seed_pending(pending_post("post-1"));

        let outcome = service
            .reject(&admin(), "post-1", "off-topic promotion")
            .await
            .unwrap();

        assert!(outcome.was_applied());
        assert_eq!(outcome.post().status, PostStatus::Rejected);
        assert_eq!(
            outcome.post().rejection_reason.as_deref(),
            Some("off-topic promotion")
        );
        assert!(store.pending.read().unwrap().contains_key("post-1"));
        assert!(store.live.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejecting_twice_overwrites_the_reason() {
        let (store, service) = service();
        store.seed_pending(pending_post("post-1"));

        service
            .reject(&admin(), "post-1", "first reason")
            .await
            .unwrap();
        let second = service
            .reject(&admin(), "post-1", "second reason")
            .await
            .unwrap();

        assert!(matches!(second, TransitionOutcome::AlreadyInTarget(_)));
        assert_eq!(second.post().rejection_reason.as_deref(), Some("second reason"));
        let stored = store.pending.read().unwrap().get("post-1").cloned().unwrap();
        assert_eq!(stored.rejection_reason.as_deref(), Some("second reason"));
    }

    #[tokio::test]
    async fn a_rejected_post_can_still_be_approved() {
        let (store, service) = service();
        store.seed_pending(pending_post("post-1"));

        service
            .reject(&admin(), "post-1", "looked like spam")
            .await
            .unwrap();
        let outcome = service.approve(&admin(), "post-1").await.unwrap();

        assert!(outcome.was_applied());
        assert_eq!(outcome.post().status, PostStatus::Approved);
        assert_eq!(outcome.post().rejection_reason, None);
        let live = store.live.read().unwrap().get("post-1").cloned().unwrap();
        assert_eq!(live.status, PostStatus::Approved);
        assert_eq!(live.rejection_reason, None);
        assert!(store.pending.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejecting_a_live_post_is_a_conflict() {
        let (store, service) = service();
        let mut live = pending_post("post-1");
        live.status = PostStatus::Approved;
        store.live.write().unwrap().insert("post-1".to_string(), live);

        let err = service
            .reject(&admin(), "post-1", "too late")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict));
    }

    #[tokio::test]
    async fn author_sees_their_queued_and_live_posts_together() {
        let (store, service) = service();
        store.seed_pending(pending_post("post-1"));
        let mut live = pending_post("post-2");
        live.status = PostStatus::Approved;
        store.live.write().unwrap().insert("post-2".to_string(), live);

        let posts = service.posts_by_author("user-1").await.unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn only_the_author_or_an_admin_can_delete() {
        let (store, service) = service();
        store.seed_pending(pending_post("post-1"));

        let stranger = ActorIdentity::new("user-9", "sam");
        let err = service.delete(&stranger, false, "post-1").await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        service.delete(&stranger, true, "post-1").await.unwrap();
        assert!(store.pending.read().unwrap().is_empty());
    }
}
