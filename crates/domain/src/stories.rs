use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::ports::stories::StoryRepository;
use crate::util::{now_ms, uuid_v7_without_dashes};
use crate::DomainResult;

pub const MAX_STORY_CHARS: usize = 50_000;

/// Attributed to its author when one signed it, otherwise to the
/// community at large.
pub const COMMUNITY_AUTHOR: &str = "Mindgrove Community";

/// Long-form community story, readable by everyone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub author_id: Option<String>,
    pub author_name: String,
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub image_url: Option<String>,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StoryDraft {
    pub title: String,
    pub description: Option<String>,
    pub body: String,
    pub image_url: Option<String>,
}

#[derive(Clone)]
pub struct StoryService {
    repo: Arc<dyn StoryRepository>,
}

impl StoryService {
    pub fn new(repo: Arc<dyn StoryRepository>) -> Self {
        Self { repo }
    }

    fn validate(draft: &StoryDraft) -> DomainResult<()> {
        if draft.title.trim().is_empty() {
            return Err(DomainError::Validation("story title is required".into()));
        }
        if draft.body.trim().is_empty() {
            return Err(DomainError::Validation("story body is required".into()));
        }
        if draft.body.chars().count() > MAX_STORY_CHARS {
            return Err(DomainError::Validation(format!(
                "story body exceeds {MAX_STORY_CHARS} characters"
            )));
        }
        Ok(())
    }

    pub async fn create(&self, actor: &ActorIdentity, draft: StoryDraft) -> DomainResult<Story> {
        Self::validate(&draft)?;
        let author_name = if actor.username.trim().is_empty() {
            COMMUNITY_AUTHOR.to_string()
        } else {
            actor.username.clone()
        };
        let story = Story {
            id: uuid_v7_without_dashes(),
            author_id: Some(actor.user_id.clone()),
            author_name,
            title: draft.title,
            description: draft.description,
            body: draft.body,
            image_url: draft.image_url,
            created_at_ms: now_ms(),
        };
        self.repo.insert(&story).await
    }

    /// Newest first.
    pub async fn list(&self) -> DomainResult<Vec<Story>> {
        let mut stories = self.repo.list().await?;
        stories.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        Ok(stories)
    }

    pub async fn get(&self, story_id: &str) -> DomainResult<Story> {
        self.repo
            .get(story_id)
            .await?
            .ok_or(DomainError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::BoxFuture;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    struct MockStoryRepo {
        stories: RwLock<HashMap<String, Story>>,
    }

    impl StoryRepository for MockStoryRepo {
        fn insert(&self, story: &Story) -> BoxFuture<'_, DomainResult<Story>> {
            let story = story.clone();
            Box::pin(async move {
                self.stories
                    .write()
                    .unwrap()
                    .insert(story.id.clone(), story.clone());
                Ok(story)
            })
        }

        fn get(&self, story_id: &str) -> BoxFuture<'_, DomainResult<Option<Story>>> {
            let story_id = story_id.to_string();
            Box::pin(async move { Ok(self.stories.read().unwrap().get(&story_id).cloned()) })
        }

        fn list(&self) -> BoxFuture<'_, DomainResult<Vec<Story>>> {
            Box::pin(async move { Ok(self.stories.read().unwrap().values().cloned().collect()) })
        }
    }

    fn service() -> StoryService {
        StoryService::new(Arc::new(MockStoryRepo::default()))
    }

    fn draft(title: &str, body: &str) -> StoryDraft {
        StoryDraft {
            title: title.to_string(),
            description: Some("a short teaser".to_string()),
            body: body.to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn created_story_is_attributed_and_readable() {
        let service = service();
        let mira = ActorIdentity::new("user-1", "mira");

        let story = service
            .create(&mira, draft("finding calm", "it took a while"))
            .await
            .unwrap();

        assert_eq!(story.author_id.as_deref(), Some("user-1"));
        assert_eq!(story.author_name, "mira");

        let fetched = service.get(&story.id).await.unwrap();
        assert_eq!(fetched, story);
    }

    #[tokio::test]
    async fn blank_author_name_falls_back_to_the_community() {
        let service = service();
        let anon = ActorIdentity::new("user-2", "  ");

        let story = service
            .create(&anon, draft("quiet mornings", "tea helps"))
            .await
            .unwrap();

        assert_eq!(story.author_name, COMMUNITY_AUTHOR);
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let service = service();
        let mira = ActorIdentity::new("user-1", "mira");

        let first = service
            .create(&mira, draft("one", "first story"))
            .await
            .unwrap();
        let second = service
            .create(&mira, draft("two", "second story"))
            .await
            .unwrap();

        let listed = service.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at_ms >= listed[1].created_at_ms);
        assert!(listed.iter().any(|s| s.id == first.id));
        assert!(listed.iter().any(|s| s.id == second.id));
    }

    #[tokio::test]
    async fn missing_story_is_not_found() {
        let service = service();
        let err = service.get("nope").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[tokio::test]
    async fn untitled_story_is_a_validation_error() {
        let service = service();
        let mira = ActorIdentity::new("user-1", "mira");
        let err = service
            .create(&mira, draft("  ", "body text"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
