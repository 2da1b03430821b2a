use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::ports::journals::JournalRepository;
use crate::util::{now_ms, uuid_v7_without_dashes};
use crate::DomainResult;

pub const MAX_JOURNAL_CHARS: usize = 20_000;

/// Private to its author. Cross-author access reads as absence, never
/// as a permissions hint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub author_id: String,
    pub title: Option<String>,
    pub body: String,
    pub mood: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct JournalDraft {
    pub title: Option<String>,
    pub body: String,
    pub mood: Option<String>,
}

#[derive(Clone)]
pub struct JournalService {
    repo: Arc<dyn JournalRepository>,
}

impl JournalService {
    pub fn new(repo: Arc<dyn JournalRepository>) -> Self {
        Self { repo }
    }

    fn validate(draft: &JournalDraft) -> DomainResult<()> {
        if draft.body.trim().is_empty() {
            return Err(DomainError::Validation("journal body is required".into()));
        }
        if draft.body.chars().count() > MAX_JOURNAL_CHARS {
            return Err(DomainError::Validation(format!(
                "journal body exceeds {MAX_JOURNAL_CHARS} characters"
            )));
        }
        Ok(())
    }

    pub async fn create(
        &self,
        actor: &ActorIdentity,
        draft: JournalDraft,
    ) -> DomainResult<JournalEntry> {
        Self::validate(&draft)?;
        let now = now_ms();
        let entry = JournalEntry {
            id: uuid_v7_without_dashes(),
            author_id: actor.user_id.clone(),
            title: draft.title,
            body: draft.body,
            mood: draft.mood,
            created_at_ms: now,
            updated_at_ms: now,
        };
        self.repo.insert(&entry).await
    }

    pub async fn list(&self, actor: &ActorIdentity) -> DomainResult<Vec<JournalEntry>> {
        let mut entries = self.repo.list_by_author(&actor.user_id).await?;
        entries.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        Ok(entries)
    }

    async fn owned(&self, actor: &ActorIdentity, entry_id: &str) -> DomainResult<JournalEntry> {
        let entry = self
            .repo
            .get(entry_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        if entry.author_id != actor.user_id {
            return Err(DomainError::NotFound);
        }
        Ok(entry)
    }

    pub async fn update(
        &self,
        actor: &ActorIdentity,
        entry_id: &str,
        draft: JournalDraft,
    ) -> DomainResult<JournalEntry> {
        Self::validate(&draft)?;
        let mut entry = self.owned(actor, entry_id).await?;
        entry.title = draft.title;
        entry.body = draft.body;
        entry.mood = draft.mood;
        entry.updated_at_ms = now_ms();
        self.repo.update(&entry).await
    }

    pub async fn delete(&self, actor: &ActorIdentity, entry_id: &str) -> DomainResult<()> {
        self.owned(actor, entry_id).await?;
        self.repo.delete(entry_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::BoxFuture;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    struct MockJournalRepo {
        entries: RwLock<HashMap<String, JournalEntry>>,
    }

    impl JournalRepository for MockJournalRepo {
        fn insert(&self, entry: &JournalEntry) -> BoxFuture<'_, DomainResult<JournalEntry>> {
            let entry = entry.clone();
            Box::pin(async move {
                self.entries
                    .write()
                    .unwrap()
                    .insert(entry.id.clone(), entry.clone());
                Ok(entry)
            })
        }

        fn get(&self, entry_id: &str) -> BoxFuture<'_, DomainResult<Option<JournalEntry>>> {
            let entry_id = entry_id.to_string();
            Box::pin(async move { Ok(self.entries.read().unwrap().get(&entry_id).cloned()) })
        }

        fn update(&self, entry: &JournalEntry) -> BoxFuture<'_, DomainResult<JournalEntry>> {
            let entry = entry.clone();
            Box::pin(async move {
                let mut guard = self.entries.write().unwrap();
                if !guard.contains_key(&entry.id) {
                    return Err(DomainError::NotFound);
                }
                guard.insert(entry.id.clone(), entry.clone());
                Ok(entry)
            })
        }

        fn delete(&self, entry_id: &str) -> BoxFuture<'_, DomainResult<()>> {
            let entry_id = entry_id.to_string();
            Box::pin(async move {
                self.entries.write().unwrap().remove(&entry_id);
                Ok(())
            })
        }

        fn list_by_author(
            &self,
            author_id: &str,
        ) -> BoxFuture<'_, DomainResult<Vec<JournalEntry>>> {
            let author_id = author_id.to_string();
            Box::pin(async move {
                Ok(self
                    .entries
                    .read()
                    .unwrap()
                    .values()
                    .filter(|entry| entry.author_id == author_id)
                    .cloned()
                    .collect())
            })
        }
    }

    fn service() -> JournalService {
        JournalService::new(Arc::new(MockJournalRepo::default()))
    }

    fn draft(body: &str) -> JournalDraft {
        JournalDraft {
            title: None,
            body: body.to_string(),
            mood: Some("calm".to_string()),
        }
    }

    #[tokio::test]
    async fn entries_are_scoped_to_their_author() {
        let service = service();
        let mira = ActorIdentity::new("user-1", "mira");
        let sam = ActorIdentity::new("user-2", "sam");

        let entry = service.create(&mira, draft("slept well")).await.unwrap();

        assert_eq!(service.list(&mira).await.unwrap().len(), 1);
        assert!(service.list(&sam).await.unwrap().is_empty());

        let err = service
            .update(&sam, &entry.id, draft("rewritten"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));

        let err = service.delete(&sam, &entry.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[tokio::test]
    async fn update_replaces_the_draft_fields() {
        let service = service();
        let mira = ActorIdentity::new("user-1", "mira");
        let entry = service.create(&mira, draft("slept well")).await.unwrap();

        let updated = service
            .update(
                &mira,
                &entry.id,
                JournalDraft {
                    title: Some("morning".to_string()),
                    body: "slept badly".to_string(),
                    mood: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.body, "slept badly");
        assert_eq!(updated.title.as_deref(), Some("morning"));
        assert_eq!(updated.mood, None);
    }

    #[tokio::test]
    async fn empty_body_is_a_validation_error() {
        let service = service();
        let mira = ActorIdentity::new("user-1", "mira");
        let err = service.create(&mira, draft("  ")).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
