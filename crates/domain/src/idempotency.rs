use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::ports::idempotency::{
    IdempotencyError, IdempotencyKey, IdempotencyRecord, IdempotencyResponse, IdempotencyState,
    IdempotencyStore, PutOutcome,
};

#[derive(Clone, Debug)]
pub struct IdempotencyConfig {
    pub in_progress_ttl: Duration,
    pub completed_ttl: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            in_progress_ttl: Duration::from_secs(60),
            completed_ttl: Duration::from_secs(60 * 60 * 24),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BeginOutcome {
    Started,
    InProgress,
    Replay(IdempotencyResponse),
}

/// Begin/complete protocol around a mutating request. A replayed request
/// gets the recorded response instead of a second execution.
#[derive(Clone)]
pub struct IdempotencyService {
    store: Arc<dyn IdempotencyStore>,
    config: IdempotencyConfig,
}

impl IdempotencyService {
    pub fn new(store: Arc<dyn IdempotencyStore>, config: IdempotencyConfig) -> Self {
        Self { store, config }
    }

    pub async fn begin(&self, key: &IdempotencyKey) -> Result<BeginOutcome, IdempotencyError> {
        let record = IdempotencyRecord::in_progress();
        match self
            .store
            .put_if_absent(key, &record, self.config.in_progress_ttl)
            .await?
        {
            PutOutcome::Stored => Ok(BeginOutcome::Started),
            PutOutcome::Existing(existing) => match existing.state {
                IdempotencyState::InProgress => Ok(BeginOutcome::InProgress),
                IdempotencyState::Completed => {
                    let response = existing.response.ok_or_else(|| {
                        IdempotencyError::Store("completed record missing response".into())
                    })?;
                    Ok(BeginOutcome::Replay(response))
                }
            },
        }
    }

    pub async fn complete(
        &self,
        key: &IdempotencyKey,
        response: IdempotencyResponse,
    ) -> Result<(), IdempotencyError> {
        let record = IdempotencyRecord::completed(response);
        self.store
            .update(key, &record, self.config.completed_ttl)
            .await
    }
}

pub fn submission_key(author_id: &str, request_id: &str) -> IdempotencyKey {
    IdempotencyKey::new("post_submission", author_id, request_id)
}

#[derive(Clone, Debug)]
pub struct InMemoryIdempotencyStore {
    prefix: String,
    inner: Arc<Mutex<HashMap<String, MemoryEntry>>>,
}

#[derive(Clone, Debug)]
struct MemoryEntry {
    record: IdempotencyRecord,
    expires_at: Option<Instant>,
}

impl InMemoryIdempotencyStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn cache_key(&self, key: &IdempotencyKey) -> String {
        key.cache_key(&self.prefix)
    }

    fn is_expired(expires_at: Option<Instant>) -> bool {
        match expires_at {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, MemoryEntry>>, IdempotencyError> {
        self.inner
            .lock()
            .map_err(|_| IdempotencyError::Store("idempotency store lock poisoned".into()))
    }
}

impl IdempotencyStore for InMemoryIdempotencyStore {
    fn get(
        &self,
        key: &IdempotencyKey,
    ) -> crate::ports::BoxFuture<'_, Result<Option<IdempotencyRecord>, IdempotencyError>> {
        let cache_key = self.cache_key(key);
        Box::pin(async move {
            let mut guard = self.lock()?;
            if let Some(entry) = guard.get(&cache_key) {
                if Self::is_expired(entry.expires_at) {
                    guard.remove(&cache_key);
                    return Ok(None);
                }
                return Ok(Some(entry.record.clone()));
            }
            Ok(None)
        })
    }

    fn put_if_absent(
        &self,
        key: &IdempotencyKey,
        record: &IdempotencyRecord,
        ttl: Duration,
    ) -> crate::ports::BoxFuture<'_, Result<PutOutcome, IdempotencyError>> {
        let cache_key = self.cache_key(key);
        let record = record.clone();
        Box::pin(async move {
            let mut guard = self.lock()?;
            if let Some(entry) = guard.get(&cache_key) {
                if !Self::is_expired(entry.expires_at) {
                    return Ok(PutOutcome::Existing(entry.record.clone()));
                }
            }
            guard.insert(
                cache_key,
                MemoryEntry {
                    record,
                    expires_at: Instant::now().checked_add(ttl),
                },
            );
            Ok(PutOutcome::Stored)
        })
    }

    fn update(
        &self,
        key: &IdempotencyKey,
        record: &IdempotencyRecord,
        ttl: Duration,
    ) -> crate::ports::BoxFuture<'_, Result<(), IdempotencyError>> {
        let cache_key = self.cache_key(key);
        let record = record.clone();
        Box::pin(async move {
            let mut guard = self.lock()?;
            guard.insert(
                cache_key,
                MemoryEntry {
                    record,
                    expires_at: Instant::now().checked_add(ttl),
                },
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> IdempotencyService {
        IdempotencyService::new(
            Arc::new(InMemoryIdempotencyStore::new("test:idemp")),
            IdempotencyConfig::default(),
        )
    }

    #[tokio::test]
    async fn first_begin_starts_the_request() {
        let service = service();
        let key = submission_key("user-1", "req-1");
        assert_eq!(service.begin(&key).await.unwrap(), BeginOutcome::Started);
    }

    #[tokio::test]
    async fn concurrent_begin_reports_in_progress() {
        let service = service();
        let key = submission_key("user-1", "req-1");
        service.begin(&key).await.unwrap();
        assert_eq!(service.begin(&key).await.unwrap(), BeginOutcome::InProgress);
    }

    #[tokio::test]
    async fn completed_request_replays_the_stored_response() {
        let service = service();
        let key = submission_key("user-1", "req-1");
        service.begin(&key).await.unwrap();
        service
            .complete(
                &key,
                IdempotencyResponse {
                    status_code: 201,
                    body: json!({"id": "post-1"}),
                },
            )
            .await
            .unwrap();

        match service.begin(&key).await.unwrap() {
            BeginOutcome::Replay(response) => {
                assert_eq!(response.status_code, 201);
                assert_eq!(response.body["id"], "post-1");
            }
            other => panic!("expected Replay, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn different_request_ids_do_not_collide() {
        let service = service();
        service
            .begin(&submission_key("user-1", "req-1"))
            .await
            .unwrap();
        assert_eq!(
            service
                .begin(&submission_key("user-1", "req-2"))
                .await
                .unwrap(),
            BeginOutcome::Started
        );
    }

    #[tokio::test]
    async fn expired_entries_are_reclaimed() {
        let store = InMemoryIdempotencyStore::new("test:idemp");
        let service = IdempotencyService::new(
            Arc::new(store),
            IdempotencyConfig {
                in_progress_ttl: Duration::from_millis(0),
                completed_ttl: Duration::from_secs(60),
            },
        );
        let key = submission_key("user-1", "req-1");
        service.begin(&key).await.unwrap();
        assert_eq!(service.begin(&key).await.unwrap(), BeginOutcome::Started);
    }
}
