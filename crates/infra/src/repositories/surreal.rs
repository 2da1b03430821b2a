use std::sync::Arc;

use mindgrove_domain::auth::Role;
use mindgrove_domain::error::DomainError;
use mindgrove_domain::moderation::Verdict;
use mindgrove_domain::ports::posts::PostStore;
use mindgrove_domain::ports::users::UserRepository;
use mindgrove_domain::ports::BoxFuture;
use mindgrove_domain::posts::{Post, PostStatus};
use mindgrove_domain::users::{SellerStatus, User};
use mindgrove_domain::DomainResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::db::DbConfig;

const PENDING_TABLE: &str = "pending_posts";
const LIVE_TABLE: &str = "posts";

const POST_FIELDS: &str = "post_id, author_id, author_name, body, image_url, video_url, \
     status, verdict, rejection_reason, <string>created_at AS created_at, \
     <string>updated_at AS updated_at";

fn parse_rfc3339(value: &str) -> DomainResult<i64> {
    let dt = OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|err| DomainError::Validation(format!("invalid timestamp: {err}")))?;
    Ok((dt.unix_timestamp_nanos() / 1_000_000) as i64)
}

fn to_rfc3339(epoch_ms: i64) -> DomainResult<String> {
    let dt = OffsetDateTime::from_unix_timestamp_nanos(epoch_ms as i128 * 1_000_000)
        .map_err(|err| DomainError::Validation(format!("invalid ms timestamp: {err}")))?;
    Ok(dt
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string()))
}

fn map_surreal_error(err: surrealdb::Error) -> DomainError {
    let error_message = err.to_string().to_lowercase();
    if error_message.contains("already exists")
        || error_message.contains("duplicate")
        || error_message.contains("unique")
        || error_message.contains("conflict")
    {
        return DomainError::Conflict;
    }
    DomainError::Validation(format!("surreal query failed: {error_message}"))
}

async fn connect(db_config: &DbConfig) -> anyhow::Result<Arc<Surreal<Client>>> {
    let db = Surreal::<Client>::init();
    db.connect::<Ws>(&db_config.endpoint).await?;
    db.signin(Root {
        username: db_config.username.as_str(),
        password: db_config.password.as_str(),
    })
    .await?;
    db.use_ns(&db_config.namespace)
        .use_db(&db_config.database)
        .await?;
    Ok(Arc::new(db))
}

#[derive(Debug, Serialize, Deserialize)]
struct SurrealPostRow {
    post_id: String,
    author_id: String,
    author_name: String,
    body: String,
    image_url: Option<String>,
    video_url: Option<String>,
    status: String,
    verdict: Option<Value>,
    rejection_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Clone)]
pub struct SurrealPostStore {
    client: Arc<Surreal<Client>>,
}

impl SurrealPostStore {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    pub async fn new(db_config: &DbConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: connect(db_config).await?,
        })
    }

    fn decode_rows(rows: Vec<Value>) -> DomainResult<Vec<Post>> {
        rows.into_iter()
            .map(|row| {
                let row = serde_json::from_value::<SurrealPostRow>(row)
                    .map_err(|err| DomainError::Validation(format!("invalid post row: {err}")))?;
                let verdict = row
                    .verdict
                    .map(serde_json::from_value::<Verdict>)
                    .transpose()
                    .map_err(|err| {
                        DomainError::Validation(format!("invalid verdict payload: {err}"))
                    })?;
                Ok(Post {
                    id: row.post_id,
                    author_id: row.author_id,
                    author_name: row.author_name,
                    body: row.body,
                    image_url: row.image_url,
                    video_url: row.video_url,
                    status: PostStatus::parse(&row.status)?,
                    verdict,
                    rejection_reason: row.rejection_reason,
                    created_at_ms: parse_rfc3339(&row.created_at)?,
                    updated_at_ms: parse_rfc3339(&row.updated_at)?,
                })
            })
            .collect()
    }

    async fn insert_into(&self, table: &'static str, post: &Post) -> DomainResult<Post> {
        let verdict = post
            .verdict
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|err| DomainError::Validation(format!("invalid verdict payload: {err}")))?;
        let created_at = to_rfc3339(post.created_at_ms)?;
        let updated_at = to_rfc3339(post.updated_at_ms)?;
        let post = post.clone();

        self.client
            .query(format!(
                "CREATE type::thing(\"{table}\", $post_id) SET \
                     post_id = $post_id, \
                     author_id = $author_id, \
                     author_name = $author_name, \
                     body = $body, \
                     image_url = $image_url, \
                     video_url = $video_url, \
                     status = $status, \
                     verdict = $verdict, \
                     rejection_reason = $rejection_reason, \
                     created_at = <datetime>$created_at, \
                     updated_at = <datetime>$updated_at;"
            ))
            .bind(("post_id", post.id.clone()))
            .bind(("author_id", post.author_id.clone()))
            .bind(("author_name", post.author_name.clone()))
            .bind(("body", post.body.clone()))
            .bind(("image_url", post.image_url.clone()))
            .bind(("video_url", post.video_url.clone()))
            .bind(("status", post.status.as_str().to_string()))
            .bind(("verdict", verdict))
            .bind(("rejection_reason", post.rejection_reason.clone()))
            .bind(("created_at", created_at))
            .bind(("updated_at", updated_at))
            .await
            .map_err(map_surreal_error)?
            .check()
            .map_err(map_surreal_error)?;
        Ok(post)
    }

    async fn get_from(&self, table: &'static str, post_id: String) -> DomainResult<Option<Post>> {
        let mut response = self
            .client
            .query(format!(
                "SELECT {POST_FIELDS} FROM {table} WHERE post_id = $post_id LIMIT 1"
            ))
            .bind(("post_id", post_id))
            .await
            .map_err(map_surreal_error)?;
        let rows: Vec<Value> = response
            .take(0)
            .map_err(|err| DomainError::Validation(format!("invalid query result: {err}")))?;
        let mut posts = Self::decode_rows(rows)?;
        Ok(posts.pop())
    }

    async fn delete_from(&self, table: &'static str, post_id: String) -> DomainResult<()> {
        self.client
            .query(format!("DELETE type::thing(\"{table}\", $post_id);"))
            .bind(("post_id", post_id))
            .await
            .map_err(map_surreal_error)?;
        Ok(())
    }

    async fn list_from(&self, table: &'static str, limit: usize) -> DomainResult<Vec<Post>> {
        let mut response = self
            .client
            .query(format!(
                "SELECT {POST_FIELDS} FROM {table} ORDER BY created_at DESC LIMIT $limit"
            ))
            .bind(("limit", limit as i64))
            .await
            .map_err(map_surreal_error)?;
        let rows: Vec<Value> = response
            .take(0)
            .map_err(|err| DomainError::Validation(format!("invalid query result: {err}")))?;
        Self::decode_rows(rows)
    }

    async fn list_from_by_author(
        &self,
        table: &'static str,
        author_id: String,
    ) -> DomainResult<Vec<Post>> {
        let mut response = self
            .client
            .query(format!(
                "SELECT {POST_FIELDS} FROM {table} WHERE author_id = $author_id \
                 ORDER BY created_at DESC"
            ))
            .bind(("author_id", author_id))
            .await
            .map_err(map_surreal_error)?;
        let rows: Vec<Value> = response
            .take(0)
            .map_err(|err| DomainError::Validation(format!("invalid query result: {err}")))?;
        Self::decode_rows(rows)
    }
}

impl PostStore for SurrealPostStore {
    fn insert_pending(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>> {
        let post = post.clone();
        Box::pin(async move { self.insert_into(PENDING_TABLE, &post).await })
    }

    fn get_pending(&self, post_id: &str) -> BoxFuture<'_, DomainResult<Option<Post>>> {
        let post_id = post_id.to_string();
        Box::pin(async move { self.get_from(PENDING_TABLE, post_id).await })
    }

    fn update_pending(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>> {
        let post = post.clone();
        Box::pin(async move {
            if self
                .get_from(PENDING_TABLE, post.id.clone())
                .await?
                .is_none()
            {
                return Err(DomainError::NotFound);
            }
            let updated_at = to_rfc3339(post.updated_at_ms)?;
            self.client
                .query(
                    "UPDATE type::thing(\"pending_posts\", $post_id) SET \
                         status = $status, \
                         rejection_reason = $rejection_reason, \
                         updated_at = <datetime>$updated_at;",
                )
                .bind(("post_id", post.id.clone()))
                .bind(("status", post.status.as_str().to_string()))
                .bind(("rejection_reason", post.rejection_reason.clone()))
                .bind(("updated_at", updated_at))
                .await
                .map_err(map_surreal_error)?;
            Ok(post)
        })
    }

    fn delete_pending(&self, post_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let post_id = post_id.to_string();
        Box::pin(async move { self.delete_from(PENDING_TABLE, post_id).await })
    }

    fn list_pending(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
        Box::pin(async move { self.list_from(PENDING_TABLE, limit).await })
    }

    fn list_pending_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
        let author_id = author_id.to_string();
        Box::pin(async move { self.list_from_by_author(PENDING_TABLE, author_id).await })
    }

    fn insert_live(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>> {
        let post = post.clone();
        Box::pin(async move { self.insert_into(LIVE_TABLE, &post).await })
    }

    fn get_live(&self, post_id: &str) -> BoxFuture<'_, DomainResult<Option<Post>>> {
        let post_id = post_id.to_string();
        Box::pin(async move { self.get_from(LIVE_TABLE, post_id).await })
    }

    fn delete_live(&self, post_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let post_id = post_id.to_string();
        Box::pin(async move { self.delete_from(LIVE_TABLE, post_id).await })
    }

    fn list_live(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
        Box::pin(async move { self.list_from(LIVE_TABLE, limit).await })
    }

    fn list_live_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
        let author_id = author_id.to_string();
        Box::pin(async move { self.list_from_by_author(LIVE_TABLE, author_id).await })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SurrealUserRow {
    user_id: String,
    email: String,
    full_name: String,
    role: String,
    seller_status: String,
    profile_pic: Option<String>,
    bio: Option<String>,
    is_verified: bool,
    created_at: String,
}

const USER_FIELDS: &str = "user_id, email, full_name, role, seller_status, profile_pic, bio, \
     is_verified, <string>created_at AS created_at";

#[derive(Clone)]
pub struct SurrealUserRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealUserRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    pub async fn new(db_config: &DbConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: connect(db_config).await?,
        })
    }

    fn decode_rows(rows: Vec<Value>) -> DomainResult<Vec<User>> {
        rows.into_iter()
            .map(|row| {
                let row = serde_json::from_value::<SurrealUserRow>(row)
                    .map_err(|err| DomainError::Validation(format!("invalid user row: {err}")))?;
                Ok(User {
                    id: row.user_id,
                    email: row.email,
                    full_name: row.full_name,
                    role: Role::parse(&row.role).ok_or_else(|| {
                        DomainError::Validation(format!("invalid role '{}'", row.role))
                    })?,
                    seller_status: SellerStatus::parse(&row.seller_status)?,
                    profile_pic: row.profile_pic,
                    bio: row.bio,
                    is_verified: row.is_verified,
                    created_at_ms: parse_rfc3339(&row.created_at)?,
                })
            })
            .collect()
    }
}

impl UserRepository for SurrealUserRepository {
    fn upsert(&self, user: &User) -> BoxFuture<'_, DomainResult<User>> {
        let user = user.clone();
        Box::pin(async move {
            let created_at = to_rfc3339(user.created_at_ms)?;
            self.client
                .query(
                    "UPSERT type::thing(\"users\", $user_id) SET \
                         user_id = $user_id, \
                         email = $email, \
                         full_name = $full_name, \
                         role = $role, \
                         seller_status = $seller_status, \
                         profile_pic = $profile_pic, \
                         bio = $bio, \
                         is_verified = $is_verified, \
                         created_at = <datetime>$created_at;",
                )
                .bind(("user_id", user.id.clone()))
                .bind(("email", user.email.clone()))
                .bind(("full_name", user.full_name.clone()))
                .bind(("role", user.role.as_str().to_string()))
                .bind(("seller_status", user.seller_status.as_str().to_string()))
                .bind(("profile_pic", user.profile_pic.clone()))
                .bind(("bio", user.bio.clone()))
                .bind(("is_verified", user.is_verified))
                .bind(("created_at", created_at))
                .await
                .map_err(map_surreal_error)?;
            Ok(user)
        })
    }

    fn get(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<User>>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let mut response = self
                .client
                .query(format!(
                    "SELECT {USER_FIELDS} FROM users WHERE user_id = $user_id LIMIT 1"
                ))
                .bind(("user_id", user_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response
                .take(0)
                .map_err(|err| DomainError::Validation(format!("invalid query result: {err}")))?;
            let mut users = Self::decode_rows(rows)?;
            Ok(users.pop())
        })
    }

    fn search(&self, query: &str, limit: usize) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        let query = query.to_lowercase();
        Box::pin(async move {
            let mut response = self
                .client
                .query(format!(
                    "SELECT {USER_FIELDS} FROM users WHERE \
                         string::lowercase(full_name) CONTAINS $query OR \
                         string::lowercase(email) CONTAINS $query \
                     ORDER BY full_name LIMIT $limit"
                ))
                .bind(("query", query))
                .bind(("limit", limit as i64))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response
                .take(0)
                .map_err(|err| DomainError::Validation(format!("invalid query result: {err}")))?;
            Self::decode_rows(rows)
        })
    }

    fn list(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        Box::pin(async move {
            let mut response = self
                .client
                .query(format!(
                    "SELECT {USER_FIELDS} FROM users ORDER BY created_at DESC LIMIT $limit"
                ))
                .bind(("limit", limit as i64))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response
                .take(0)
                .map_err(|err| DomainError::Validation(format!("invalid query result: {err}")))?;
            Self::decode_rows(rows)
        })
    }

    fn count(&self) -> BoxFuture<'_, DomainResult<usize>> {
        Box::pin(async move {
            let mut response = self
                .client
                .query("SELECT count() AS total FROM users GROUP ALL")
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response
                .take(0)
                .map_err(|err| DomainError::Validation(format!("invalid query result: {err}")))?;
            let total = rows
                .first()
                .and_then(|row| row.get("total"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Ok(total as usize)
        })
    }
}
