use axum::extract::{Extension, Path, Query, State};
use axum::{
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use mindgrove_domain::{
    error::DomainError,
    friends::{FriendRequest, Friendship, RequestOutcome, RequestResponse},
    idempotency::{submission_key, BeginOutcome},
    identity::ActorIdentity,
    journals::{JournalDraft, JournalEntry},
    marketplace::{Product, ProductDraft},
    ports::idempotency::IdempotencyResponse,
    posts::{NewPost, Post, PostStatus, TransitionOutcome},
    stories::{Story, StoryDraft},
    users::{PublicProfile, User},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::middleware::AuthContext;
use crate::observability;
use crate::{error::ApiError, middleware as app_middleware, state::AppState, validation};

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/posts", post(submit_post))
        .route("/v1/posts/my", get(my_posts))
        .route("/v1/posts/:post_id", delete(delete_post))
        .route("/v1/friends", get(list_friends))
        .route("/v1/friends/search", get(search_users))
        .route("/v1/friends/request", post(send_friend_request))
        .route("/v1/friends/requests", get(incoming_friend_requests))
        .route("/v1/friends/respond", post(respond_friend_request))
        .route("/v1/journals", get(list_journals).post(create_journal))
        .route(
            "/v1/journals/:journal_id",
            put(update_journal).delete(delete_journal),
        )
        .route("/v1/stories", post(create_story))
        .route("/v1/marketplace/products", post(create_product))
        .route("/v1/marketplace/products/my", get(my_products))
        .route(
            "/v1/marketplace/products/:product_id",
            put(update_product).delete(delete_product),
        )
        .route_layer(middleware::from_fn(app_middleware::require_auth_middleware));

    let admin = Router::new()
        .route("/v1/admin/users", get(admin_list_users))
        .route("/v1/admin/stats", get(admin_stats))
        .route("/v1/admin/posts", get(admin_list_posts))
        .route("/v1/admin/posts/:post_id/status", put(admin_post_status))
        .route(
            "/v1/admin/sellers/:user_id/approve",
            put(admin_approve_seller),
        )
        .route_layer(middleware::from_fn(
            app_middleware::require_admin_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/v1/posts", get(feed))
        .route("/v1/posts/:post_id/status", get(post_status))
        .route("/v1/users/:user_id", get(user_profile))
        .route("/v1/stories", get(list_stories))
        .route("/v1/stories/:story_id", get(get_story))
        .route("/v1/marketplace", get(storefront))
        .merge(protected)
        .merge(admin)
        .layer(middleware::from_fn(app_middleware::metrics_layer))
        .layer(app_middleware::timeout_layer())
        .layer(app_middleware::trace_layer())
        .layer(app_middleware::set_request_id_layer())
        .layer(app_middleware::propagate_request_id_layer())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_middleware,
        ))
        .layer(middleware::from_fn(
            app_middleware::correlation_id_middleware,
        ));

    if !state.config.is_test() {
        app = app.layer(app_middleware::rate_limit_layer());
    }

    app.with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
    database: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match &state.db {
        Some(adapter) => match adapter.health_check().await {
            Ok(()) => "up",
            Err(err) => {
                tracing::warn!(error = %err, "db health check failed");
                "down"
            }
        },
        None => "memory",
    };
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.clone(),
        database,
    })
}

async fn metrics() -> Response {
    match observability::render_metrics() {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => ApiError::Internal.into_response(),
    }
}

#[derive(Debug, Deserialize, Validate)]
struct SubmitPostRequest {
    #[validate(length(min = 1, max = 5000))]
    body: String,
    #[validate(url)]
    image_url: Option<String>,
    #[validate(url)]
    video_url: Option<String>,
}

async fn submit_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<SubmitPostRequest>,
) -> Result<Response, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let request_id = request_id_from_headers(&headers)?;

    state
        .users
        .ensure_user(&actor, auth.role)
        .await
        .map_err(map_domain_error)?;

    let key = submission_key(&actor.user_id, &request_id);
    let outcome = state.idempotency.begin(&key).await.map_err(|err| {
        tracing::error!(error = %err, "idempotency begin failed");
        ApiError::Internal
    })?;

    match outcome {
        BeginOutcome::Replay(response) => Ok(to_response(response)),
        BeginOutcome::InProgress => Err(ApiError::Conflict),
        BeginOutcome::Started => {
            let input = NewPost {
                body: payload.body,
                image_url: payload.image_url,
                video_url: payload.video_url,
            };
            let created = state
                .posts
                .submit(&actor, input)
                .await
                .map_err(map_domain_error)?;

            if let Some(verdict) = &created.verdict {
                observability::register_post_moderation(
                    verdict.source.as_str(),
                    created.status.as_str(),
                );
            }

            let response = IdempotencyResponse {
                status_code: StatusCode::CREATED.as_u16(),
                body: serde_json::to_value(&created).map_err(|_| ApiError::Internal)?,
            };
            state
                .idempotency
                .complete(&key, response.clone())
                .await
                .map_err(|err| {
                    tracing::error!(error = %err, "idempotency complete failed");
                    ApiError::Internal
                })?;
            Ok(to_response(response))
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    limit: Option<usize>,
}

async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let limit = query.limit.unwrap_or(50).min(200);
    let posts = state.posts.feed(limit).await.map_err(map_domain_error)?;
    Ok(Json(posts))
}

async fn my_posts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let posts = state
        .posts
        .posts_by_author(&actor.user_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(posts))
}

#[derive(Serialize)]
struct PostStatusResponse {
    post_id: String,
    status: &'static str,
    rejection_reason: Option<String>,
}

async fn post_status(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<PostStatusResponse>, ApiError> {
    let found = state.posts.get(&post_id).await.map_err(map_domain_error)?;
    Ok(Json(PostStatusResponse {
        post_id: found.id,
        status: found.status.as_str(),
        rejection_reason: found.rejection_reason,
    }))
}

async fn delete_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(post_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let actor = actor_identity(&auth)?;
    state
        .posts
        .delete(&actor, auth.role.is_admin(), &post_id)
        .await
        .map_err(map_domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    query: String,
}

async fn user_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PublicProfile>, ApiError> {
    let profile = state
        .users
        .profile(&user_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(profile))
}

async fn search_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<PublicProfile>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let profiles = state
        .users
        .search(&actor, &params.query)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(profiles))
}

#[derive(Debug, Deserialize, Validate)]
struct FriendRequestPayload {
    #[validate(length(min = 1, max = 128))]
    to_user_id: String,
}

#[derive(Serialize)]
struct FriendRequestResponse {
    outcome: &'static str,
    request: Option<FriendRequest>,
}

async fn send_friend_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<FriendRequestPayload>,
) -> Result<Json<FriendRequestResponse>, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    state
        .users
        .ensure_user(&actor, auth.role)
        .await
        .map_err(map_domain_error)?;
    let outcome = state
        .friends
        .send_request(&actor, &payload.to_user_id)
        .await
        .map_err(map_domain_error)?;
    let response = match outcome {
        RequestOutcome::Sent(request) => FriendRequestResponse {
            outcome: "sent",
            request: Some(request),
        },
        RequestOutcome::AlreadyFriends => FriendRequestResponse {
            outcome: "already_friends",
            request: None,
        },
        RequestOutcome::AlreadyPending => FriendRequestResponse {
            outcome: "already_pending",
            request: None,
        },
    };
    Ok(Json(response))
}

async fn incoming_friend_requests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<FriendRequest>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let requests = state
        .friends
        .incoming(&actor)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(requests))
}

#[derive(Debug, Deserialize, Validate)]
struct RespondPayload {
    #[validate(length(min = 1, max = 128))]
    request_id: String,
    action: RequestResponse,
}

async fn respond_friend_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<RespondPayload>,
) -> Result<StatusCode, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    state
        .friends
        .respond(&actor, &payload.request_id, payload.action)
        .await
        .map_err(map_domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_friends(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Friendship>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let friends = state
        .friends
        .friends(&actor)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(friends))
}

#[derive(Debug, Deserialize, Validate)]
struct JournalPayload {
    #[validate(length(max = 200))]
    title: Option<String>,
    #[validate(length(min = 1, max = 20000))]
    body: String,
    #[validate(length(max = 64))]
    mood: Option<String>,
}

impl JournalPayload {
    fn into_draft(self) -> JournalDraft {
        JournalDraft {
            title: self.title,
            body: self.body,
            mood: self.mood,
        }
    }
}

async fn create_journal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<JournalPayload>,
) -> Result<(StatusCode, Json<JournalEntry>), ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let entry = state
        .journals
        .create(&actor, payload.into_draft())
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_journals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<JournalEntry>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let entries = state
        .journals
        .list(&actor)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(entries))
}

async fn update_journal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(journal_id): Path<String>,
    Json(payload): Json<JournalPayload>,
) -> Result<Json<JournalEntry>, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let entry = state
        .journals
        .update(&actor, &journal_id, payload.into_draft())
        .await
        .map_err(map_domain_error)?;
    Ok(Json(entry))
}

async fn delete_journal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(journal_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let actor = actor_identity(&auth)?;
    state
        .journals
        .delete(&actor, &journal_id)
        .await
        .map_err(map_domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct StorefrontQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
struct StoryPayload {
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[validate(length(max = 1000))]
    description: Option<String>,
    #[validate(length(min = 1, max = 50000))]
    body: String,
    #[validate(url)]
    image_url: Option<String>,
}

impl StoryPayload {
    fn into_draft(self) -> StoryDraft {
        StoryDraft {
            title: self.title,
            description: self.description,
            body: self.body,
            image_url: self.image_url,
        }
    }
}

async fn create_story(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<StoryPayload>,
) -> Result<(StatusCode, Json<Story>), ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let story = state
        .stories
        .create(&actor, payload.into_draft())
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(story)))
}

async fn list_stories(State(state): State<AppState>) -> Result<Json<Vec<Story>>, ApiError> {
    let stories = state.stories.list().await.map_err(map_domain_error)?;
    Ok(Json(stories))
}

async fn get_story(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
) -> Result<Json<Story>, ApiError> {
    let story = state
        .stories
        .get(&story_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(story))
}

async fn storefront(
    State(state): State<AppState>,
    Query(query): Query<StorefrontQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let limit = query.limit.unwrap_or(50).min(200);
    let products = state
        .marketplace
        .storefront(limit)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(products))
}

#[derive(Debug, Deserialize, Validate)]
struct ProductPayload {
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[validate(length(max = 5000))]
    description: String,
    #[validate(range(min = 1))]
    price_cents: i64,
    #[validate(url)]
    image_url: Option<String>,
}

impl ProductPayload {
    fn into_draft(self) -> ProductDraft {
        ProductDraft {
            title: self.title,
            description: self.description,
            price_cents: self.price_cents,
            image_url: self.image_url,
        }
    }
}

async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<ProductPayload>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    state
        .users
        .ensure_user(&actor, auth.role)
        .await
        .map_err(map_domain_error)?;
    let product = state
        .marketplace
        .create(&actor, payload.into_draft())
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn my_products(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let products = state
        .marketplace
        .my_products(&actor)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(products))
}

async fn update_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<String>,
    Json(payload): Json<ProductPayload>,
) -> Result<Json<Product>, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let product = state
        .marketplace
        .update(&actor, &product_id, payload.into_draft())
        .await
        .map_err(map_domain_error)?;
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let actor = actor_identity(&auth)?;
    state
        .marketplace
        .delete(&actor, auth.role.is_admin(), &product_id)
        .await
        .map_err(map_domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct AdminListQuery {
    limit: Option<usize>,
}

async fn admin_list_users(
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let limit = query.limit.unwrap_or(100).min(500);
    let users = state
        .users
        .admin_list(limit)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(users))
}

async fn admin_stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let total_users = state.users.count().await.map_err(map_domain_error)?;
    let queued = state
        .posts
        .review_queue(500)
        .await
        .map_err(map_domain_error)?;
    let live = state.posts.feed(500).await.map_err(map_domain_error)?;
    let pending = queued
        .iter()
        .filter(|post| post.status == PostStatus::Pending)
        .count();
    let rejected = queued.len() - pending;
    Ok(Json(json!({
        "total_users": total_users,
        "pending_posts": pending,
        "rejected_posts": rejected,
        "live_posts": live.len(),
    })))
}

#[derive(Debug, Deserialize)]
struct AdminPostsQuery {
    status: Option<String>,
    limit: Option<usize>,
}

async fn admin_list_posts(
    State(state): State<AppState>,
    Query(query): Query<AdminPostsQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let limit = query.limit.unwrap_or(100).min(500);
    let filter = query.status.as_deref().unwrap_or("pending");

    let mut posts = match filter {
        "pending" | "rejected" => {
            let wanted = PostStatus::parse(filter).map_err(map_domain_error)?;
            state
                .posts
                .review_queue(limit)
                .await
                .map_err(map_domain_error)?
                .into_iter()
                .filter(|post| post.status == wanted)
                .collect()
        }
        "approved" => state.posts.feed(limit).await.map_err(map_domain_error)?,
        "all" => {
            let mut queued = state
                .posts
                .review_queue(limit)
                .await
                .map_err(map_domain_error)?;
            let live = state.posts.feed(limit).await.map_err(map_domain_error)?;
            queued.extend(live);
            queued
        }
        other => {
            return Err(ApiError::Validation(format!(
                "unknown status filter '{other}'"
            )));
        }
    };
    posts.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
    Ok(Json(posts))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AdminPostAction {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
struct AdminPostStatusPayload {
    action: AdminPostAction,
    reason: Option<String>,
}

#[derive(Serialize)]
struct AdminPostStatusResponse {
    applied: bool,
    post: Post,
}

async fn admin_post_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(post_id): Path<String>,
    Json(payload): Json<AdminPostStatusPayload>,
) -> Result<Json<AdminPostStatusResponse>, ApiError> {
    let admin = actor_identity(&auth)?;
    let outcome = match payload.action {
        AdminPostAction::Approve => state
            .posts
            .approve(&admin, &post_id)
            .await
            .map_err(map_domain_error)?,
        AdminPostAction::Reject => {
            let reason = payload.reason.unwrap_or_default();
            state
                .posts
                .reject(&admin, &post_id, &reason)
                .await
                .map_err(map_domain_error)?
        }
    };
    let applied = outcome.was_applied();
    let post = match outcome {
        TransitionOutcome::Applied(post) | TransitionOutcome::AlreadyInTarget(post) => post,
    };
    Ok(Json(AdminPostStatusResponse { applied, post }))
}

async fn admin_approve_seller(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let admin = actor_identity(&auth)?;
    let user = state
        .users
        .approve_seller(&admin, &user_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(user))
}

fn actor_identity(auth: &AuthContext) -> Result<ActorIdentity, ApiError> {
    let user_id = auth
        .user_id
        .as_ref()
        .filter(|user_id| !user_id.trim().is_empty())
        .ok_or(ApiError::Unauthorized)?;
    let username = auth
        .username
        .clone()
        .unwrap_or_else(|| user_id.to_string());
    Ok(ActorIdentity::new(user_id, username))
}

fn request_id_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(std::string::ToString::to_string)
        .ok_or_else(|| ApiError::Validation("missing request id".into()))
}

fn map_domain_error(err: DomainError) -> ApiError {
    match err {
        DomainError::Validation(message) => ApiError::Validation(message),
        DomainError::NotFound => ApiError::NotFound,
        DomainError::Conflict => ApiError::Conflict,
        DomainError::Forbidden(message) => ApiError::Forbidden(message),
    }
}

fn to_response(response: IdempotencyResponse) -> Response {
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::OK);
    (status, Json(response.body)).into_response()
}
