use std::sync::Arc;

use mindgrove_domain::friends::FriendService;
use mindgrove_domain::idempotency::{IdempotencyConfig, IdempotencyService, InMemoryIdempotencyStore};
use mindgrove_domain::journals::JournalService;
use mindgrove_domain::marketplace::MarketplaceService;
use mindgrove_domain::moderation::ModerationPipeline;
use mindgrove_domain::ports::db::DbAdapter;
use mindgrove_domain::ports::idempotency::IdempotencyStore;
use mindgrove_domain::ports::moderation::{GenerativeModerationProvider, MediaModerationProvider};
use mindgrove_domain::ports::posts::PostStore;
use mindgrove_domain::ports::users::UserRepository;
use mindgrove_domain::posts::PostService;
use mindgrove_domain::stories::StoryService;
use mindgrove_domain::users::UserService;
use mindgrove_infra::config::AppConfig;
use mindgrove_infra::db::{DbConfig, SurrealAdapter};
use mindgrove_infra::idempotency::RedisIdempotencyStore;
use mindgrove_infra::providers::{GeminiClient, SightengineClient};
use mindgrove_infra::repositories::{
    InMemoryFriendRepository, InMemoryJournalRepository, InMemoryPostStore,
    InMemoryProductRepository, InMemoryStoryRepository, InMemoryUserRepository,
    SurrealPostStore, SurrealUserRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub posts: PostService,
    pub users: UserService,
    pub friends: FriendService,
    pub journals: JournalService,
    pub stories: StoryService,
    pub marketplace: MarketplaceService,
    pub idempotency: IdempotencyService,
    pub db: Option<Arc<dyn DbAdapter>>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let pipeline = build_pipeline(&config);

        if config.data_backend.eq_ignore_ascii_case("surreal") {
            let db_config = DbConfig::from_app_config(&config);
            let post_store: Arc<dyn PostStore> =
                Arc::new(SurrealPostStore::new(&db_config).await?);
            let user_repo: Arc<dyn UserRepository> =
                Arc::new(SurrealUserRepository::new(&db_config).await?);
            let idempotency_store = RedisIdempotencyStore::connect(&config.redis_url).await?;
            let db: Arc<dyn DbAdapter> = Arc::new(SurrealAdapter::new(db_config));

            // Friends, journals, stories and marketplace stay in process memory
            // until their Surreal repositories land.
            Ok(Self::assemble(
                config,
                pipeline,
                post_store,
                user_repo,
                Arc::new(idempotency_store),
                Some(db),
            ))
        } else {
            let post_store: Arc<dyn PostStore> = Arc::new(InMemoryPostStore::default());
            let user_repo: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::default());
            let idempotency_store = InMemoryIdempotencyStore::new("mindgrove:idemp");
            Ok(Self::assemble(
                config,
                pipeline,
                post_store,
                user_repo,
                Arc::new(idempotency_store),
                None,
            ))
        }
    }

    fn assemble(
        config: AppConfig,
        pipeline: ModerationPipeline,
        post_store: Arc<dyn PostStore>,
        user_repo: Arc<dyn UserRepository>,
        idempotency_store: Arc<dyn IdempotencyStore>,
        db: Option<Arc<dyn DbAdapter>>,
    ) -> Self {
        let friend_repo = Arc::new(InMemoryFriendRepository::default());
        let journal_repo = Arc::new(InMemoryJournalRepository::default());
        let story_repo = Arc::new(InMemoryStoryRepository::default());
        let product_repo = Arc::new(InMemoryProductRepository::default());

        Self {
            config,
            posts: PostService::new(post_store, pipeline.clone()),
            users: UserService::new(user_repo.clone()),
            friends: FriendService::new(friend_repo, user_repo.clone()),
            journals: JournalService::new(journal_repo),
            stories: StoryService::new(story_repo),
            marketplace: MarketplaceService::new(product_repo, user_repo, pipeline),
            idempotency: IdempotencyService::new(idempotency_store, IdempotencyConfig::default()),
            db,
        }
    }

    #[allow(dead_code)]
    pub fn in_memory(config: AppConfig, pipeline: ModerationPipeline) -> Self {
        let post_store: Arc<dyn PostStore> = Arc::new(InMemoryPostStore::default());
        let user_repo: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::default());
        let store = InMemoryIdempotencyStore::new("test");
        Self::assemble(config, pipeline, post_store, user_repo, Arc::new(store), None)
    }
}

fn build_pipeline(config: &AppConfig) -> ModerationPipeline {
    let media: Option<Arc<dyn MediaModerationProvider>> =
        if config.sightengine_api_user.trim().is_empty() {
            tracing::info!("sightengine credentials absent; media stage disabled");
            None
        } else {
            Some(Arc::new(SightengineClient::from_config(config)))
        };
    let generative: Option<Arc<dyn GenerativeModerationProvider>> =
        if config.gemini_api_key.trim().is_empty() {
            tracing::info!("gemini key absent; generative stage disabled");
            None
        } else {
            Some(Arc::new(GeminiClient::from_config(config)))
        };
    ModerationPipeline::new(media, generative)
}
