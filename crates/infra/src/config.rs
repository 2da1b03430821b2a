use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub port: u16,
    pub log_level: String,
    pub data_backend: String,
    pub surreal_endpoint: String,
    pub surreal_ns: String,
    pub surreal_db: String,
    pub surreal_user: String,
    pub surreal_pass: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub sightengine_api_user: String,
    pub sightengine_api_secret: String,
    pub sightengine_text_url: String,
    pub sightengine_image_url: String,
    pub sightengine_timeout_ms: u64,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub gemini_timeout_ms: u64,
    pub gemini_retry_max_attempts: u32,
    pub gemini_retry_backoff_base_ms: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("port", 3000)?
            .set_default("log_level", "info")?
            .set_default("data_backend", "memory")?
            .set_default("surreal_endpoint", "ws://127.0.0.1:8000")?
            .set_default("surreal_ns", "mindgrove")?
            .set_default("surreal_db", "community")?
            .set_default("surreal_user", "root")?
            .set_default("surreal_pass", "root")?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("jwt_secret", "dev-secret")?
            .set_default("sightengine_api_user", "")?
            .set_default("sightengine_api_secret", "")?
            .set_default(
                "sightengine_text_url",
                "https://api.sightengine.com/1.0/text/check.json",
            )?
            .set_default(
                "sightengine_image_url",
                "https://api.sightengine.com/1.0/check.json",
            )?
            .set_default("sightengine_timeout_ms", 8000)?
            .set_default("gemini_api_key", "")?
            .set_default(
                "gemini_base_url",
                "https://generativelanguage.googleapis.com/v1beta",
            )?
            .set_default("gemini_model", "gemini-2.0-flash")?
            .set_default("gemini_timeout_ms", 15000)?
            .set_default("gemini_retry_max_attempts", 3)?
            .set_default("gemini_retry_backoff_base_ms", 2000)?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn is_test(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("test")
    }
}
