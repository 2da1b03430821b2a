use thiserror::Error;

use super::BoxFuture;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("db unavailable: {0}")]
    Unavailable(String),
}

pub trait DbAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    fn health_check(&self) -> BoxFuture<'_, Result<(), DbError>>;
}
