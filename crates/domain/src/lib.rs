pub mod auth;
pub mod error;
pub mod friends;
pub mod idempotency;
pub mod identity;
pub mod journals;
pub mod marketplace;
pub mod moderation;
pub mod ports;
pub mod posts;
pub mod stories;
pub mod users;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
