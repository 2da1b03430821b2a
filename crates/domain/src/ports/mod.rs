use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub mod db;
pub mod friends;
pub mod idempotency;
pub mod journals;
pub mod marketplace;
pub mod moderation;
pub mod posts;
pub mod stories;
pub mod users;
