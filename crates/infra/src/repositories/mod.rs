mod memory;
mod surreal;

pub use memory::{
    InMemoryFriendRepository, InMemoryJournalRepository, InMemoryPostStore,
    InMemoryProductRepository, InMemoryStoryRepository, InMemoryUserRepository,
};
pub use surreal::{SurrealPostStore, SurrealUserRepository};
