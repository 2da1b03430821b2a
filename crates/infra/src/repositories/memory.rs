use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use mindgrove_domain::error::DomainError;
use mindgrove_domain::friends::{FriendRequest, Friendship};
use mindgrove_domain::journals::JournalEntry;
use mindgrove_domain::marketplace::{Product, ProductStatus};
use mindgrove_domain::ports::friends::FriendRepository;
use mindgrove_domain::ports::journals::JournalRepository;
use mindgrove_domain::ports::marketplace::ProductRepository;
use mindgrove_domain::ports::posts::PostStore;
use mindgrove_domain::ports::stories::StoryRepository;
use mindgrove_domain::ports::users::UserRepository;
use mindgrove_domain::stories::Story;
use mindgrove_domain::ports::BoxFuture;
use mindgrove_domain::posts::Post;
use mindgrove_domain::users::User;
use mindgrove_domain::DomainResult;

fn read<T>(lock: &RwLock<T>) -> DomainResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| DomainError::Validation("store lock poisoned".into()))
}

fn write<T>(lock: &RwLock<T>) -> DomainResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| DomainError::Validation("store lock poisoned".into()))
}

/// Default backend for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryPostStore {
    pending: Arc<RwLock<HashMap<String, Post>>>,
    live: Arc<RwLock<HashMap<String, Post>>>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut posts: Vec<Post>, limit: usize) -> Vec<Post> {
    posts.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
    posts.truncate(limit);
    posts
}

impl PostStore for InMemoryPostStore {
    fn insert_pending(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>> {
        let post = post.clone();
        Box::pin(async move {
            write(&self.pending)?.insert(post.id.clone(), post.clone());
            Ok(post)
        })
    }

    fn get_pending(&self, post_id: &str) -> BoxFuture<'_, DomainResult<Option<Post>>> {
        let post_id = post_id.to_string();
        Box::pin(async move { Ok(read(&self.pending)?.get(&post_id).cloned()) })
    }

    fn update_pending(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>> {
        let post = post.clone();
        Box::pin(async move {
            let mut guard = write(&self.pending)?;
            if !guard.contains_key(&post.id) {
                return Err(DomainError::NotFound);
            }
            guard.insert(post.id.clone(), post.clone());
            Ok(post)
        })
    }

    fn delete_pending(&self, post_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let post_id = post_id.to_string();
        Box::pin(async move {
            write(&self.pending)?.remove(&post_id);
            Ok(())
        })
    }

    fn list_pending(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
        Box::pin(async move {
            let posts = read(&self.pending)?.values().cloned().collect();
            Ok(newest_first(posts, limit))
        })
    }

    fn list_pending_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
        let author_id = author_id.to_string();
        Box::pin(async move {
            Ok(read(&self.pending)?
                .values()
                .filter(|post| post.author_id == author_id)
                .cloned()
                .collect())
        })
    }

    fn insert_live(&self, post: &Post) -> BoxFuture<'_, DomainResult<Post>> {
        let post = post.clone();
        Box::pin(async move {
            let mut guard = write(&self.live)?;
            if guard.contains_key(&post.id) {
                return Err(DomainError::Conflict);
            }
            guard.insert(post.id.clone(), post.clone());
            Ok(post)
        })
    }

    fn get_live(&self, post_id: &str) -> BoxFuture<'_, DomainResult<Option<Post>>> {
        let post_id = post_id.to_string();
        Box::pin(async move { Ok(read(&self.live)?.get(&post_id).cloned()) })
    }

    fn delete_live(&self, post_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let post_id = post_id.to_string();
        Box::pin(async move {
            write(&self.live)?.remove(&post_id);
            Ok(())
        })
    }

    fn list_live(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
        Box::pin(async move {
            let posts = read(&self.live)?.values().cloned().collect();
            Ok(newest_first(posts, limit))
        })
    }

    fn list_live_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<Post>>> {
        let author_id = author_id.to_string();
        Box::pin(async move {
            Ok(read(&self.live)?
                .values()
                .filter(|post| post.author_id == author_id)
                .cloned()
                .collect())
        })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a profile directly, bypassing the service layer.
    pub fn seed(&self, user: User) {
        if let Ok(mut guard) = self.users.write() {
            guard.insert(user.id.clone(), user);
        }
    }
}

impl UserRepository for InMemoryUserRepository {
    fn upsert(&self, user: &User) -> BoxFuture<'_, DomainResult<User>> {
        let user = user.clone();
        Box::pin(async move {
            write(&self.users)?.insert(user.id.clone(), user.clone());
            Ok(user)
        })
    }

    fn get(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<User>>> {
        let user_id = user_id.to_string();
        Box::pin(async move { Ok(read(&self.users)?.get(&user_id).cloned()) })
    }

    fn search(&self, query: &str, limit: usize) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        let query = query.to_lowercase();
        Box::pin(async move {
            let mut hits: Vec<User> = read(&self.users)?
                .values()
                .filter(|user| {
                    user.full_name.to_lowercase().contains(&query)
                        || user.email.to_lowercase().contains(&query)
                })
                .cloned()
                .collect();
            hits.sort_by(|a, b| a.full_name.cmp(&b.full_name));
            hits.truncate(limit);
            Ok(hits)
        })
    }

    fn list(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<User>>> {
        Box::pin(async move {
            let mut users: Vec<User> = read(&self.users)?.values().cloned().collect();
            users.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
            users.truncate(limit);
            Ok(users)
        })
    }

    fn count(&self) -> BoxFuture<'_, DomainResult<usize>> {
        Box::pin(async move { Ok(read(&self.users)?.len()) })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryFriendRepository {
    requests: Arc<RwLock<HashMap<String, FriendRequest>>>,
    friendships: Arc<RwLock<Vec<Friendship>>>,
}

impl InMemoryFriendRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FriendRepository for InMemoryFriendRepository {
    fn insert_request(&self, request: &FriendRequest) -> BoxFuture<'_, DomainResult<FriendRequest>> {
        let request = request.clone();
        Box::pin(async move {
            write(&self.requests)?.insert(request.id.clone(), request.clone());
            Ok(request)
        })
    }

    fn get_request(&self, request_id: &str) -> BoxFuture<'_, DomainResult<Option<FriendRequest>>> {
        let request_id = request_id.to_string();
        Box::pin(async move { Ok(read(&self.requests)?.get(&request_id).cloned()) })
    }

    fn find_request_between(
        &self,
        a: &str,
        b: &str,
    ) -> BoxFuture<'_, DomainResult<Option<FriendRequest>>> {
        let (a, b) = (a.to_string(), b.to_string());
        Box::pin(async move {
            Ok(read(&self.requests)?
                .values()
                .find(|request| {
                    (request.from_user_id == a && request.to_user_id == b)
                        || (request.from_user_id == b && request.to_user_id == a)
                })
                .cloned())
        })
    }

    fn delete_request(&self, request_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let request_id = request_id.to_string();
        Box::pin(async move {
            write(&self.requests)?.remove(&request_id);
            Ok(())
        })
    }

    fn list_incoming(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<FriendRequest>>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let mut requests: Vec<FriendRequest> = read(&self.requests)?
                .values()
                .filter(|request| request.to_user_id == user_id)
                .cloned()
                .collect();
            requests.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
            Ok(requests)
        })
    }

    fn insert_friendship(&self, friendship: &Friendship) -> BoxFuture<'_, DomainResult<()>> {
        let friendship = friendship.clone();
        Box::pin(async move {
            let mut guard = write(&self.friendships)?;
            let exists = guard
                .iter()
                .any(|f| f.user_id == friendship.user_id && f.friend_id == friendship.friend_id);
            if !exists {
                guard.push(friendship);
            }
            Ok(())
        })
    }

    fn are_friends(&self, a: &str, b: &str) -> BoxFuture<'_, DomainResult<bool>> {
        let (a, b) = (a.to_string(), b.to_string());
        Box::pin(async move {
            Ok(read(&self.friendships)?
                .iter()
                .any(|f| f.user_id == a && f.friend_id == b))
        })
    }

    fn list_friends(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Vec<Friendship>>> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            Ok(read(&self.friendships)?
                .iter()
                .filter(|f| f.user_id == user_id)
                .cloned()
                .collect())
        })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryJournalRepository {
    entries: Arc<RwLock<HashMap<String, JournalEntry>>>,
}

impl InMemoryJournalRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JournalRepository for InMemoryJournalRepository {
    fn insert(&self, entry: &JournalEntry) -> BoxFuture<'_, DomainResult<JournalEntry>> {
        let entry = entry.clone();
        Box::pin(async move {
            write(&self.entries)?.insert(entry.id.clone(), entry.clone());
            Ok(entry)
        })
    }

    fn get(&self, entry_id: &str) -> BoxFuture<'_, DomainResult<Option<JournalEntry>>> {
        let entry_id = entry_id.to_string();
        Box::pin(async move { Ok(read(&self.entries)?.get(&entry_id).cloned()) })
    }

    fn update(&self, entry: &JournalEntry) -> BoxFuture<'_, DomainResult<JournalEntry>> {
        let entry = entry.clone();
        Box::pin(async move {
            let mut guard = write(&self.entries)?;
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
            write(&self.entries)?.remove(&entry_id);
            Ok(())
        })
    }

    fn list_by_author(&self, author_id: &str) -> BoxFuture<'_, DomainResult<Vec<JournalEntry>>> {
        let author_id = author_id.to_string();
        Box::pin(async move {
            Ok(read(&self.entries)?
                .values()
                .filter(|entry| entry.author_id == author_id)
                .cloned()
                .collect())
        })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStoryRepository {
    stories: Arc<RwLock<HashMap<String, Story>>>,
}

impl InMemoryStoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoryRepository for InMemoryStoryRepository {
    fn insert(&self, story: &Story) -> BoxFuture<'_, DomainResult<Story>> {
        let story = story.clone();
        Box::pin(async move {
            write(&self.stories)?.insert(story.id.clone(), story.clone());
            Ok(story)
        })
    }

    fn get(&self, story_id: &str) -> BoxFuture<'_, DomainResult<Option<Story>>> {
        let story_id = story_id.to_string();
        Box::pin(async move { Ok(read(&self.stories)?.get(&story_id).cloned()) })
    }

    fn list(&self) -> BoxFuture<'_, DomainResult<Vec<Story>>> {
        Box::pin(async move { Ok(read(&self.stories)?.values().cloned().collect()) })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryProductRepository {
    products: Arc<RwLock<HashMap<String, Product>>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProductRepository for InMemoryProductRepository {
    fn insert(&self, product: &Product) -> BoxFuture<'_, DomainResult<Product>> {
        let product = product.clone();
        Box::pin(async move {
            write(&self.products)?.insert(product.id.clone(), product.clone());
            Ok(product)
        })
    }

    fn get(&self, product_id: &str) -> BoxFuture<'_, DomainResult<Option<Product>>> {
        let product_id = product_id.to_string();
        Box::pin(async move { Ok(read(&self.products)?.get(&product_id).cloned()) })
    }

    fn update(&self, product: &Product) -> BoxFuture<'_, DomainResult<Product>> {
        let product = product.clone();
        Box::pin(async move {
            let mut guard = write(&self.products)?;
            if !guard.contains_key(&product.id) {
                return Err(DomainError::NotFound);
            }
            guard.insert(product.id.clone(), product.clone());
            Ok(product)
        })
    }

    fn delete(&self, product_id: &str) -> BoxFuture<'_, DomainResult<()>> {
        let product_id = product_id.to_string();
        Box::pin(async move {
            write(&self.products)?.remove(&product_id);
            Ok(())
        })
    }

    fn list_active(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<Product>>> {
        Box::pin(async move {
            let mut products: Vec<Product> = read(&self.products)?
                .values()
                .filter(|product| product.status == ProductStatus::Active)
                .cloned()
                .collect();
            products.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
            products.truncate(limit);
            Ok(products)
        })
    }

    fn list_by_seller(&self, seller_id: &str) -> BoxFuture<'_, DomainResult<Vec<Product>>> {
        let seller_id = seller_id.to_string();
        Box::pin(async move {
            Ok(read(&self.products)?
                .values()
                .filter(|product| product.seller_id == seller_id)
                .cloned()
                .collect())
        })
    }
}
