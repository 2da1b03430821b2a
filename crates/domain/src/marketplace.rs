use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::moderation::{ModerationPipeline, ModerationRequest, VerdictStatus};
use crate::ports::marketplace::ProductRepository;
use crate::ports::users::UserRepository;
use crate::users::SellerStatus;
use crate::util::{now_ms, uuid_v7_without_dashes};
use crate::DomainResult;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> DomainResult<Self> {
        match value {
            "active" => Ok(ProductStatus::Active),
            "inactive" => Ok(ProductStatus::Inactive),
            other => Err(DomainError::Validation(format!(
                "unknown product status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub seller_id: String,
    pub seller_name: String,
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub image_url: Option<String>,
    pub status: ProductStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProductDraft {
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub image_url: Option<String>,
}

#[derive(Clone)]
pub struct MarketplaceService {
    repo: Arc<dyn ProductRepository>,
    users: Arc<dyn UserRepository>,
    pipeline: ModerationPipeline,
}

impl MarketplaceService {
    pub fn new(
        repo: Arc<dyn ProductRepository>,
        users: Arc<dyn UserRepository>,
        pipeline: ModerationPipeline,
    ) -> Self {
        Self {
            repo,
            users,
            pipeline,
        }
    }

    fn validate(draft: &ProductDraft) -> DomainResult<()> {
        if draft.title.trim().is_empty() {
            return Err(DomainError::Validation("product title is required".into()));
        }
        if draft.title.chars().count() > MAX_TITLE_CHARS {
            return Err(DomainError::Validation(format!(
                "product title exceeds {MAX_TITLE_CHARS} characters"
            )));
        }
        if draft.description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(DomainError::Validation(format!(
                "product description exceeds {MAX_DESCRIPTION_CHARS} characters"
            )));
        }
        if draft.price_cents <= 0 {
            return Err(DomainError::Validation(
                "price_cents must be positive".into(),
            ));
        }
        Ok(())
    }

    async fn require_seller(&self, actor: &ActorIdentity) -> DomainResult<()> {
        let user = self
            .users
            .get(&actor.user_id)
            .await?
            .ok_or_else(|| DomainError::Forbidden("seller profile not found".into()))?;
        if user.seller_status != SellerStatus::Approved && !user.role.is_admin() {
            return Err(DomainError::Forbidden(
                "only approved sellers can manage listings".into(),
            ));
        }
        Ok(())
    }

    /// Listing text and imagery go through the same moderation pipeline
    /// as posts. A rejected verdict blocks the listing; a flagged one
    /// parks it inactive.
    async fn moderated_status(
        &self,
        product_id: &str,
        draft: &ProductDraft,
    ) -> DomainResult<ProductStatus> {
        let request = ModerationRequest::new(
            product_id,
            format!("{}\n{}", draft.title.trim(), draft.description.trim()),
            draft.image_url.clone(),
            None,
        );
        let outcome = self.pipeline.check_content(&request).await;
        match outcome.verdict.status {
            VerdictStatus::Approved => Ok(ProductStatus::Active),
            VerdictStatus::Flagged => Ok(ProductStatus::Inactive),
            VerdictStatus::Rejected => {
                let category = outcome
                    .verdict
                    .category
                    .unwrap_or_else(|| "policy violation".to_string());
                Err(DomainError::Validation(format!(
                    "listing failed moderation: {category}"
                )))
            }
        }
    }

    pub async fn create(
        &self,
        actor: &ActorIdentity,
        draft: ProductDraft,
    ) -> DomainResult<Product> {
        Self::validate(&draft)?;
        self.require_seller(actor).await?;

        let id = uuid_v7_without_dashes();
        let status = self.moderated_status(&id, &draft).await?;
        let now = now_ms();
        let product = Product {
            id,
            seller_id: actor.user_id.clone(),
            seller_name: actor.username.clone(),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            price_cents: draft.price_cents,
            image_url: draft.image_url,
            status,
            created_at_ms: now,
            updated_at_ms: now,
        };
        let stored = self.repo.insert(&product).await?;
        info!(
            product_id = %stored.id,
            seller_id = %actor.user_id,
            status = stored.status.as_str(),
            "product listed"
        );
        Ok(stored)
    }

    pub async fn storefront(&self, limit: usize) -> DomainResult<Vec<Product>> {
        self.repo.list_active(limit).await
    }

    pub async fn my_products(&self, actor: &ActorIdentity) -> DomainResult<Vec<Product>> {
        self.repo.list_by_seller(&actor.user_id).await
    }

    async fn owned(&self, actor: &ActorIdentity, product_id: &str) -> DomainResult<Product> {
        let product = self
            .repo
            .get(product_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        if product.seller_id != actor.user_id {
            return Err(DomainError::Forbidden(
                "only the seller can modify this listing".into(),
            ));
        }
        Ok(product)
    }

    pub async fn update(
        &self,
        actor: &ActorIdentity,
        product_id: &str,
        draft: ProductDraft,
    ) -> DomainResult<Product> {
        Self::validate(&draft)?;
        self.require_seller(actor).await?;
        let mut product = self.owned(actor, product_id).await?;

        product.status = self.moderated_status(product_id, &draft).await?;
        product.title = draft.title.trim().to_string();
        product.description = draft.description.trim().to_string();
        product.price_cents = draft.price_cents;
        product.image_url = draft.image_url;
        product.updated_at_ms = now_ms();
        self.repo.update(&product).await
    }

    pub async fn delete(
        &self,
        actor: &ActorIdentity,
        is_admin: bool,
        product_id: &str,
    ) -> DomainResult<()> {
        let product = self
            .repo
            .get(product_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        if !is_admin && product.seller_id != actor.user_id {
            return Err(DomainError::Forbidden(
                "only the seller or an admin can delete this listing".into(),
            ));
        }
        self.repo.delete(product_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::ports::BoxFuture;
    use crate::users::User;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    struct MockProductRepo {
        products: RwLock<HashMap<String, Product>>,
    }

    impl ProductRepository for MockProductRepo {
        fn insert(&self, product: &Product) -> BoxFuture<'_, DomainResult<Product>> {
            let product = product.clone();
            Box::pin(async move {
                self.products
                    .write()
                    .unwrap()
                    .insert(product.id.clone(), product.clone());
                Ok(product)
            })
        }

        fn get(&self, product_id: &str) -> BoxFuture<'_, DomainResult<Option<Product>>> {
            let product_id = product_id.to_string();
            Box::pin(async move { Ok(self.products.read().unwrap().get(&product_id).cloned()) })
        }

        fn update(&self, product: &Product) -> BoxFuture<'_, DomainResult<Product>> {
            let product = product.clone();
            Box::pin(async move {
                let mut guard = self.products.write().unwrap();
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
                self.products.write().unwrap().remove(&product_id);
                Ok(())
            })
        }

        fn list_active(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<Product>>> {
            Box::pin(async move {
                let mut products: Vec<Product> = self
                    .products
                    .read()
                    .unwrap()
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
                Ok(self
                    .products
                    .read()
                    .unwrap()
                    .values()
                    .filter(|product| product.seller_id == seller_id)
                    .cloned()
                    .collect())
            })
        }
    }

    #[derive(Default)]
    struct MockUserRepo {
        users: RwLock<HashMap<String, User>>,
    }

    impl UserRepository for MockUserRepo {
        fn upsert(&self, user: &User) -> BoxFuture<'_, DomainResult<User>> {
            let user = user.clone();
            Box::pin(async move {
                self.users
                    .write()
                    .unwrap()
                    .insert(user.id.clone(), user.clone());
                Ok(user)
            })
        }

        fn get(&self, user_id: &str) -> BoxFuture<'_, DomainResult<Option<User>>> {
            let user_id = user_id.to_string();
            Box::pin(async move { Ok(self.users.read().unwrap().get(&user_id).cloned()) })
        }

        fn search(&self, _query: &str, _limit: usize) -> BoxFuture<'_, DomainResult<Vec<User>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }

        fn list(&self, _limit: usize) -> BoxFuture<'_, DomainResult<Vec<User>>> {
            Box::pin(async move { Ok(Vec::new()) })
        }

        fn count(&self) -> BoxFuture<'_, DomainResult<usize>> {
            Box::pin(async move { Ok(self.users.read().unwrap().len()) })
        }
    }

    fn seller_user(id: &str, status: SellerStatus) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            full_name: id.to_string(),
            role: Role::Seller,
            seller_status: status,
            profile_pic: None,
            bio: None,
            is_verified: true,
            created_at_ms: now_ms(),
        }
    }

    fn service_with(status: SellerStatus) -> MarketplaceService {
        let users = Arc::new(MockUserRepo::default());
        users
            .users
            .write()
            .unwrap()
            .insert("seller-1".to_string(), seller_user("seller-1", status));
        MarketplaceService::new(
            Arc::new(MockProductRepo::default()),
            users,
            ModerationPipeline::new(None, None),
        )
    }

    fn seller() -> ActorIdentity {
        ActorIdentity::new("seller-1", "vera")
    }

    fn draft(title: &str) -> ProductDraft {
        ProductDraft {
            title: title.to_string(),
            description: "Handmade with care".to_string(),
            price_cents: 2500,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn unapproved_sellers_cannot_list() {
        let service = service_with(SellerStatus::Pending);
        let err = service
            .create(&seller(), draft("A calm lavender candle full of joy"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn clean_listing_goes_active() {
        let service = service_with(SellerStatus::Approved);
        let product = service
            .create(&seller(), draft("A calm lavender candle full of joy"))
            .await
            .unwrap();
        assert_eq!(product.status, ProductStatus::Active);
        assert_eq!(service.storefront(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn spam_listing_is_blocked() {
        let service = service_with(SellerStatus::Approved);
        let err = service
            .create(&seller(), draft("Buy now, limited time offer"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn ambiguous_listing_is_parked_inactive() {
        let service = service_with(SellerStatus::Approved);
        let product = service
            .create(&seller(), draft("Assorted housewares, various conditions"))
            .await
            .unwrap();
        assert_eq!(product.status, ProductStatus::Inactive);
        assert!(service.storefront(10).await.unwrap().is_empty());
        assert_eq!(service.my_products(&seller()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn nonpositive_price_is_a_validation_error() {
        let service = service_with(SellerStatus::Approved);
        let mut bad = draft("A calm lavender candle full of joy");
        bad.price_cents = 0;
        let err = service.create(&seller(), bad).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn only_the_owner_updates_a_listing() {
        let service = service_with(SellerStatus::Approved);
        let product = service
            .create(&seller(), draft("A calm lavender candle full of joy"))
            .await
            .unwrap();

        let stranger = ActorIdentity::new("seller-2", "nils");
        let err = service
            .update(&stranger, &product.id, draft("Hijacked listing"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }
}
