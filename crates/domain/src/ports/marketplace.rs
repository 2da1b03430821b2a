use crate::marketplace::Product;
use crate::ports::BoxFuture;
use crate::DomainResult;

pub trait ProductRepository: Send + Sync {
    fn insert(&self, product: &Product) -> BoxFuture<'_, DomainResult<Product>>;
    fn get(&self, product_id: &str) -> BoxFuture<'_, DomainResult<Option<Product>>>;
    fn update(&self, product: &Product) -> BoxFuture<'_, DomainResult<Product>>;
    fn delete(&self, product_id: &str) -> BoxFuture<'_, DomainResult<()>>;
    fn list_active(&self, limit: usize) -> BoxFuture<'_, DomainResult<Vec<Product>>>;
    fn list_by_seller(&self, seller_id: &str) -> BoxFuture<'_, DomainResult<Vec<Product>>>;
}
