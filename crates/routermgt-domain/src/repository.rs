use async_trait::async_trait;

use crate::error::DomainResult;
use crate::router::{
    AddRoutersInput, DeleteRoutersInput, GetRouterInput, GetRouterPageInput, Router, RouterPage,
};

/// Repository trait for tenant-scoped router storage
/// Infrastructure layer (e.g., routermgt-postgres) implements this trait
///
/// No operation may observe or mutate routers of a tenant other than the one in its input.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RouterRepository: Send + Sync {
    /// Insert routers whose serial is not yet present for the tenant.
    /// Returns the input routers that were rejected because the serial already existed.
    async fn add_routers(&self, input: AddRoutersInput) -> DomainResult<Vec<Router>>;

    /// Get a router by serial
    async fn get_router(&self, input: GetRouterInput) -> DomainResult<Option<Router>>;

    /// Get one page of the tenant's routers, ordered by serial ascending
    async fn get_router_page(&self, input: GetRouterPageInput) -> DomainResult<RouterPage>;

    /// Remove routers by serial; absent serials are skipped
    async fn delete_routers(&self, input: DeleteRoutersInput) -> DomainResult<()>;
}
