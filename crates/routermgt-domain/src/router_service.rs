use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{DomainError, DomainResult};
use crate::repository::RouterRepository;
use crate::router::{
    AddRoutersInput, DeleteRoutersInput, GetRouterInput, GetRouterPageInput, Router, RouterPage,
};

/// Domain service for router management
/// This is the orchestration layer that the dispatch handlers call
pub struct RouterService {
    repository: Arc<dyn RouterRepository>,
}

impl RouterService {
    pub fn new(repository: Arc<dyn RouterRepository>) -> Self {
        Self { repository }
    }

    /// Insert routers, returning the ones rejected because their serial already exists
    pub async fn add_routers(&self, input: AddRoutersInput) -> DomainResult<Vec<Router>> {
        validate_tenant(&input.tenant)?;

        debug!(tenant = %input.tenant, count = input.routers.len(), "Adding routers");

        let rejected = self.repository.add_routers(input).await?;

        info!(rejected = rejected.len(), "Routers added");
        Ok(rejected)
    }

    /// Get a router by serial; absence is not an error
    pub async fn get_router(&self, input: GetRouterInput) -> DomainResult<Option<Router>> {
        validate_tenant(&input.tenant)?;

        debug!(tenant = %input.tenant, serial = %input.serial, "Getting router");

        self.repository.get_router(input).await
    }

    pub async fn get_router_page(&self, input: GetRouterPageInput) -> DomainResult<RouterPage> {
        validate_tenant(&input.tenant)?;

        if input.page.limit == 0 {
            return Err(DomainError::InvalidPageRequest(
                "Page limit must be greater than zero".to_string(),
            ));
        }

        debug!(
            tenant = %input.tenant,
            limit = input.page.limit,
            page = input.page.page,
            "Getting router page"
        );

        let page = self.repository.get_router_page(input).await?;

        info!(
            count = page.routers.len(),
            last_page_index = page.last_page_index,
            "Listed routers"
        );
        Ok(page)
    }

    /// Remove routers by serial. Not atomic: a backend failure part way through
    /// leaves the earlier deletions applied.
    pub async fn delete_routers(&self, input: DeleteRoutersInput) -> DomainResult<()> {
        validate_tenant(&input.tenant)?;

        debug!(tenant = %input.tenant, count = input.serials.len(), "Deleting routers");

        self.repository.delete_routers(input).await?;

        info!("Routers deleted");
        Ok(())
    }
}

fn validate_tenant(tenant: &str) -> DomainResult<()> {
    if tenant.trim().is_empty() {
        return Err(DomainError::InvalidTenant(
            "Tenant cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockRouterRepository;
    use crate::router::PageRequest;

    #[tokio::test]
    async fn test_add_routers_passes_rejections_through() {
        let mut mock_repo = MockRouterRepository::new();

        let duplicate = Router::with_serial("SN-1");
        let rejected = vec![duplicate.clone()];

        mock_repo
            .expect_add_routers()
            .withf(|input: &AddRoutersInput| {
                input.tenant == "tenant-a" && input.routers.len() == 2
            })
            .times(1)
            .return_once(move |_| Ok(rejected));

        let service = RouterService::new(Arc::new(mock_repo));

        let result = service
            .add_routers(AddRoutersInput {
                tenant: "tenant-a".to_string(),
                routers: vec![duplicate.clone(), Router::with_serial("SN-2")],
            })
            .await;

        assert_eq!(result.unwrap(), vec![duplicate]);
    }

    #[tokio::test]
    async fn test_add_routers_empty_tenant() {
        let mock_repo = MockRouterRepository::new();
        let service = RouterService::new(Arc::new(mock_repo));

        let result = service
            .add_routers(AddRoutersInput {
                tenant: " ".to_string(),
                routers: vec![Router::with_serial("SN-1")],
            })
            .await;

        assert!(matches!(result, Err(DomainError::InvalidTenant(_))));
    }

    #[tokio::test]
    async fn test_get_router_not_found_is_none() {
        let mut mock_repo = MockRouterRepository::new();

        mock_repo
            .expect_get_router()
            .withf(|input: &GetRouterInput| input.serial == "SN-404")
            .times(1)
            .return_once(|_| Ok(None));

        let service = RouterService::new(Arc::new(mock_repo));

        let result = service
            .get_router(GetRouterInput {
                tenant: "tenant-a".to_string(),
                serial: "SN-404".to_string(),
            })
            .await;

        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_router_page_zero_limit_skips_repository() {
        let mock_repo = MockRouterRepository::new();
        let service = RouterService::new(Arc::new(mock_repo));

        let result = service
            .get_router_page(GetRouterPageInput {
                tenant: "tenant-a".to_string(),
                page: PageRequest {
                    limit: 0,
                    page: 0,
                    sort: String::new(),
                },
            })
            .await;

        assert!(matches!(result, Err(DomainError::InvalidPageRequest(_))));
    }

    #[tokio::test]
    async fn test_get_router_page_success() {
        let mut mock_repo = MockRouterRepository::new();

        mock_repo
            .expect_get_router_page()
            .withf(|input: &GetRouterPageInput| input.page.limit == 10 && input.page.page == 1)
            .times(1)
            .return_once(|_| {
                Ok(RouterPage {
                    routers: vec![Router::with_serial("SN-10")],
                    last_page_index: 1,
                })
            });

        let service = RouterService::new(Arc::new(mock_repo));

        let page = service
            .get_router_page(GetRouterPageInput {
                tenant: "tenant-a".to_string(),
                page: PageRequest {
                    limit: 10,
                    page: 1,
                    sort: "serial".to_string(),
                },
            })
            .await
            .unwrap();

        assert_eq!(page.routers.len(), 1);
        assert_eq!(page.last_page_index, 1);
    }

    #[tokio::test]
    async fn test_delete_routers_propagates_repository_error() {
        let mut mock_repo = MockRouterRepository::new();

        mock_repo
            .expect_delete_routers()
            .times(1)
            .return_once(|_| {
                Err(DomainError::RepositoryError(anyhow::anyhow!(
                    "connection reset"
                )))
            });

        let service = RouterService::new(Arc::new(mock_repo));

        let result = service
            .delete_routers(DeleteRoutersInput {
                tenant: "tenant-a".to_string(),
                serials: vec!["SN-1".to_string()],
            })
            .await;

        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }
}
