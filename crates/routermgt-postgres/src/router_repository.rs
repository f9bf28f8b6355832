use async_trait::async_trait;
use tracing::debug;

use routermgt_domain::{
    AddRoutersInput, DeleteRoutersInput, DomainError, DomainResult, GetRouterInput,
    GetRouterPageInput, PageWindow, Router, RouterPage, RouterRepository,
};

use crate::client::PostgresClient;
use crate::conversions::to_router_row;
use crate::models::RouterRow;

/// PostgreSQL implementation of RouterRepository trait
///
/// Batch writes issue one statement per router outside any transaction, so a
/// failure part way through a batch leaves the earlier rows applied.
#[derive(Clone)]
pub struct PostgresRouterRepository {
    client: PostgresClient,
}

impl PostgresRouterRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RouterRepository for PostgresRouterRepository {
    async fn add_routers(&self, input: AddRoutersInput) -> DomainResult<Vec<Router>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let statement = conn
            .prepare_cached(
                "INSERT INTO routers (tenant, router_serial, router_id, operator_name,
                                      iso_country_code, mac, router_model, account_id,
                                      agent_last_connection, agent_version)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                 ON CONFLICT (tenant, router_serial) DO NOTHING",
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let mut rejected = Vec::new();

        for router in input.routers {
            let row = to_router_row(&input.tenant, router.clone());

            let inserted = conn
                .execute(
                    &statement,
                    &[
                        &row.tenant,
                        &row.router_serial,
                        &row.router_id,
                        &row.operator_name,
                        &row.iso_country_code,
                        &row.mac,
                        &row.router_model,
                        &row.account_id,
                        &row.agent_last_connection,
                        &row.agent_version,
                    ],
                )
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;

            // Zero rows means the (tenant, serial) key already exists
            if inserted == 0 {
                debug!(tenant = %input.tenant, serial = %router.serial, "Router already exists");
                rejected.push(router);
            }
        }

        Ok(rejected)
    }

    async fn get_router(&self, input: GetRouterInput) -> DomainResult<Option<Router>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT tenant, router_serial, router_id, operator_name, iso_country_code, mac,
                        router_model, account_id, agent_last_connection, agent_version
                 FROM routers
                 WHERE tenant = $1 AND router_serial = $2",
                &[&input.tenant, &input.serial],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| RouterRow::from(&row).into()))
    }

    async fn get_router_page(&self, input: GetRouterPageInput) -> DomainResult<RouterPage> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let count: i64 = conn
            .query_one(
                "SELECT COUNT(*) FROM routers WHERE tenant = $1",
                &[&input.tenant],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?
            .get(0);

        let window = PageWindow::compute(count as usize, input.page.limit, input.page.page)?;

        if window.is_empty() {
            return Ok(RouterPage {
                routers: Vec::new(),
                last_page_index: window.last_page_index,
            });
        }

        // Byte-wise collation keeps the order identical to the in-memory keyspace
        let rows = conn
            .query(
                "SELECT tenant, router_serial, router_id, operator_name, iso_country_code, mac,
                        router_model, account_id, agent_last_connection, agent_version
                 FROM routers
                 WHERE tenant = $1
                 ORDER BY router_serial COLLATE \"C\" ASC
                 LIMIT $2 OFFSET $3",
                &[&input.tenant, &(window.size as i64), &(window.offset as i64)],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let routers: Vec<Router> = rows
            .iter()
            .map(|row| RouterRow::from(row).into())
            .collect();

        debug!(
            "Found {} of {} routers for tenant: {}",
            routers.len(),
            count,
            input.tenant
        );

        Ok(RouterPage {
            routers,
            last_page_index: window.last_page_index,
        })
    }

    async fn delete_routers(&self, input: DeleteRoutersInput) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let statement = conn
            .prepare_cached("DELETE FROM routers WHERE tenant = $1 AND router_serial = $2")
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        for serial in &input.serials {
            let deleted = conn
                .execute(&statement, &[&input.tenant, serial])
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;

            debug!(tenant = %input.tenant, serial = %serial, deleted, "Deleted router");
        }

        Ok(())
    }
}
