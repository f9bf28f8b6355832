use async_trait::async_trait;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::DomainResult;
use crate::pagination::PageWindow;
use crate::repository::RouterRepository;
use crate::router::{
    AddRoutersInput, DeleteRoutersInput, GetRouterInput, GetRouterPageInput, Router, RouterPage,
};

/// Tenant -> serial -> router. The inner BTreeMap keeps each tenant ordered by serial.
pub type RouterKeyspace = HashMap<String, BTreeMap<String, Router>>;

/// In-memory implementation of RouterRepository
///
/// Reads share the lock; each batch write holds the write guard for the whole batch.
#[derive(Clone)]
pub struct InMemoryRouterRepository {
    keyspace: Arc<RwLock<RouterKeyspace>>,
}

impl InMemoryRouterRepository {
    pub fn new() -> Self {
        Self::with_keyspace(Arc::new(RwLock::new(HashMap::new())))
    }

    /// Build a repository over an existing keyspace and its lock
    pub fn with_keyspace(keyspace: Arc<RwLock<RouterKeyspace>>) -> Self {
        Self { keyspace }
    }
}

impl Default for InMemoryRouterRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouterRepository for InMemoryRouterRepository {
    async fn add_routers(&self, input: AddRoutersInput) -> DomainResult<Vec<Router>> {
        let mut keyspace = self.keyspace.write().await;

        let routers = keyspace.entry(input.tenant.clone()).or_default();
        let mut rejected = Vec::new();

        for router in input.routers {
            match routers.entry(router.serial.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(router);
                }
                Entry::Occupied(_) => rejected.push(router),
            }
        }

        let tenant_is_empty = routers.is_empty();
        if tenant_is_empty {
            keyspace.remove(&input.tenant);
        }

        debug!(
            tenant = %input.tenant,
            rejected = rejected.len(),
            "Added routers to in-memory keyspace"
        );

        Ok(rejected)
    }

    async fn get_router(&self, input: GetRouterInput) -> DomainResult<Option<Router>> {
        let keyspace = self.keyspace.read().await;

        Ok(keyspace
            .get(&input.tenant)
            .and_then(|routers| routers.get(&input.serial))
            .cloned())
    }

    async fn get_router_page(&self, input: GetRouterPageInput) -> DomainResult<RouterPage> {
        let keyspace = self.keyspace.read().await;

        let routers = keyspace.get(&input.tenant);
        let count = routers.map_or(0, BTreeMap::len);
        let window = PageWindow::compute(count, input.page.limit, input.page.page)?;

        let page = match routers {
            Some(routers) if !window.is_empty() => routers
                .values()
                .skip(window.offset)
                .take(window.size)
                .cloned()
                .collect(),
            _ => Vec::new(),
        };

        debug!(
            tenant = %input.tenant,
            count,
            returned = page.len(),
            last_page_index = window.last_page_index,
            "Read router page from in-memory keyspace"
        );

        Ok(RouterPage {
            routers: page,
            last_page_index: window.last_page_index,
        })
    }

    async fn delete_routers(&self, input: DeleteRoutersInput) -> DomainResult<()> {
        let mut keyspace = self.keyspace.write().await;

        if let Some(routers) = keyspace.get_mut(&input.tenant) {
            for serial in &input.serials {
                routers.remove(serial);
            }
            if routers.is_empty() {
                keyspace.remove(&input.tenant);
            }
        }

        Ok(())
    }
}
