/// Domain representation of a Router device record
/// Identity is (tenant, serial); every other field is descriptive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Router {
    pub serial: String,
    pub router_id: String,
    pub operator_name: String,
    pub country_code: String,
    pub mac: String,
    pub model: String,
    pub account_id: String,
    pub agent_last_connection: String,
    pub agent_version: String,
}

impl Router {
    /// Router carrying only its key, used for lookups and deletes
    pub fn with_serial(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            ..Default::default()
        }
    }
}

/// Requested page of a tenant's routers
/// `sort` is accepted for wire compatibility; paging always orders by serial
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub page: usize,
    pub sort: String,
}

/// One page of routers plus the index of the last valid page
/// `last_page_index` is -1 when the tenant has no routers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterPage {
    pub routers: Vec<Router>,
    pub last_page_index: i64,
}

/// Input for inserting a batch of routers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRoutersInput {
    pub tenant: String,
    pub routers: Vec<Router>,
}

/// Input for retrieving a single router by serial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRouterInput {
    pub tenant: String,
    pub serial: String,
}

/// Input for retrieving a page of routers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRouterPageInput {
    pub tenant: String,
    pub page: PageRequest,
}

/// Input for removing routers by serial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRoutersInput {
    pub tenant: String,
    pub serials: Vec<String>,
}
