use tokio_postgres::Row;

/// Router row as stored in the `routers` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterRow {
    pub tenant: String,
    pub router_serial: String,
    pub router_id: String,
    pub operator_name: String,
    pub iso_country_code: String,
    pub mac: String,
    pub router_model: String,
    pub account_id: String,
    pub agent_last_connection: String,
    pub agent_version: String,
}

impl From<&Row> for RouterRow {
    fn from(row: &Row) -> Self {
        RouterRow {
            tenant: row.get("tenant"),
            router_serial: row.get("router_serial"),
            router_id: row.get("router_id"),
            operator_name: row.get("operator_name"),
            iso_country_code: row.get("iso_country_code"),
            mac: row.get("mac"),
            router_model: row.get("router_model"),
            account_id: row.get("account_id"),
            agent_last_connection: row.get("agent_last_connection"),
            agent_version: row.get("agent_version"),
        }
    }
}
