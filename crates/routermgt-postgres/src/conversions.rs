use routermgt_domain::Router;

use crate::models::RouterRow;

/// Build the row to insert for a tenant's router
pub fn to_router_row(tenant: &str, router: Router) -> RouterRow {
    RouterRow {
        tenant: tenant.to_string(),
        router_serial: router.serial,
        router_id: router.router_id,
        operator_name: router.operator_name,
        iso_country_code: router.country_code,
        mac: router.mac,
        router_model: router.model,
        account_id: router.account_id,
        agent_last_connection: router.agent_last_connection,
        agent_version: router.agent_version,
    }
}

/// Convert database RouterRow to domain Router (tenant is implied by the query)
impl From<RouterRow> for Router {
    fn from(row: RouterRow) -> Self {
        Router {
            serial: row.router_serial,
            router_id: row.router_id,
            operator_name: row.operator_name,
            country_code: row.iso_country_code,
            mac: row.mac,
            model: row.router_model,
            account_id: row.account_id,
            agent_last_connection: row.agent_last_connection,
            agent_version: row.agent_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_round_trip_keeps_every_field() {
        let router = Router {
            serial: "SN-1".to_string(),
            router_id: "id-1".to_string(),
            operator_name: "Orange".to_string(),
            country_code: "FR".to_string(),
            mac: "00:1B:44:11:3A:B7".to_string(),
            model: "RX-300".to_string(),
            account_id: "acct-1".to_string(),
            agent_last_connection: "2023-06-17T10:00:00Z".to_string(),
            agent_version: "1.4.2".to_string(),
        };

        let row = to_router_row("tenant-a", router.clone());
        assert_eq!(row.tenant, "tenant-a");
        assert_eq!(row.iso_country_code, "FR");
        assert_eq!(row.router_model, "RX-300");

        assert_eq!(Router::from(row), router);
    }
}
