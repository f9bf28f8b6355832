use routermgt_domain::{PageRequest, Router};

use crate::envelope::{PageRequestMessage, RouterMessage};
use crate::error::DispatchError;

impl From<RouterMessage> for Router {
    fn from(message: RouterMessage) -> Self {
        Router {
            serial: message.router_serial,
            router_id: message.router_id,
            operator_name: message.operator_name,
            country_code: message.iso_country_code,
            mac: message.mac,
            model: message.router_model,
            account_id: message.account_id,
            agent_last_connection: message.agent_last_connection,
            agent_version: message.agent_version,
        }
    }
}

impl From<Router> for RouterMessage {
    fn from(router: Router) -> Self {
        RouterMessage {
            router_id: router.router_id,
            router_serial: router.serial,
            operator_name: router.operator_name,
            iso_country_code: router.country_code,
            mac: router.mac,
            router_model: router.model,
            account_id: router.account_id,
            agent_last_connection: router.agent_last_connection,
            agent_version: router.agent_version,
        }
    }
}

impl TryFrom<PageRequestMessage> for PageRequest {
    type Error = DispatchError;

    fn try_from(message: PageRequestMessage) -> Result<Self, Self::Error> {
        if message.limit <= 0 {
            return Err(DispatchError::InvalidRequest(format!(
                "limit must be positive, got {}",
                message.limit
            )));
        }

        let page = usize::try_from(message.page).map_err(|_| {
            DispatchError::InvalidRequest(format!(
                "page must not be negative, got {}",
                message.page
            ))
        })?;

        let limit = usize::try_from(message.limit).map_err(|_| {
            DispatchError::InvalidRequest(format!("limit {} out of range", message.limit))
        })?;

        Ok(PageRequest {
            limit,
            page,
            sort: message.sort,
        })
    }
}
