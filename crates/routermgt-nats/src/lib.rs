mod client;
mod conversions;
mod envelope;
mod error;
mod middleware;
mod queue_responder;
mod router_dispatch_service;
mod traits;

pub use client::*;
pub use envelope::*;
pub use error::DispatchError;
pub use middleware::*;
pub use queue_responder::*;
pub use router_dispatch_service::RouterDispatchService;
pub use traits::*;
