pub mod error;
pub mod in_memory_router_repository;
pub mod pagination;
pub mod repository;
pub mod router;
pub mod router_service;

#[cfg(any(test, feature = "testing"))]
pub mod conformance;

pub use error::{DomainError, DomainResult};
pub use in_memory_router_repository::{InMemoryRouterRepository, RouterKeyspace};
pub use pagination::PageWindow;
pub use repository::RouterRepository;
pub use router::*;
pub use router_service::RouterService;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use repository::MockRouterRepository;
