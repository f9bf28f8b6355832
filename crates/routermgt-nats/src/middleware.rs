mod dispatch_logging;
mod dispatch_types;

pub use dispatch_logging::*;
pub use dispatch_types::*;
