mod consistency_coordinator;
mod friendship_cache;
mod status_resolver;

pub use consistency_coordinator::*;
pub use friendship_cache::*;
pub use status_resolver::*;
