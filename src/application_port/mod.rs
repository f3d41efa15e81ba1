mod relationship_service;
mod status_service;

pub use relationship_service::*;
pub use status_service::*;
