mod edge_store;

pub use edge_store::*;
