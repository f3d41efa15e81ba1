mod edge_store_memory;

pub use edge_store_memory::*;
