mod edge_store_mysql;

pub use edge_store_mysql::*;

mod util;
