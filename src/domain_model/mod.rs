mod friend;
mod snapshot;
mod status;
mod user;

pub use friend::*;
pub use snapshot::*;
pub use status::*;
pub use user::*;
