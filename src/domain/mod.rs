/// Domain model
///
/// Users, stores (tenants) and the roles that gate access.

mod role;
mod store;
mod user;

pub use role::{Role, RoleSet};
pub use store::{Store, DEFAULT_PLAN};
pub use user::{PublicUser, User};
pub(crate) use user::UserRow;
