/// Middleware module
///
/// Role-based access control for protected resources.

mod access_control;

pub use access_control::{authorize, AccessControl};
