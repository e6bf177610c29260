/// Authentication module
///
/// Password hashing, token issuance and verification, refresh and reset
/// token persistence, and the service that orchestrates the session flows.

mod claims;
mod identity;
mod jwt;
mod password;
pub mod refresh_token;
pub mod reset_token;
pub mod service;

pub use claims::Claims;
pub use identity::Identity;
pub use jwt::{SignedToken, TokenError, TokenIssuer};
pub use password::{PasswordHasher, DEFAULT_BCRYPT_COST};
pub use service::{AccessGrant, AuthService, AuthSession, TokenPair};
