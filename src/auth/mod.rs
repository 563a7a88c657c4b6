mod helpers;
mod middleware;
mod password;
mod policy;
mod session;
mod token;

pub use helpers::extract_token_from_header;
pub use middleware::{AuthError, RequireUser};
pub use password::{Argon2Hasher, PasswordHasher};
pub use policy::{Actor, ensure_authenticated, validate_ownership};
pub use session::{MemorySessionStore, SessionStore, expiry};
pub use token::{generate_session_token, hash_session_token, parse_token};
