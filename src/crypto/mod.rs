pub mod password;
pub mod tokens;

pub use password::{hash_password, verify_password};
pub use tokens::{generate_csrf_token, generate_session_token, tokens_match};
