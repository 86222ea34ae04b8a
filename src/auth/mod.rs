pub mod accounts;
pub mod extractor;
pub mod password;
pub mod tokens;

pub use extractor::AuthUser;
pub use tokens::{Claims, JwtKeys, TokenPair, TokenType};
