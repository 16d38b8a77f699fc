pub mod generator;
mod service;

pub use generator::generate_hex;
pub use service::{IssuedToken, TokenError, TokenKind, TokenService, VerifiedClaims};
