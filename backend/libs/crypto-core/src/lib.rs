//! Credential primitives shared by Nova services.
//!
//! Only bearer-token handling lives here; message payloads are ciphertext
//! produced on the clients and never decrypted server-side.

pub mod jwt;

pub use jwt::{Claims, JwtError, JwtKeys, TokenKind};
