pub mod auth;
pub mod money;
pub mod tin;

pub use auth::{create_token, hash_password, verify_password, verify_token};
pub use money::parse_amount;
pub use tin::{format_tin, normalize_tin};
