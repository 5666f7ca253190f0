pub mod error;
pub mod keycache;
pub mod service;
pub mod types;

pub use error::AuthError;
pub use keycache::KeyCache;
pub use service::Auth;
pub use types::{Claims, Identity};
