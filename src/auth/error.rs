use std::fmt::Display;

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    KeyFetch(String),
    RateLimitExceeded,
}

impl Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AuthError {}
