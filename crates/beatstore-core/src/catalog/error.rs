//! Error types for the catalog API

use thiserror::Error;

/// Errors returned by [`CatalogClient`](super::CatalogClient)
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Server returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 401/403; the client has already forgotten its token
    #[error("Not signed in or session expired")]
    Unauthorized,

    #[error("Backend is not reachable: {0}")]
    Transport(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Whether signing in again could fix it
    pub fn needs_login(&self) -> bool {
        matches!(self, CatalogError::Unauthorized)
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
