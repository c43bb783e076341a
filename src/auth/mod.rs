//! Token validation for the admission boundary

pub mod token;

// Re-export main components
pub use token::{extract_bearer_token, Claims, TokenManager};
