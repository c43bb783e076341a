//! Authentication of WebSocket upgrade requests

use std::sync::Arc;

use warp::http::HeaderMap;
use warp::{Filter, Rejection};

use crate::auth::token::{extract_bearer_token, TokenManager};
use crate::core::client::Identity;
use crate::error::ChatHubError;

/// Rejection carrying the reason a request could not be authenticated
#[derive(Debug)]
pub struct Unauthorized(pub String);

impl warp::reject::Reject for Unauthorized {}

/// Extract the token from the Authorization header, falling back to X-Auth-Token
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = extract_bearer_token(auth_str) {
                log::debug!("Token extracted from Authorization header");
                return Some(token);
            }
        }
    }

    if let Some(custom_header) = headers.get("x-auth-token") {
        if let Ok(token_str) = custom_header.to_str() {
            log::debug!("Token extracted from X-Auth-Token header");
            return Some(token_str.trim().to_string());
        }
    }

    None
}

/// Resolve the identity of a request from its headers
pub fn authenticate(headers: &HeaderMap, tokens: &TokenManager) -> Result<Identity, ChatHubError> {
    let token = extract_token(headers).ok_or(ChatHubError::Unauthorized)?;
    tokens.authenticate(&token)
}

/// Filter that yields the caller's identity or rejects with [`Unauthorized`]
pub fn with_identity(
    tokens: Arc<TokenManager>,
) -> impl Filter<Extract = (Identity,), Error = Rejection> + Clone {
    warp::header::headers_cloned().and_then(move |headers: HeaderMap| {
        let tokens = tokens.clone();
        async move {
            authenticate(&headers, &tokens).map_err(|e| {
                log::warn!("Rejected WebSocket upgrade: {}", e);
                warp::reject::custom(Unauthorized(e.to_string()))
            })
        }
    })
}
