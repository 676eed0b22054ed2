use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::Authorizer;
use crate::error::ApiError;

/// Permission a route requires, paired with the checker that enforces it
#[derive(Clone, Debug)]
pub struct PermissionGuard {
    authorizer: Arc<Authorizer>,
    permission: &'static str,
}

impl PermissionGuard {
    pub fn new(authorizer: Arc<Authorizer>, permission: &'static str) -> Self {
        Self { authorizer, permission }
    }
}

/// Rejects the request unless its bearer token grants the guarded permission.
/// On success the caller's `Principal` is added to the request extensions.
pub async fn require_permission(
    State(guard): State<PermissionGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = guard
        .authorizer
        .authorize(request.headers(), guard.permission)
        .await?;

    tracing::debug!(
        "Granted '{}' to {}",
        guard.permission,
        principal.subject
    );

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
