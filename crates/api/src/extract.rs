//! Tenant-scoping extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use meridian_core::types::{TenantId, UserId};

use crate::error::AppError;

/// The workspace a request acts on, extracted from the `X-Tenant-Id`
/// header, plus the acting user from the optional `X-User-Id` header.
///
/// Use this as an extractor parameter in any handler that touches
/// tenant-owned data:
///
/// ```ignore
/// async fn my_handler(ctx: TenantCtx) -> AppResult<Json<()>> {
///     tracing::info!(tenant_id = %ctx.tenant_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TenantCtx {
    pub tenant_id: TenantId,
    pub user_id: Option<UserId>,
}

impl<S> FromRequestParts<S> for TenantCtx
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header_uuid(parts, "x-tenant-id")?
            .ok_or_else(|| AppError::BadRequest("Missing X-Tenant-Id header".into()))?;
        let user_id = header_uuid(parts, "x-user-id")?;

        Ok(TenantCtx { tenant_id, user_id })
    }
}

fn header_uuid(parts: &Parts, name: &'static str) -> Result<Option<uuid::Uuid>, AppError> {
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Some)
        .ok_or_else(|| AppError::BadRequest(format!("{name} must be a UUID")))
}
