//! Request extractors shared by the services.
//!
//! `TenantContext` is the injected tenant scope: the identity boundary in
//! front of the services authenticates the caller and forwards the tenant in
//! `X-Tenant-ID`. Handlers receive it as a value and pass it explicitly into
//! every store call.

use crate::error::AppError;
use axum::extract::{FromRequest, FromRequestParts, Json, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Tenant scope extracted from request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid) -> Self {
        Self { tenant_id }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(TENANT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing X-Tenant-ID header")))?;

        let tenant_id = Uuid::parse_str(raw.trim()).map_err(|_| {
            AppError::BadRequest(anyhow::anyhow!("X-Tenant-ID must be a UUID"))
        })?;

        let span = tracing::Span::current();
        span.record("tenant_id", tracing::field::display(tenant_id));
        if let Some(user_id) = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            span.record("user_id", user_id);
        }

        Ok(TenantContext::new(tenant_id))
    }
}

/// JSON body that has been deserialized and passed `validator` checks.
///
/// Deserialization failures (unknown enum values, malformed decimals or
/// UUIDs) surface as `BadRequest`; rule failures as `ValidationError`.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(anyhow::anyhow!(rejection.body_text())))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}
