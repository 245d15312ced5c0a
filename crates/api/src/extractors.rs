//! Request extractors.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::{HeaderMap, header, request::Parts},
};
use mercado_common::AppError;
use mercado_core::{AttachmentUpload, RequestMeta};
use mercado_db::entities::user;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Authenticated user extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Authenticated moderator or admin.
#[derive(Debug, Clone)]
pub struct StaffUser(pub user::Model);

impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff() {
            return Err(AppError::Forbidden(
                "Moderator or admin role required".to_string(),
            ));
        }
        Ok(Self(user))
    }
}

/// Requester details recorded with privileged actions.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta(pub RequestMeta);

impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(request_meta(&parts.headers)))
    }
}

fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let ip = header_str("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| header_str("x-real-ip"))
        .map(ToString::to_string);

    RequestMeta {
        ip,
        user_agent: header_str(header::USER_AGENT.as_str()).map(ToString::to_string),
    }
}

/// JSON body whose rejections use the API error format.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(Self(value))
    }
}

/// A body given either as JSON or as `multipart/form-data` with files.
///
/// In multipart form the `data` or `payload` field carries the JSON object,
/// other text fields are merged into it as strings, and file parts become
/// uploads.
#[derive(Debug)]
pub struct FormWithFiles<T> {
    pub data: T,
    pub files: Vec<AttachmentUpload>,
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

impl<S, T> FromRequest<S> for FormWithFiles<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Json(data) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Ok(Self {
                data,
                files: vec![],
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let mut fields = Map::new();
        let mut files = Vec::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if field.file_name().is_some() || name == "files" || name == "files[]" {
                let file_name = field.file_name().unwrap_or("file").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                files.push(AttachmentUpload {
                    file_name,
                    content_type,
                    data,
                });
                continue;
            }

            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;

            match name.as_str() {
                "data" | "payload" => {
                    let Value::Object(object) = serde_json::from_str(&text)
                        .map_err(|e| AppError::BadRequest(format!("Invalid {name} field: {e}")))?
                    else {
                        return Err(AppError::BadRequest(format!(
                            "The {name} field must be a JSON object"
                        )));
                    };
                    fields.extend(object);
                }
                _ => {
                    fields.insert(name, Value::String(text));
                }
            }
        }

        let data = serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::BadRequest(format!("Invalid form data: {e}")))?;

        Ok(Self { data, files })
    }
}
