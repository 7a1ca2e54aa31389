//! API Middleware
//!
//! Client authentication, acting-user resolution and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::domain::{Actor, OperationContext, Role};
use crate::error::AppError;
use crate::store::{hash_api_key, Store, StoreError};

use super::AppState;

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const REQUEST_USER_HEADER: &str = "X-Request-User-Id";
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

/// API Key authentication result
#[derive(Debug, Clone)]
pub struct AuthenticatedApiKey {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<String>,
}

impl AuthenticatedApiKey {
    /// Check if this API key has a specific permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission || p == "admin")
    }
}

// =========================================================================
// API Key Authentication Middleware
// =========================================================================

/// Authenticate the calling application and resolve the acting user.
///
/// The X-API-Key header identifies the client application. The optional
/// X-Request-User-Id header names the end user the client acts for; it must
/// refer to a registered user, whose role decides the resulting [`Actor`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let raw_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::MissingApiKey)?;

    let api_key = state
        .store
        .find_api_key(&hash_api_key(raw_key))
        .await?
        .ok_or(AppError::InvalidApiKey)?;

    if !api_key.is_active {
        tracing::warn!(api_key = %api_key.name, "Rejected disabled API key");
        return Err(AppError::ApiKeyDisabled);
    }

    let correlation_id = headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let mut context = OperationContext::new()
        .with_api_key(api_key.id)
        .with_correlation_id(correlation_id);

    if let Some(raw_user_id) = headers.get(REQUEST_USER_HEADER) {
        let user_id = raw_user_id
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                AppError::InvalidRequest(format!("{} must be a UUID", REQUEST_USER_HEADER))
            })?;
        let actor = resolve_actor(state.store.as_ref(), user_id).await?;
        context = context.with_actor(actor);
    }

    request.extensions_mut().insert(AuthenticatedApiKey {
        id: api_key.id,
        name: api_key.name,
        permissions: api_key.permissions,
    });
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    Ok(response)
}

/// Map a user id to the actor it acts as
async fn resolve_actor(store: &dyn Store, user_id: Uuid) -> Result<Actor, AppError> {
    let user = store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::UnknownUser(user_id.to_string()))?;

    let actor = match user.role {
        Role::Student => {
            let student = store
                .get_student_by_user(user.id)
                .await?
                .ok_or_else(|| StoreError::corrupt("students", format!("no profile for user {}", user.id)))?;
            Actor::Student {
                user_id: user.id,
                student_id: student.id,
            }
        }
        Role::Educator => {
            let educator = store
                .get_educator_by_user(user.id)
                .await?
                .ok_or_else(|| StoreError::corrupt("educators", format!("no profile for user {}", user.id)))?;
            Actor::Educator {
                user_id: user.id,
                educator_id: educator.id,
            }
        }
        Role::Admin => Actor::Admin { user_id: user.id },
    };

    Ok(actor)
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &[
    "x-api-key",
    "authorization",
    "cookie",
    "set-cookie",
];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let masked_value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());
    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    // Set by auth_middleware, or echoed from the client
    let correlation_id = response
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_headers_for_logging() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("x-api-key", "secret-key-12345".parse().unwrap());
        headers.insert("x-request-user-id", "user-123".parse().unwrap());

        let masked = mask_headers_for_logging(&headers);

        let api_key = masked.iter().find(|(k, _)| k == "x-api-key");
        let content_type = masked.iter().find(|(k, _)| k == "content-type");
        let user_id = masked.iter().find(|(k, _)| k == "x-request-user-id");

        assert_eq!(api_key.unwrap().1, "[REDACTED]");
        assert_eq!(content_type.unwrap().1, "application/json");
        assert_eq!(user_id.unwrap().1, "user-123");
    }

    #[test]
    fn test_admin_permission_implies_all() {
        let key = AuthenticatedApiKey {
            id: Uuid::new_v4(),
            name: "ops-console".to_string(),
            permissions: vec!["admin".to_string()],
        };
        assert!(key.has_permission("gateway"));

        let key = AuthenticatedApiKey {
            permissions: vec!["read".to_string()],
            ..key
        };
        assert!(key.has_permission("read"));
        assert!(!key.has_permission("gateway"));
    }

    #[tokio::test]
    async fn test_resolve_actor_by_role() {
        use crate::domain::{Student, User};
        use crate::store::InMemoryStore;
        use crate::audit::{AuditAction, AuditRecord};
        use chrono::Utc;

        let store = InMemoryStore::new();
        let user = User::register(
            "kim@student.example",
            "Kim".to_string(),
            "Lee".to_string(),
            None,
            Role::Student,
            Utc::now(),
        )
        .unwrap();
        let student = Student::for_user(&user);
        let audit = AuditRecord::new(
            AuditAction::UserRegistered,
            "user",
            user.id,
            &OperationContext::new(),
        );
        store.register_student(&user, &student, &audit).await.unwrap();

        let actor = resolve_actor(&store, user.id).await.unwrap();
        assert_eq!(
            actor,
            Actor::Student {
                user_id: user.id,
                student_id: student.id
            }
        );

        let err = resolve_actor(&store, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::UnknownUser(_)));
    }
}
