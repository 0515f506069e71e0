//! Caller identity.
//!
//! Requests carry an HS256 JWT as `Authorization: Bearer <token>` whose `sub`
//! is the CRM user and whose `roles` list that user's roles. In dev mode every
//! request runs as the configured dev user.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::routes::AppState;

/// The superuser account, allowed regardless of roles.
pub const ADMINISTRATOR: &str = "Administrator";

/// Roles that may use the assistant.
pub const APP_ROLES: &[&str] = &["System Manager", "Sales User", "Sales Manager"];

/// JWT claims accepted from callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize,
}

/// Authenticated caller, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    /// Whether this caller may use the assistant at all.
    pub fn has_app_permission(&self) -> bool {
        self.user == ADMINISTRATOR || self.roles.iter().any(|r| APP_ROLES.contains(&r.as_str()))
    }
}

pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(AuthUser {
        user: data.claims.sub,
        roles: data.claims.roles,
    })
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller and enforce the app permission.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth = &state.config.auth;

    let user = if !auth.auth_required(state.config.dev_mode) {
        AuthUser {
            user: auth.dev_user.clone(),
            roles: vec!["System Manager".to_string()],
        }
    } else {
        let Some(secret) = auth.jwt_secret.as_deref() else {
            tracing::error!("Rejecting request: no JWT secret configured outside dev mode");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication is not configured".to_string(),
            )
                .into_response();
        };
        let Some(token) = bearer_token(&req) else {
            return (StatusCode::UNAUTHORIZED, "Missing bearer token".to_string()).into_response();
        };
        match verify_token(token, secret) {
            Ok(user) => user,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected caller token");
                return (StatusCode::UNAUTHORIZED, "Invalid token".to_string()).into_response();
            }
        }
    };

    if !user.has_app_permission() {
        tracing::warn!(user = %user.user, "Caller lacks permission to use the assistant");
        return (
            StatusCode::FORBIDDEN,
            "You do not have permission to use the CRM assistant".to_string(),
        )
            .into_response();
    }

    req.extensions_mut().insert(user);
    next.run(req).await
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Claims;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub(crate) fn token(user: &str, roles: &[&str], secret: &str) -> String {
        let claims = Claims {
            sub: user.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .expect("encode token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, roles: &[&str]) -> AuthUser {
        AuthUser {
            user: name.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn app_permission_follows_roles() {
        assert!(user(ADMINISTRATOR, &[]).has_app_permission());
        assert!(user("sales@example.com", &["Sales User"]).has_app_permission());
        assert!(user("boss@example.com", &["Employee", "Sales Manager"]).has_app_permission());
        assert!(!user("guest@example.com", &["Guest"]).has_app_permission());
    }

    #[test]
    fn tokens_verify_against_secret() {
        let token = testing::token("sales@example.com", &["Sales User"], "s3cret");
        let verified = verify_token(&token, "s3cret").expect("valid token");
        assert_eq!(verified, user("sales@example.com", &["Sales User"]));

        assert!(verify_token(&token, "other").is_err());
        assert!(verify_token("garbage", "s3cret").is_err());
    }
}
