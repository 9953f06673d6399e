use crate::error::EngineError;
use crate::models::{ErrorResponse, Viewer, ViewerRole};
use actix_web::{dev::Payload, http::StatusCode, web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims carried by a bearer token issued by the auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: ViewerRole,
    pub exp: usize,
}

impl From<Claims> for Viewer {
    fn from(claims: Claims) -> Self {
        Self {
            viewer_id: claims.sub,
            role: claims.role,
        }
    }
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Token verification is not configured")]
    NotConfigured,
}

impl ResponseError for ViewerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ViewerError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: "unauthorized".to_string(),
            message: self.to_string(),
            status_code: self.status_code().as_u16(),
            retryable: false,
        })
    }
}

/// HS256 verifier for viewer tokens
#[derive(Clone)]
pub struct ViewerAuth {
    key: DecodingKey,
    validation: Validation,
}

impl ViewerAuth {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn decode(&self, token: &str) -> Result<Viewer, ViewerError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims.into())
    }

    fn viewer_from(&self, req: &HttpRequest) -> Result<Viewer, ViewerError> {
        let token = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ViewerError::MissingToken)?;

        self.decode(token)
    }
}

/// Viewer extracted from the request's bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedViewer(pub Viewer);

impl FromRequest for AuthenticatedViewer {
    type Error = ViewerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<ViewerAuth>>() {
            Some(auth) => auth.viewer_from(req).map(AuthenticatedViewer),
            None => Err(ViewerError::NotConfigured),
        };

        if let Err(e) = &result {
            tracing::info!("Rejected request to {}: {}", req.path(), e);
        }

        ready(result)
    }
}

/// A talent may act on its own id, a service on anything
pub fn ensure_talent_access(viewer: &Viewer, talent_id: &str) -> Result<(), EngineError> {
    match viewer.role {
        ViewerRole::Service => Ok(()),
        ViewerRole::Talent if viewer.viewer_id == talent_id => Ok(()),
        _ => Err(EngineError::Forbidden(format!(
            "viewer {} may not access matches of talent {}",
            viewer.viewer_id, talent_id
        ))),
    }
}

/// A founder may act on its own id, a service on anything
pub fn ensure_founder_access(viewer: &Viewer, founder_id: &str) -> Result<(), EngineError> {
    match viewer.role {
        ViewerRole::Service => Ok(()),
        ViewerRole::Founder if viewer.viewer_id == founder_id => Ok(()),
        _ => Err(EngineError::Forbidden(format!(
            "viewer {} may not access matches of founder {}",
            viewer.viewer_id, founder_id
        ))),
    }
}

pub fn ensure_service(viewer: &Viewer) -> Result<(), EngineError> {
    if viewer.role == ViewerRole::Service {
        Ok(())
    } else {
        Err(EngineError::Forbidden("service principal required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, role: ViewerRole, exp: usize) -> String {
        let claims = Claims { sub: sub.to_string(), role, exp };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn future_exp() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn test_decode_valid_token() {
        let auth = ViewerAuth::new("secret", None);
        let viewer = auth.decode(&token("secret", "t1", ViewerRole::Talent, future_exp())).unwrap();
        assert_eq!(viewer.viewer_id, "t1");
        assert_eq!(viewer.role, ViewerRole::Talent);
    }

    #[test]
    fn test_reject_wrong_secret_and_expired() {
        let auth = ViewerAuth::new("secret", None);
        assert!(auth.decode(&token("other", "t1", ViewerRole::Talent, future_exp())).is_err());
        assert!(auth.decode(&token("secret", "t1", ViewerRole::Talent, 1_000)).is_err());
    }

    #[test]
    fn test_access_rules() {
        let talent = Viewer { viewer_id: "t1".to_string(), role: ViewerRole::Talent };
        let founder = Viewer { viewer_id: "f1".to_string(), role: ViewerRole::Founder };
        let service = Viewer { viewer_id: "fn".to_string(), role: ViewerRole::Service };

        assert!(ensure_talent_access(&talent, "t1").is_ok());
        assert!(ensure_talent_access(&talent, "t2").is_err());
        assert!(ensure_talent_access(&founder, "f1").is_err());
        assert!(ensure_founder_access(&founder, "f1").is_ok());
        assert!(ensure_founder_access(&service, "f9").is_ok());
        assert!(ensure_service(&founder).is_err());
        assert!(ensure_service(&service).is_ok());
    }
}
