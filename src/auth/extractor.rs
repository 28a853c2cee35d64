//! Actix-web extractor for session authentication.

use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use std::future::{ready, Ready};

use super::bearer_token;
use crate::error::ErrorResponse;
use crate::models::User;
use crate::services::SessionRegistry;

/// Authentication error for extractors.
#[derive(Debug)]
pub struct AuthError {
    message: String,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ResponseError for AuthError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::UNAUTHORIZED).json(ErrorResponse {
            error: "UNAUTHORIZED".to_string(),
            message: self.message.clone(),
        })
    }
}

/// Extractor that requires a live session.
///
/// Use this in handlers that require authentication:
/// ```ignore
/// async fn protected_handler(auth: SessionAuth) -> impl Responder {
///     // auth.user is the authenticated account, auth.token its session
/// }
/// ```
pub struct SessionAuth {
    pub user: User,
    pub token: String,
}

impl FromRequest for SessionAuth {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let registry = match req.app_data::<web::Data<SessionRegistry>>() {
            Some(registry) => registry,
            None => {
                return ready(Err(AuthError {
                    message: "Internal configuration error".to_string(),
                }));
            }
        };

        let token = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token);

        match token {
            Some(token) => match registry.current_user(token) {
                Some(user) => ready(Ok(SessionAuth {
                    user,
                    token: token.to_string(),
                })),
                None => ready(Err(AuthError {
                    message: "Invalid or expired session token".to_string(),
                })),
            },
            None => ready(Err(AuthError {
                message: "Missing session token. Provide Authorization: Bearer <token>."
                    .to_string(),
            })),
        }
    }
}
