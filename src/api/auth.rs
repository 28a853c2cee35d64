//! Session endpoints: login, logout, current user.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::SessionAuth;
use crate::error::AppResult;
use crate::models::User;
use crate::services::SessionRegistry;

/// Login request body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response: bearer token plus the account it belongs to.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Authenticate and open a session.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    registry: web::Data<SessionRegistry>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let (token, user) = registry.login(&body.username, &body.password)?;
    Ok(HttpResponse::Ok().json(LoginResponse { token, user }))
}

/// Destroy the current session.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    security(("session_token" = [])),
    responses(
        (status = 204, description = "Session closed"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout(
    registry: web::Data<SessionRegistry>,
    auth: SessionAuth,
) -> AppResult<HttpResponse> {
    registry.logout(&auth.token);
    Ok(HttpResponse::NoContent().finish())
}

/// The account behind the presented token.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    security(("session_token" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(auth: SessionAuth) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(auth.user))
}

/// Configure auth routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/auth/login").route(web::post().to(login)))
        .service(web::resource("/auth/logout").route(web::post().to(logout)))
        .service(web::resource("/auth/me").route(web::get().to(me)));
}
