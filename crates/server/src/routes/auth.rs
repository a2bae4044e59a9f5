use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    middleware::auth::{SessionUser, SESSION_COOKIE},
    services::auth::{Identity, SESSION_TTL_DAYS},
    AppState,
};

/// Routes reachable without a session.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: Identity,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Identity,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: Identity,
    pub expires_at: DateTime<Utc>,
}

fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

async fn register(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<CredentialsRequest>, AppError>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let email = body.email.unwrap_or_default();
    let password = body.password.unwrap_or_default();

    let user = state.auth.register(&email, &password).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Account created successfully".to_string(),
            user,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<CredentialsRequest>, AppError>,
) -> Result<impl IntoResponse> {
    let email = body.email.filter(|s| !s.is_empty());
    let password = body.password.filter(|s| !s.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::Validation("Missing credentials".to_string()));
    };

    let user = state.auth.authenticate(&email, &password).await?;
    let session = state.auth.issue_session(&user)?;

    let cookie = session_cookie(&session.token, SESSION_TTL_DAYS * 24 * 60 * 60);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            token: session.token,
            expires_at: session.expires_at,
            user,
        }),
    ))
}

/// Tokens stay valid until they expire; this only drops the browser cookie.
async fn logout() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, session_cookie("", 0))],
    )
}

/// Served behind the session middleware.
pub async fn session(user: SessionUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: Identity {
            id: user.id,
            email: user.email,
        },
        expires_at: user.expires_at,
    })
}
