use axum::extract::State;
use axum::http::header::{HeaderMap, SET_COOKIE};
use axum::http::request::Parts;
use axum::Json;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;
use serde_json::json;

use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::extractors::{self, CurrentUser};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn session_cookie(state: &AppState, token: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        state.config.auth.cookie_name,
        token,
        state.config.auth.session_hours * 3600
    )
}

fn user_json(user: &CurrentUser) -> serde_json::Value {
    json!({
        "id": user.id,
        "email": user.email,
        "display_name": user.display_name,
        "is_admin": user.is_admin,
    })
}

/// Create a user, their profile row, and a session in one request.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<(HeaderMap, Json<serde_json::Value>)> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    if req.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }

    let hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("bcrypt: {}", e)))?;

    let conn = state.db.get()?;

    let user_id = uuid::Uuid::now_v7().to_string();
    let profile_id = uuid::Uuid::now_v7().to_string();
    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    // User and profile land together or not at all. The UNIQUE(email)
    // constraint is the authority on duplicates; a concurrent signup for the
    // same address fails here and maps to Conflict.
    conn.execute("BEGIN IMMEDIATE", [])?;
    let result: Result<(), rusqlite::Error> = (|| {
        conn.execute(
            "INSERT INTO users (id, email, password_hash) VALUES (?1, ?2, ?3)",
            params![user_id, email, hash],
        )?;
        conn.execute(
            "INSERT INTO user_profiles (id, user_id, display_name) VALUES (?1, ?2, ?3)",
            params![profile_id, user_id, display_name],
        )?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute("COMMIT", [])?;
        }
        Err(e) => {
            conn.execute("ROLLBACK", [])?;
            if is_constraint_violation(&e) {
                return Err(AppError::Conflict("Email already registered".into()));
            }
            return Err(e.into());
        }
    }
    drop(conn);

    let token = session::create_session(&state.db, &user_id, state.config.auth.session_hours)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        session_cookie(&state, &token)
            .parse()
            .map_err(|_| AppError::Internal("invalid cookie header".into()))?,
    );
    tracing::info!("New user signed up: {}", user_id);

    Ok((
        headers,
        Json(json!({
            "id": user_id,
            "email": email,
            "display_name": display_name,
            "is_admin": false,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<serde_json::Value>)> {
    let email = req.email.trim().to_lowercase();

    let conn = state.db.get()?;
    let row: Option<(String, String, bool, Option<String>)> = conn
        .query_row(
            "SELECT u.id, u.password_hash, u.is_admin, p.display_name
             FROM users u LEFT JOIN user_profiles p ON p.user_id = u.id
             WHERE u.email = ?1",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;
    drop(conn);

    let (user_id, hash, is_admin, display_name) = row.ok_or(AppError::Unauthorized)?;

    let valid = bcrypt::verify(&req.password, &hash)
        .map_err(|e| AppError::Internal(format!("bcrypt: {}", e)))?;
    if !valid {
        return Err(AppError::Unauthorized);
    }

    let token = session::create_session(&state.db, &user_id, state.config.auth.session_hours)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        session_cookie(&state, &token)
            .parse()
            .map_err(|_| AppError::Internal("invalid cookie header".into()))?,
    );

    Ok((
        headers,
        Json(json!({
            "id": user_id,
            "email": email,
            "display_name": display_name,
            "is_admin": is_admin,
        })),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    parts: Parts,
) -> AppResult<(HeaderMap, Json<serde_json::Value>)> {
    if let Some(token) = extractors::session_token(&parts, &state.config.auth.cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    // Expire the cookie client-side as well
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        format!(
            "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
            state.config.auth.cookie_name
        )
        .parse()
        .map_err(|_| AppError::Internal("invalid cookie header".into()))?,
    );

    Ok((headers, Json(json!({ "ok": true }))))
}

pub async fn me(user: CurrentUser) -> Json<serde_json::Value> {
    Json(user_json(&user))
}
