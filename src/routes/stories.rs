use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{Comment, Story};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser};
use crate::state::AppState;

#[derive(Deserialize)]
struct CreateStoryRequest {
    title: String,
    content: String,
}

#[derive(Deserialize)]
struct AddCommentRequest {
    content: String,
}

/// All stories, newest first. A signed-in viewer gets their like annotation.
async fn list_stories(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
) -> AppResult<Json<Vec<Story>>> {
    let viewer = maybe_user.0.as_ref().map(|u| u.id.as_str());
    let stories = state.stories.list(viewer).await?;
    Ok(Json(stories))
}

async fn create_story(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateStoryRequest>,
) -> AppResult<(StatusCode, Json<Story>)> {
    let story = state.stories.create(&user.id, &req.title, &req.content).await?;
    Ok((StatusCode::CREATED, Json(story)))
}

async fn delete_story(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(story_id): Path<String>,
) -> AppResult<StatusCode> {
    state.stories.delete(&user.id, &story_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(story_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let liked = state.stories.toggle_like(&user.id, &story_id).await?;
    Ok(Json(json!({ "liked": liked })))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
) -> AppResult<Json<Vec<Comment>>> {
    let comments = state.stories.list_comments(&story_id).await?;
    Ok(Json(comments))
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(story_id): Path<String>,
    Json(req): Json<AddCommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .stories
        .add_comment(&user.id, &story_id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(comment_id): Path<String>,
) -> AppResult<StatusCode> {
    state.stories.delete_comment(&user.id, &comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/stories", get(list_stories).post(create_story))
        .route("/api/stories/{id}", delete(delete_story))
        .route("/api/stories/{id}/like", post(toggle_like))
        .route(
            "/api/stories/{id}/comments",
            get(list_comments).post(add_comment),
        )
        .route("/api/comments/{id}", delete(delete_comment))
}
