use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{patch, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::{
    db::models::Task,
    error::{AppError, Result},
    middleware::auth::SessionUser,
    services::board::parse_task_title,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_task))
        .route("/:id", patch(toggle_task))
}

/// Older clients name the project in the body instead of the path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub project_id: Option<String>,
}

async fn create_task(
    State(state): State<AppState>,
    user: SessionUser,
    WithRejection(Json(body), _): WithRejection<Json<CreateTaskRequest>, AppError>,
) -> Result<(StatusCode, Json<Task>)> {
    let project_id = body
        .project_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::Validation("The project of the task is mandatory".to_string()))?;
    let title = parse_task_title(body.title.as_deref())?;

    let task = state.board.create_task(&user.id, &project_id, title).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn toggle_task(
    State(state): State<AppState>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<Task>> {
    let task = state.board.toggle_task(&user.id, &id).await?;
    Ok(Json(task))
}
