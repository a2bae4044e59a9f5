use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::{
    db::models::{Project, ProjectWithTasks, Task},
    error::{AppError, Result},
    middleware::auth::SessionUser,
    services::board::{parse_task_title, NewProject},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/:id", get(get_project))
        .route("/:id/tasks", post(create_task))
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
}

async fn list_projects(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Json<Vec<ProjectWithTasks>>> {
    let projects = state.board.list_projects(&user.id).await?;
    Ok(Json(projects))
}

async fn create_project(
    State(state): State<AppState>,
    user: SessionUser,
    WithRejection(Json(body), _): WithRejection<Json<CreateProjectRequest>, AppError>,
) -> Result<(StatusCode, Json<Project>)> {
    let input = NewProject::parse(body.name.as_deref(), body.description.as_deref())?;
    let project = state.board.create_project(&user.id, input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<AppState>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<ProjectWithTasks>> {
    let project = state.board.get_project(&user.id, &id).await?;
    Ok(Json(project))
}

async fn create_task(
    State(state): State<AppState>,
    user: SessionUser,
    Path(project_id): Path<String>,
    WithRejection(Json(body), _): WithRejection<Json<CreateTaskRequest>, AppError>,
) -> Result<(StatusCode, Json<Task>)> {
    let title = parse_task_title(body.title.as_deref())?;
    let task = state.board.create_task(&user.id, &project_id, title).await?;
    Ok((StatusCode::CREATED, Json(task)))
}
