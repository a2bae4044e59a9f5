//! Project and task persistence, scoped to the calling owner.
//!
//! Nothing in here distinguishes "does not exist" from "belongs to someone
//! else": both come back as [`AppError::NotFound`].

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    db::{
        self,
        models::{Project, ProjectWithTasks, Task},
        Database,
    },
    error::{AppError, Result},
};

pub const PROJECT_NAME_MAX: usize = 50;
pub const PROJECT_DESCRIPTION_MAX: usize = 200;
pub const TASK_TITLE_MAX: usize = 100;

/// Validated project fields, already trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub description: String,
}

impl NewProject {
    pub fn parse(name: Option<&str>, description: Option<&str>) -> Result<Self> {
        let name = name.map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(AppError::Validation(
                "The name of the project is mandatory".to_string(),
            ));
        }
        if name.chars().count() > PROJECT_NAME_MAX {
            return Err(AppError::Validation(format!(
                "The name of the project must be at most {PROJECT_NAME_MAX} characters"
            )));
        }

        let description = description.map(str::trim).unwrap_or_default();
        if description.chars().count() > PROJECT_DESCRIPTION_MAX {
            return Err(AppError::Validation(format!(
                "The description must be at most {PROJECT_DESCRIPTION_MAX} characters"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
        })
    }
}

/// Trims and bounds a task title.
pub fn parse_task_title(title: Option<&str>) -> Result<String> {
    let title = title.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(AppError::Validation(
            "The title of the task is mandatory".to_string(),
        ));
    }
    if title.chars().count() > TASK_TITLE_MAX {
        return Err(AppError::Validation(format!(
            "The title of the task must be at most {TASK_TITLE_MAX} characters"
        )));
    }
    Ok(title.to_string())
}

#[derive(Clone)]
pub struct Board {
    db: Database,
}

impl Board {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Newest project first; tasks oldest first.
    pub async fn list_projects(&self, owner_id: &str) -> Result<Vec<ProjectWithTasks>> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, description, owner_id, created_at
            FROM projects
            WHERE owner_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db.pool)
        .await?;

        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT t.id, t.title, t.done, t.project_id, t.created_at
            FROM tasks t
            JOIN projects p ON t.project_id = p.id
            WHERE p.owner_id = ?
            ORDER BY t.created_at ASC, t.rowid ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db.pool)
        .await?;

        let mut by_project: HashMap<String, Vec<Task>> = HashMap::new();
        for task in tasks {
            by_project
                .entry(task.project_id.clone())
                .or_default()
                .push(task);
        }

        Ok(projects
            .into_iter()
            .map(|project| {
                let tasks = by_project.remove(&project.id).unwrap_or_default();
                ProjectWithTasks { project, tasks }
            })
            .collect())
    }

    pub async fn create_project(&self, owner_id: &str, input: NewProject) -> Result<Project> {
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            owner_id: owner_id.to_string(),
            created_at: db::timestamp(),
        };

        sqlx::query(
            "INSERT INTO projects (id, name, description, owner_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.owner_id)
        .bind(&project.created_at)
        .execute(&self.db.pool)
        .await?;

        tracing::info!(project_id = %project.id, owner_id, "created project");
        Ok(project)
    }

    pub async fn get_project(&self, owner_id: &str, project_id: &str) -> Result<ProjectWithTasks> {
        let project = self.owned_project(owner_id, project_id).await?;

        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, title, done, project_id, created_at
            FROM tasks
            WHERE project_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(&project.id)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(ProjectWithTasks { project, tasks })
    }

    pub async fn create_task(&self, owner_id: &str, project_id: &str, title: String) -> Result<Task> {
        let project = self.owned_project(owner_id, project_id).await?;

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title,
            done: false,
            project_id: project.id,
            created_at: db::timestamp(),
        };

        sqlx::query(
            "INSERT INTO tasks (id, title, done, project_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&task.title)
        .bind(task.done)
        .bind(&task.project_id)
        .bind(&task.created_at)
        .execute(&self.db.pool)
        .await?;

        tracing::debug!(task_id = %task.id, project_id = %task.project_id, "created task");
        Ok(task)
    }

    /// Flips `done` in one statement, so concurrent toggles never lose a flip.
    pub async fn toggle_task(&self, owner_id: &str, task_id: &str) -> Result<Task> {
        sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET done = NOT done
            WHERE id = ?
              AND project_id IN (SELECT id FROM projects WHERE owner_id = ?)
            RETURNING id, title, done, project_id, created_at
            "#,
        )
        .bind(task_id)
        .bind(owner_id)
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or(AppError::NotFound("Task"))
    }

    async fn owned_project(&self, owner_id: &str, project_id: &str) -> Result<Project> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, description, owner_id, created_at
            FROM projects
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(project_id)
        .bind(owner_id)
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or(AppError::NotFound("Project"))
    }
}
