use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use tasklist_db::models::TodoRow;
use tasklist_types::api::{
    Claims, CreateTodoRequest, MessageResponse, TodoListResponse, TodoResponse, UpdateTodoRequest,
};

use crate::auth::AppState;
use crate::error::{ApiError, join_err};

fn to_response(row: TodoRow) -> Result<TodoResponse, ApiError> {
    Ok(TodoResponse {
        id: row
            .id
            .parse()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("bad todo id in store: {}", e)))?,
        user_id: row
            .user_id
            .parse()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("bad user id in store: {}", e)))?,
        task: row.task,
        is_complete: row.is_complete,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub async fn list_todos(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.list_todos(&user_id))
        .await
        .map_err(join_err)??;

    let todos = rows.into_iter().map(to_response).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(TodoListResponse { todos }))
}

pub async fn create_todo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTodoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.task.trim().is_empty() {
        return Err(ApiError::Validation("Task must not be empty.".into()));
    }

    let db = state.clone();
    let todo_id = Uuid::new_v4().to_string();
    let user_id = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.insert_todo(&todo_id, &user_id, &req.task))
        .await
        .map_err(join_err)??;

    Ok((StatusCode::CREATED, Json(to_response(row)?)))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateTodoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.task.is_none() && req.is_complete.is_none() {
        return Err(ApiError::Validation("No fields to update".into()));
    }
    if let Some(task) = &req.task {
        if task.trim().is_empty() {
            return Err(ApiError::Validation("Task must not be empty.".into()));
        }
    }

    // Rows owned by someone else match nothing and read as absent: 404, not
    // 403, so ids cannot be probed across tenants.
    let db = state.clone();
    let user_id = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || {
        db.db.update_todo(&id, &user_id, req.task.as_deref(), req.is_complete)
    })
    .await
    .map_err(join_err)??
    .ok_or(ApiError::NotFound)?;

    Ok(Json(to_response(row)?))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.to_string();
    let deleted = tokio::task::spawn_blocking(move || db.db.delete_todo(&id, &user_id))
        .await
        .map_err(join_err)??;

    if !deleted {
        return Err(ApiError::NotFound);
    }

    Ok(Json(MessageResponse {
        message: "Todo deleted successfully".into(),
    }))
}
