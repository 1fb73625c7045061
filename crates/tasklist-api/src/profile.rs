use axum::{Extension, Json, extract::State, response::IntoResponse};

use tasklist_types::api::{Claims, ProfileResponse};

use crate::auth::AppState;
use crate::error::{ApiError, join_err};

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.to_string();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_id(&user_id))
        .await
        .map_err(join_err)??
        .ok_or(ApiError::NotFound)?;

    Ok(Json(ProfileResponse {
        id: claims.sub,
        email: user.email,
        created_at: user.created_at,
    }))
}
