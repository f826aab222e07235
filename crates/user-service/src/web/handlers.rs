use crate::error::ServiceError;
use crate::model::{CreatedUser, UserRecord};
use crate::web::error::ApiError;
use crate::web::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

impl IdQuery {
    fn require(self) -> Result<String, ApiError> {
        self.id
            .ok_or_else(|| ServiceError::Validation("missing id query parameter".to_string()).into())
    }
}

/// `POST /user`
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CreatedUser>, ApiError> {
    let ctx = state.context(&headers);
    let id = state.writer.create_user(&ctx, &body).await?;
    Ok(Json(CreatedUser { id }))
}

/// `GET /users`
pub async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Vec<UserRecord>>, ApiError> {
    let ctx = state.context(&headers);
    Ok(Json(state.reader.list_users(&ctx).await?))
}

/// `GET /user?id=`
pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IdQuery>,
) -> Result<Json<UserRecord>, ApiError> {
    let id = query.require()?;
    let ctx = state.context(&headers);
    Ok(Json(state.reader.get_user(&ctx, &id).await?))
}

/// `GET /user/order?id=`
pub async fn get_user_with_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IdQuery>,
) -> Result<Json<UserRecord>, ApiError> {
    let id = query.require()?;
    let ctx = state.context(&headers);
    Ok(Json(state.reader.get_user_with_order(&ctx, &id).await?))
}

/// `GET /health`; answers as long as the process is serving.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
