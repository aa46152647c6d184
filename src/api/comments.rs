/// Comment endpoints
use super::{object, parse_id};
use crate::{context::AppContext, error::CatalogResult, store::Document};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde_json::{json, Value};

/// Build comment routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route("/comments/:id", delete(delete_comment))
}

async fn list_comments(State(ctx): State<AppContext>) -> CatalogResult<Json<Vec<Document>>> {
    Ok(Json(ctx.comments.list().await?))
}

async fn create_comment(
    State(ctx): State<AppContext>,
    Json(body): Json<Value>,
) -> CatalogResult<(StatusCode, Json<Value>)> {
    let id = ctx.comments.create(&object(body)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Comment added",
            "commentId": id,
        })),
    ))
}

async fn delete_comment(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CatalogResult<Json<Value>> {
    let id = parse_id(&id)?;
    ctx.comments.delete(id).await?;
    Ok(Json(json!({ "message": format!("Comment {} deleted", id) })))
}
