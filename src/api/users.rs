/// User endpoints
use super::{object, one_or_many, parse_id, PageQuery};
use crate::{
    catalog::{users::UserDetail, Page},
    context::AppContext,
    error::CatalogResult,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/users", get(list_users).post(create_users))
        .route(
            "/users/:id",
            get(user_detail).put(update_user).delete(delete_user),
        )
}

async fn list_users(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
) -> CatalogResult<Json<Page>> {
    let request = query.request(&ctx.config.queries)?;
    Ok(Json(ctx.users.list(request).await?))
}

async fn user_detail(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CatalogResult<Json<UserDetail>> {
    let id = parse_id(&id)?;
    Ok(Json(ctx.users.detail(id).await?))
}

async fn create_users(
    State(ctx): State<AppContext>,
    Json(body): Json<Value>,
) -> CatalogResult<(StatusCode, Json<Value>)> {
    let ids = ctx.users.create(one_or_many(body)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("{} user(s) added", ids.len()),
            "insertedIds": ids,
        })),
    ))
}

async fn update_user(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> CatalogResult<Json<Value>> {
    let id = parse_id(&id)?;
    ctx.users.update(id, object(body)?).await?;
    Ok(Json(json!({ "message": format!("User {} updated", id) })))
}

async fn delete_user(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CatalogResult<Json<Value>> {
    let id = parse_id(&id)?;
    ctx.users.delete(id).await?;
    Ok(Json(json!({ "message": format!("User {} deleted", id) })))
}
