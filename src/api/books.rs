/// Book endpoints: rankings, detail, filters and record management
use super::{object, one_or_many, parse_id, PageQuery};
use crate::{
    catalog::{
        books::{BookDetail, BookFilter, JobReviews},
        ranking::{SortOrder, TopLimit},
        Page,
    },
    context::AppContext,
    error::{CatalogError, CatalogResult},
    store::Document,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Build book routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/books", get(list_books).post(create_books))
        .route("/books/star", get(five_star_ranking))
        .route("/books/comments", get(comment_ranking))
        .route("/books/job", get(reviews_by_job))
        .route("/books/filter", get(filter_books))
        .route("/books/year/:year", get(books_by_year))
        .route("/books/top/:limit", get(top_books))
        .route("/books/ratings/:order", get(ranking_by_reviews))
        .route(
            "/books/:id",
            get(book_detail).put(update_book).delete(delete_book),
        )
}

/// Raw filter parameters
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterQuery {
    price_min: Option<String>,
    price_max: Option<String>,
    category: Option<String>,
    author: Option<String>,
}

fn parse_price(raw: Option<&str>, name: &str) -> CatalogResult<Option<f64>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| CatalogError::InvalidArgument(format!("'{}' must be a number", name))),
    }
}

impl FilterQuery {
    fn criteria(self) -> CatalogResult<BookFilter> {
        Ok(BookFilter {
            price_min: parse_price(self.price_min.as_deref(), "priceMin")?,
            price_max: parse_price(self.price_max.as_deref(), "priceMax")?,
            category: self.category.filter(|s| !s.is_empty()),
            author: self.author.filter(|s| !s.is_empty()),
        })
    }
}

async fn list_books(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
) -> CatalogResult<Json<Page>> {
    let request = query.request(&ctx.config.queries)?;
    Ok(Json(ctx.books.list(request).await?))
}

async fn five_star_ranking(State(ctx): State<AppContext>) -> CatalogResult<Json<Vec<Document>>> {
    Ok(Json(ctx.books.five_star_ranking().await?))
}

async fn comment_ranking(State(ctx): State<AppContext>) -> CatalogResult<Json<Vec<Document>>> {
    Ok(Json(ctx.books.comment_ranking().await?))
}

async fn reviews_by_job(State(ctx): State<AppContext>) -> CatalogResult<Json<Vec<JobReviews>>> {
    Ok(Json(ctx.books.reviews_by_job().await?))
}

async fn filter_books(
    State(ctx): State<AppContext>,
    Query(query): Query<FilterQuery>,
) -> CatalogResult<Json<Vec<Document>>> {
    let criteria = query.criteria()?;
    Ok(Json(ctx.books.search(&criteria).await?))
}

async fn books_by_year(
    State(ctx): State<AppContext>,
    Path(year): Path<String>,
) -> CatalogResult<Json<Vec<Document>>> {
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| CatalogError::InvalidArgument(format!("Invalid year '{}'", year)))?;
    Ok(Json(ctx.books.published_in(year).await?))
}

async fn top_books(
    State(ctx): State<AppContext>,
    Path(limit): Path<String>,
) -> CatalogResult<Json<Vec<Document>>> {
    let limit: TopLimit = limit.parse()?;
    Ok(Json(ctx.books.top_by_score(limit).await?))
}

async fn ranking_by_reviews(
    State(ctx): State<AppContext>,
    Path(order): Path<String>,
) -> CatalogResult<Json<Vec<Document>>> {
    let order: SortOrder = order.parse()?;
    Ok(Json(ctx.books.ranking_by_reviews(order).await?))
}

async fn book_detail(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CatalogResult<Json<BookDetail>> {
    let id = parse_id(&id)?;
    Ok(Json(ctx.books.detail(id).await?))
}

async fn create_books(
    State(ctx): State<AppContext>,
    Json(body): Json<Value>,
) -> CatalogResult<(StatusCode, Json<Value>)> {
    let ids = ctx.books.create(one_or_many(body)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("{} book(s) added", ids.len()),
            "insertedIds": ids,
        })),
    ))
}

async fn update_book(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> CatalogResult<Json<Value>> {
    let id = parse_id(&id)?;
    ctx.books.update(id, object(body)?).await?;
    Ok(Json(json!({ "message": format!("Book {} updated", id) })))
}

async fn delete_book(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CatalogResult<Json<Value>> {
    let id = parse_id(&id)?;
    ctx.books.delete(id).await?;
    Ok(Json(json!({ "message": format!("Book {} deleted", id) })))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, get, send};
    use crate::store::Collection;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    async fn catalog() -> axum::Router {
        app(vec![
            (
                Collection::Books,
                vec![
                    json!({"_id": 1, "title": "Rust", "authors": ["Ferris"], "categories": ["Programming"], "price": 30, "publishedDate": {"$date": "2015-05-15T00:00:00.000-0700"}}),
                    json!({"_id": 2, "title": "Go", "authors": ["Gopher"], "categories": ["Programming"], "price": 20}),
                    json!({"_id": 3, "title": "Poems", "authors": ["Pessoa"], "categories": ["Poetry"], "price": 12}),
                ],
            ),
            (
                Collection::Users,
                vec![
                    json!({"_id": 1, "job": "Engineer", "reviews": [{"book_id": 1, "score": 5}, {"book_id": 2, "score": 3}]}),
                    json!({"_id": 2, "job": "Poet", "reviews": [{"book_id": 1, "score": 4}]}),
                ],
            ),
            (
                Collection::Comments,
                vec![json!({"_id": 1, "book_id": 2, "user_id": 1, "comment": "Simple"})],
            ),
        ])
        .await
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let app = catalog().await;

        let (status, body) = get(&app, "/books?page=2&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], json!(3));
        assert_eq!(body["totalPages"], json!(2));
        assert_eq!(body["currentPage"], json!(2));
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = get(&app, "/books?limit=none").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("InvalidArgument"));
    }

    #[tokio::test]
    async fn test_rankings() {
        let app = catalog().await;

        let (status, body) = get(&app, "/books/star").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["_id"], json!(1));
        assert_eq!(body[0]["fiveStarReviews"], json!(1));

        let (_, body) = get(&app, "/books/comments").await;
        assert_eq!(body, json!([{"_id": 2, "title": "Go", "authors": ["Gopher"], "categories": ["Programming"], "price": 20, "totalComments": 1}]));

        let (_, body) = get(&app, "/books/job").await;
        assert_eq!(body[0], json!({"job": "Engineer", "totalReviews": 2}));

        let (_, body) = get(&app, "/books/ratings/asc").await;
        assert_eq!(body[0]["_id"], json!(2));
        assert_eq!(body[1]["totalReviews"], json!(2));

        let (status, _) = get(&app, "/books/ratings/sideways").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rankings_survive_replaced_reviews() {
        let app = catalog().await;

        let (status, _) = send(
            &app,
            Method::PUT,
            "/users/2",
            Some(json!({"reviews": [{"book_id": 1, "score": 4.5}, {"book_id": 2}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get(&app, "/books/star").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["fiveStarReviews"], json!(1));

        let (status, body) = get(&app, "/books/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["averageScore"], json!(4.75));

        let (status, body) = get(&app, "/books/top/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["_id"], json!(1));
    }

    #[tokio::test]
    async fn test_top_limit_validation() {
        let app = catalog().await;

        let (status, body) = get(&app, "/books/top/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["averageScore"], json!(4.5));

        for bad in ["0", "-1", "many"] {
            let (status, _) = get(&app, &format!("/books/top/{}", bad)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_detail() {
        let app = catalog().await;

        let (status, body) = get(&app, "/books/2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["averageScore"], json!(3.0));
        assert_eq!(body["comments"].as_array().unwrap().len(), 1);

        let (_, body) = get(&app, "/books/3").await;
        assert_eq!(body["averageScore"], json!(null));
        assert_eq!(body["book"]["title"], json!("Poems"));

        let (status, body) = get(&app, "/books/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("NotFound"));

        let (status, _) = get(&app, "/books/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_filter_and_year() {
        let app = catalog().await;

        let (status, body) = get(&app, "/books/filter?priceMax=25&category=Programming").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["_id"], json!(2));

        let (status, _) = get(&app, "/books/filter?author=Nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get(&app, "/books/filter?priceMin=cheap").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(&app, "/books/year/2015").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["_id"], json!(1));

        let (status, _) = get(&app, "/books/year/2016").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get(&app, "/books/year/999").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let app = catalog().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/books",
            Some(json!([{"title": "New", "authors": ["Me"]}, {"_id": 1, "title": "Other", "authors": ["You"]}])),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["insertedIds"], json!([4, 5]));

        let (status, _) = send(&app, Method::POST, "/books", Some(json!({"title": "No authors"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::PUT, "/books/4", Some(json!({"price": 9.5}))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = get(&app, "/books/4").await;
        assert_eq!(body["book"]["price"], json!(9.5));

        let (status, _) = send(&app, Method::PUT, "/books/4", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::DELETE, "/books/4", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::DELETE, "/books/4", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
