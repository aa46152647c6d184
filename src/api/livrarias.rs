/// Bookstore location endpoints
///
/// Coordinates are validated before any store access. Listing queries that
/// find nothing answer 404.
use super::parse_id;
use crate::{
    context::AppContext,
    error::{CatalogError, CatalogResult},
    geo::{locations::LocationBooks, parse_distance, Coordinate},
    store::{lookup, Document},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Build location routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/livrarias", get(list_locations))
        .route("/livrarias/near", get(near))
        .route("/livrarias/route", get(within_route))
        .route("/livrarias/count", get(count_near))
        .route("/livrarias/userInFair", get(user_in_fair))
        .route("/livrarias/addBooks", post(add_books))
        .route("/livrarias/:id/books", get(location_books))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointQuery {
    longitude: Option<String>,
    latitude: Option<String>,
    max_distance: Option<String>,
}

impl PointQuery {
    fn coordinate(&self) -> CatalogResult<Coordinate> {
        Coordinate::parse(self.longitude.as_deref(), self.latitude.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteQuery {
    start_longitude: Option<String>,
    start_latitude: Option<String>,
    end_longitude: Option<String>,
    end_latitude: Option<String>,
}

fn non_empty(found: Vec<Document>, message: &str) -> CatalogResult<Json<Vec<Document>>> {
    if found.is_empty() {
        return Err(CatalogError::NotFound(message.to_string()));
    }
    Ok(Json(found))
}

async fn list_locations(State(ctx): State<AppContext>) -> CatalogResult<Json<Vec<Document>>> {
    Ok(Json(ctx.locations.list().await?))
}

async fn near(
    State(ctx): State<AppContext>,
    Query(query): Query<PointQuery>,
) -> CatalogResult<Json<Vec<Document>>> {
    let center = query.coordinate()?;
    let max_distance = parse_distance(query.max_distance.as_deref())?;

    let found = ctx.locations.near(center, max_distance).await?;
    non_empty(found, "No locations found near the given position")
}

async fn within_route(
    State(ctx): State<AppContext>,
    Query(query): Query<RouteQuery>,
) -> CatalogResult<Json<Vec<Document>>> {
    let start = Coordinate::parse_named(
        query.start_longitude.as_deref(),
        query.start_latitude.as_deref(),
        "startLongitude",
        "startLatitude",
    )?;
    let end = Coordinate::parse_named(
        query.end_longitude.as_deref(),
        query.end_latitude.as_deref(),
        "endLongitude",
        "endLatitude",
    )?;

    let found = ctx.locations.within_route(start, end).await?;
    non_empty(found, "No locations found inside the route area")
}

async fn count_near(
    State(ctx): State<AppContext>,
    Query(query): Query<PointQuery>,
) -> CatalogResult<Json<Value>> {
    let center = query.coordinate()?;
    let radius = parse_distance(query.max_distance.as_deref())?
        .unwrap_or(ctx.config.queries.count_near_default_meters);

    let count = ctx.locations.count_near(center, radius).await?;
    Ok(Json(json!({ "count": count })))
}

async fn user_in_fair(
    State(ctx): State<AppContext>,
    Query(query): Query<PointQuery>,
) -> CatalogResult<Json<Value>> {
    let point = query.coordinate()?;

    let fair = ctx
        .locations
        .contains_point(point)
        .await?
        .ok_or_else(|| CatalogError::NotFound("The position is not inside the book fair".to_string()))?;

    Ok(Json(json!({
        "message": "The position is inside the book fair",
        "location": lookup(&fair, "geometry.coordinates").cloned().unwrap_or(Value::Null),
    })))
}

async fn location_books(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CatalogResult<Json<LocationBooks>> {
    let id = parse_id(&id)?;
    Ok(Json(ctx.locations.books_of(id).await?))
}

async fn add_books(State(ctx): State<AppContext>) -> CatalogResult<Json<Value>> {
    let updated = ctx.locations.refresh_snapshot().await?;
    Ok(Json(json!({
        "message": "Books added to every location",
        "locations": updated,
    })))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, get, send};
    use crate::store::Collection;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    async fn locations() -> axum::Router {
        app(vec![
            (
                Collection::Livrarias,
                vec![
                    json!({"_id": 1, "properties": {"INF_NOME": "Bertrand"}, "geometry": {"type": "Point", "coordinates": [-9.1420, 38.7110]}}),
                    json!({"_id": 2, "geometry": {"type": "Point", "coordinates": [-9.1390, 38.7105]}}),
                    json!({"_id": 3, "properties": {"INF_NOME": "Feira"}, "geometry": {"type": "Polygon", "coordinates": [
                        [[-9.155, 38.725], [-9.150, 38.725], [-9.150, 38.730], [-9.155, 38.730], [-9.155, 38.725]]
                    ]}}),
                ],
            ),
            (Collection::Books, vec![json!({"_id": 1, "title": "Mensagem", "price": 8})]),
        ])
        .await
    }

    #[tokio::test]
    async fn test_near_and_count() {
        let app = locations().await;

        let (status, body) = get(&app, "/livrarias/near?longitude=-9.1395&latitude=38.7105&maxDistance=1000").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["_id"], json!(2));
        assert_eq!(body[1]["_id"], json!(1));
        assert!(body[0]["distanceMeters"].as_f64().unwrap() < body[1]["distanceMeters"].as_f64().unwrap());

        let (status, _) = get(&app, "/livrarias/near?longitude=0&latitude=0&maxDistance=10").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get(&app, "/livrarias/near?longitude=west&latitude=38.7").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("InvalidArgument"));

        let (_, body) = get(&app, "/livrarias/count?longitude=-9.1395&latitude=38.7105").await;
        assert_eq!(body, json!({"count": 2}));

        let (_, body) = get(&app, "/livrarias/count?longitude=0&latitude=0").await;
        assert_eq!(body, json!({"count": 0}));
    }

    #[tokio::test]
    async fn test_route_and_fair() {
        let app = locations().await;

        let (status, body) = get(
            &app,
            "/livrarias/route?startLongitude=-9.16&startLatitude=38.72&endLongitude=-9.14&endLatitude=38.74",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["_id"], json!(3));

        let (status, _) = get(&app, "/livrarias/route?startLongitude=-9.16&startLatitude=38.72").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(&app, "/livrarias/userInFair?longitude=-9.152&latitude=38.727").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["location"][0][0], json!([-9.155, 38.725]));

        let (status, _) = get(&app, "/livrarias/userInFair?longitude=-9.0&latitude=38.0").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_numeric_coordinates_rejected() {
        let app = locations().await;

        for uri in [
            "/livrarias/count?longitude=-9.1395&latitude=north",
            "/livrarias/count?longitude=-9.1395&latitude=38.7&maxDistance=far",
            "/livrarias/route?startLongitude=-9.16&startLatitude=38.72&endLongitude=east&endLatitude=38.74",
            "/livrarias/route?startLongitude=x&startLatitude=38.72&endLongitude=-9.14&endLatitude=38.74",
            "/livrarias/userInFair?longitude=-9.152&latitude=",
            "/livrarias/userInFair?longitude=abc&latitude=38.727",
        ] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["error"], json!("InvalidArgument"), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_book_snapshot() {
        let app = locations().await;

        let (status, _) = get(&app, "/livrarias/1/books").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, Method::POST, "/livrarias/addBooks", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["locations"], json!(3));

        let (status, body) = get(&app, "/livrarias/1/books").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["livraria"], json!("Bertrand"));
        assert_eq!(body["books"], json!([{"_id": 1, "title": "Mensagem"}]));
    }
}
