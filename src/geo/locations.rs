/// Bookstore locations ("livrarias") and their spatial queries
use super::{great_circle_distance, polygon_contains, within_cap, BoundingBox, Coordinate, Geometry};
use crate::{
    catalog::{
        enrichment::{render, Enriched},
        ranking::{rank_by, SortOrder},
    },
    error::{CatalogError, CatalogResult},
    metrics,
    store::{lookup, Collection, Document, Filter, FindOptions, RecordStore, ID_FIELD},
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Field holding the denormalized book snapshot of a location
pub const BOOKS_AVAILABLE_FIELD: &str = "books_available";

/// Books stocked by one location
#[derive(Debug, Clone, Serialize)]
pub struct LocationBooks {
    /// Display name of the location, `null` when it has none
    pub livraria: Value,
    pub books: Vec<Value>,
}

/// Decode a stored geometry. Unknown or malformed geometries never match.
fn geometry_of(location: &Document) -> Option<Geometry> {
    serde_json::from_value(location.get("geometry")?.clone()).ok()
}

/// Location manager
#[derive(Clone)]
pub struct LocationManager {
    store: Arc<dyn RecordStore>,
}

impl LocationManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> CatalogResult<Vec<Document>> {
        self.store
            .find(Collection::Livrarias, &Filter::All, FindOptions::default())
            .await
    }

    /// Locations of one geometry kind paired with their decoded geometry
    async fn with_geometry(&self, kind: Option<&str>) -> CatalogResult<Vec<(Document, Geometry)>> {
        let filter = match kind {
            Some(kind) => Filter::eq("geometry.type", kind),
            None => Filter::All,
        };
        let locations = self
            .store
            .find(Collection::Livrarias, &filter, FindOptions::default())
            .await?;

        Ok(locations
            .into_iter()
            .filter_map(|location| {
                let geometry = geometry_of(&location)?;
                Some((location, geometry))
            })
            .collect())
    }

    /// Point locations nearest first, each with `distanceMeters`.
    ///
    /// Without `max_distance` every Point location is returned. Equal
    /// distances keep identity order.
    pub async fn near(&self, center: Coordinate, max_distance: Option<f64>) -> CatalogResult<Vec<Document>> {
        metrics::record_geo_query("near");

        let mut found: Vec<Enriched<f64>> = self
            .with_geometry(Some("Point"))
            .await?
            .into_iter()
            .filter_map(|(record, geometry)| match geometry {
                Geometry::Point(p) => Some(Enriched {
                    record,
                    metric: great_circle_distance(center, Coordinate { lon: p[0], lat: p[1] }),
                }),
                Geometry::Polygon(_) => None,
            })
            .filter(|entry| max_distance.map_or(true, |max| entry.metric <= max))
            .collect();
        rank_by(&mut found, SortOrder::Asc, |entry| entry.metric);

        debug!(lon = center.lon, lat = center.lat, found = found.len(), "near");
        Ok(render(found, "distanceMeters"))
    }

    /// Locations whose whole geometry lies inside the rectangle spanned by
    /// the two corners
    pub async fn within_route(&self, start: Coordinate, end: Coordinate) -> CatalogResult<Vec<Document>> {
        metrics::record_geo_query("within_route");

        let route = BoundingBox::new(start, end);
        let found: Vec<Document> = self
            .with_geometry(None)
            .await?
            .into_iter()
            .filter(|(_, geometry)| route.contains_geometry(geometry))
            .map(|(location, _)| location)
            .collect();

        debug!(ring = ?route.ring(), found = found.len(), "within_route");
        Ok(found)
    }

    /// Number of Point locations within `radius_meters` of `center`
    pub async fn count_near(&self, center: Coordinate, radius_meters: f64) -> CatalogResult<u64> {
        metrics::record_geo_query("count_near");

        if !radius_meters.is_finite() || radius_meters < 0.0 {
            return Err(CatalogError::InvalidArgument(
                "'maxDistance' must be a non-negative number of meters".to_string(),
            ));
        }

        let count = self
            .with_geometry(Some("Point"))
            .await?
            .iter()
            .filter(|(_, geometry)| match geometry {
                Geometry::Point(p) => within_cap(center, Coordinate { lon: p[0], lat: p[1] }, radius_meters),
                Geometry::Polygon(_) => false,
            })
            .count();
        Ok(count as u64)
    }

    /// First Polygon location, in identity order, containing the point
    pub async fn contains_point(&self, point: Coordinate) -> CatalogResult<Option<Document>> {
        metrics::record_geo_query("contains_point");

        Ok(self
            .with_geometry(Some("Polygon"))
            .await?
            .into_iter()
            .find(|(_, geometry)| match geometry {
                Geometry::Polygon(rings) => polygon_contains(rings, point),
                Geometry::Point(_) => false,
            })
            .map(|(location, _)| location))
    }

    /// The book snapshot stored on one location
    pub async fn books_of(&self, id: i64) -> CatalogResult<LocationBooks> {
        let location = self
            .store
            .find_one(Collection::Livrarias, &Filter::Id(id))
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Location {} not found", id)))?;

        let books = match location.get(BOOKS_AVAILABLE_FIELD) {
            Some(Value::Array(books)) if !books.is_empty() => books.clone(),
            _ => {
                return Err(CatalogError::NotFound(format!(
                    "No books found for location {}",
                    id
                )))
            }
        };

        Ok(LocationBooks {
            livraria: lookup(&location, "properties.INF_NOME")
                .cloned()
                .unwrap_or(Value::Null),
            books,
        })
    }

    /// Replace every location's book snapshot with `{_id, title}` of every
    /// current book. Returns the number of locations updated.
    pub async fn refresh_snapshot(&self) -> CatalogResult<u64> {
        let books: Vec<Value> = self
            .store
            .find(Collection::Books, &Filter::All, FindOptions::default())
            .await?
            .into_iter()
            .map(|book| {
                let mut summary = Document::new();
                for field in [ID_FIELD, "title"] {
                    if let Some(value) = book.get(field) {
                        summary.insert(field.to_string(), value.clone());
                    }
                }
                Value::Object(summary)
            })
            .collect();
        if books.is_empty() {
            return Err(CatalogError::NotFound("No books to stock".to_string()));
        }

        let mut fields = Document::new();
        fields.insert(BOOKS_AVAILABLE_FIELD.to_string(), Value::Array(books));
        let updated = self
            .store
            .update_many(Collection::Livrarias, &Filter::All, fields)
            .await?;
        if updated == 0 {
            return Err(CatalogError::NotFound("No locations to stock".to_string()));
        }

        info!(locations = updated, "book_snapshot_refreshed");
        Ok(updated)
    }
}
