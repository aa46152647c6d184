/// SQLite-backed record store
///
/// Documents live as JSON text in a single `documents` table keyed by
/// `(collection, id)`. Filters compile to `json_extract` / `json_each`
/// predicates, and identities come from the `sequences` table inside the
/// inserting transaction, so concurrent writers never share an id.
use super::{strip_identity, Collection, Document, Filter, FindOptions, RecordStore, ID_FIELD};
use crate::{
    error::{CatalogError, CatalogResult},
    metrics,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    query::Query,
    sqlite::{Sqlite, SqliteArguments, SqlitePool},
    Row,
};
use std::{future::Future, time::Duration, time::Instant};
use tracing::debug;

/// Reserve `?2` identities for collection `?1`, returning the highest one
const RESERVE_IDS_SQL: &str = r#"
    INSERT INTO sequences (collection, last_id)
    VALUES (?1, (SELECT COALESCE(MAX(id), 0) FROM documents WHERE collection = ?1) + ?2)
    ON CONFLICT(collection) DO UPDATE SET
        last_id = MAX(
            sequences.last_id,
            (SELECT COALESCE(MAX(id), 0) FROM documents WHERE collection = ?1)
        ) + ?2
    RETURNING last_id
"#;

#[derive(Debug, Clone, PartialEq)]
enum SqlBind {
    Int(i64),
    Float(f64),
    Text(String),
}

/// A filter compiled to a SQL boolean expression plus its bind values
#[derive(Debug, Default)]
struct CompiledFilter {
    clause: String,
    binds: Vec<SqlBind>,
}

impl CompiledFilter {
    fn compile(filter: &Filter) -> CatalogResult<Self> {
        let mut compiled = CompiledFilter::default();
        compiled.clause = compiled.push(filter)?;
        Ok(compiled)
    }

    fn push(&mut self, filter: &Filter) -> CatalogResult<String> {
        Ok(match filter {
            Filter::All => "1".to_string(),
            Filter::Id(id) => {
                self.binds.push(SqlBind::Int(*id));
                "id = ?".to_string()
            }
            Filter::IdIn(ids) if ids.is_empty() => "0".to_string(),
            Filter::IdIn(ids) => {
                self.binds.extend(ids.iter().map(|id| SqlBind::Int(*id)));
                format!("id IN ({})", vec!["?"; ids.len()].join(", "))
            }
            Filter::Eq(path, value) => {
                let extract = format!("json_extract(body, '{}')", json_path(path)?);
                match scalar_bind(value) {
                    Some(bind) => {
                        self.binds.push(bind);
                        format!("{} = ?", extract)
                    }
                    None if value.is_null() => format!("{} IS NULL", extract),
                    None => {
                        self.binds.push(SqlBind::Text(value.to_string()));
                        format!("{} = json(?)", extract)
                    }
                }
            }
            Filter::Range { path, min, max } => {
                let path = json_path(path)?;
                let mut parts = vec![format!(
                    "json_type(body, '{}') IN ('integer', 'real')",
                    path
                )];
                if let Some(min) = min {
                    self.binds.push(SqlBind::Float(*min));
                    parts.push(format!("json_extract(body, '{}') >= ?", path));
                }
                if let Some(max) = max {
                    self.binds.push(SqlBind::Float(*max));
                    parts.push(format!("json_extract(body, '{}') <= ?", path));
                }
                parts.join(" AND ")
            }
            Filter::Contains(path, value) => {
                let bind = scalar_bind(value).ok_or_else(|| {
                    CatalogError::InvalidArgument("array membership needs a scalar value".to_string())
                })?;
                self.binds.push(bind);
                format!(
                    "EXISTS (SELECT 1 FROM json_each(body, '{}') WHERE json_each.value = ?)",
                    json_path(path)?
                )
            }
            Filter::And(filters) if filters.is_empty() => "1".to_string(),
            Filter::And(filters) => {
                let mut parts = Vec::with_capacity(filters.len());
                for f in filters {
                    parts.push(format!("({})", self.push(f)?));
                }
                parts.join(" AND ")
            }
        })
    }
}

/// Build a literal JSON path for a dotted field path.
///
/// Filter paths are written by the catalog, never by clients, but are
/// still restricted to identifier characters since they are inlined.
fn json_path(path: &str) -> CatalogResult<String> {
    let valid = !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if !valid {
        return Err(CatalogError::Internal(format!(
            "unsupported filter path: {}",
            path
        )));
    }
    Ok(format!("$.{}", path))
}

/// JSON path for a client-supplied top-level key
fn field_path(key: &str) -> CatalogResult<String> {
    if key.is_empty() || key.contains('"') || key.contains('\\') {
        return Err(CatalogError::InvalidArgument(format!(
            "invalid field name: {:?}",
            key
        )));
    }
    Ok(format!("$.\"{}\"", key))
}

fn scalar_bind(value: &Value) -> Option<SqlBind> {
    match value {
        Value::Bool(b) => Some(SqlBind::Int(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(SqlBind::Int)
            .or_else(|| n.as_f64().map(SqlBind::Float)),
        Value::String(s) => Some(SqlBind::Text(s.clone())),
        _ => None,
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: &'q [SqlBind],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for bind in binds {
        query = match bind {
            SqlBind::Int(v) => query.bind(*v),
            SqlBind::Float(v) => query.bind(*v),
            SqlBind::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

fn parse_body(body: &str) -> CatalogResult<Document> {
    serde_json::from_str(body)
        .map_err(|e| CatalogError::DataAccess(format!("stored document is not an object: {}", e)))
}

/// Build `json_set(body, path, json(?), ...)` for a set of top-level fields
fn json_set_expression(fields: &Document) -> CatalogResult<(String, Vec<SqlBind>)> {
    let mut expr = String::from("json_set(body");
    let mut binds = Vec::with_capacity(fields.len() * 2);
    for (key, value) in fields {
        expr.push_str(", ?, json(?)");
        binds.push(SqlBind::Text(field_path(key)?));
        binds.push(SqlBind::Text(value.to_string()));
    }
    expr.push(')');
    Ok((expr, binds))
}

/// Record store over a SQLite pool
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run a store operation under the configured deadline
    async fn bounded<T, F>(&self, operation: &'static str, collection: Collection, fut: F) -> CatalogResult<T>
    where
        F: Future<Output = CatalogResult<T>> + Send,
    {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::DataAccess(format!(
                "{} on {} exceeded {:?}",
                operation, collection, self.query_timeout
            ))),
        };
        let elapsed = start.elapsed();
        metrics::record_store_operation(operation, collection.as_str(), elapsed.as_secs_f64());
        debug!(
            operation,
            collection = %collection,
            duration_ms = elapsed.as_millis() as u64,
            ok = result.is_ok(),
            "store_operation"
        );
        result
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: FindOptions,
    ) -> CatalogResult<Vec<Document>> {
        let compiled = CompiledFilter::compile(filter)?;
        let sql = format!(
            "SELECT body FROM documents WHERE collection = ? AND ({}) ORDER BY id LIMIT ? OFFSET ?",
            compiled.clause
        );
        let limit = options
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let skip = i64::try_from(options.skip).unwrap_or(i64::MAX);

        self.bounded("find", collection, async {
            let query = sqlx::query(&sql).bind(collection.as_str());
            let rows = bind_all(query, &compiled.binds)
                .bind(limit)
                .bind(skip)
                .fetch_all(&self.pool)
                .await?;

            rows.iter()
                .map(|row| parse_body(&row.try_get::<String, _>("body")?))
                .collect()
        })
        .await
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> CatalogResult<Option<Document>> {
        let compiled = CompiledFilter::compile(filter)?;
        let sql = format!(
            "SELECT body FROM documents WHERE collection = ? AND ({}) ORDER BY id LIMIT 1",
            compiled.clause
        );

        self.bounded("find_one", collection, async {
            let query = sqlx::query(&sql).bind(collection.as_str());
            let row = bind_all(query, &compiled.binds)
                .fetch_optional(&self.pool)
                .await?;

            row.map(|row| parse_body(&row.try_get::<String, _>("body")?))
                .transpose()
        })
        .await
    }

    async fn count_documents(&self, collection: Collection, filter: &Filter) -> CatalogResult<u64> {
        let compiled = CompiledFilter::compile(filter)?;
        let sql = format!(
            "SELECT COUNT(*) AS total FROM documents WHERE collection = ? AND ({})",
            compiled.clause
        );

        self.bounded("count", collection, async {
            let query = sqlx::query(&sql).bind(collection.as_str());
            let row = bind_all(query, &compiled.binds)
                .fetch_one(&self.pool)
                .await?;
            let total: i64 = row.try_get("total")?;
            Ok(total.max(0) as u64)
        })
        .await
    }

    async fn insert_many(
        &self,
        collection: Collection,
        documents: Vec<Document>,
    ) -> CatalogResult<Vec<i64>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let count = documents.len() as i64;

        self.bounded("insert_many", collection, async move {
            let mut tx = self.pool.begin().await?;

            let last: i64 = sqlx::query(RESERVE_IDS_SQL)
                .bind(collection.as_str())
                .bind(count)
                .fetch_one(&mut *tx)
                .await?
                .try_get("last_id")?;
            let first = last - count + 1;

            let mut ids = Vec::with_capacity(documents.len());
            for (offset, mut doc) in documents.into_iter().enumerate() {
                let id = first + offset as i64;
                doc.insert(ID_FIELD.to_string(), Value::from(id));
                let body = serde_json::to_string(&doc)?;

                sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)")
                    .bind(collection.as_str())
                    .bind(id)
                    .bind(body)
                    .execute(&mut *tx)
                    .await?;
                ids.push(id);
            }

            tx.commit().await?;
            Ok(ids)
        })
        .await
    }

    async fn update_one(
        &self,
        collection: Collection,
        id: i64,
        fields: Document,
    ) -> CatalogResult<bool> {
        let fields = strip_identity(fields);
        if fields.is_empty() {
            let exists = self.find_one(collection, &Filter::Id(id)).await?;
            return Ok(exists.is_some());
        }

        let (expr, binds) = json_set_expression(&fields)?;
        let sql = format!(
            "UPDATE documents SET body = {} WHERE collection = ? AND id = ?",
            expr
        );

        self.bounded("update_one", collection, async {
            let result = bind_all(sqlx::query(&sql), &binds)
                .bind(collection.as_str())
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: Document,
    ) -> CatalogResult<u64> {
        let fields = strip_identity(fields);
        if fields.is_empty() {
            return self.count_documents(collection, filter).await;
        }

        let (expr, mut binds) = json_set_expression(&fields)?;
        let compiled = CompiledFilter::compile(filter)?;
        let sql = format!(
            "UPDATE documents SET body = {} WHERE collection = ? AND ({})",
            expr, compiled.clause
        );
        binds.push(SqlBind::Text(collection.as_str().to_string()));
        binds.extend(compiled.binds);

        self.bounded("update_many", collection, async {
            let result = bind_all(sqlx::query(&sql), &binds)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn delete_one(&self, collection: Collection, id: i64) -> CatalogResult<bool> {
        self.bounded("delete_one", collection, async {
            let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                .bind(collection.as_str())
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn ping(&self) -> CatalogResult<()> {
        tokio::time::timeout(self.query_timeout, crate::db::test_connection(&self.pool))
            .await
            .map_err(|_| CatalogError::DataAccess("store ping timed out".to_string()))?
    }
}
