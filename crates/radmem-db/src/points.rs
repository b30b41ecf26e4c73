//! PostgreSQL + pgvector implementation of [`PointStore`].
//!
//! Every collection shares the `point` table; a point's named vectors are
//! the `image_vector` / `text_vector` columns and its payload is JSONB.
//! Exact-match filters compile to JSONB containment so they can use the GIN
//! index on `payload`.

use std::time::Instant;

use async_trait::async_trait;
use pgvector::Vector;
use serde_json::{Map, Value as JsonValue};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument, trace};
use uuid::Uuid;

use radmem_core::{
    point::validate_payload_key, CollectionSpec, Error, Filter, NamedVectors, Payload, Point,
    PointStore, Result, ScoredPoint, VectorSlot,
};

/// Point store backed by the `point` / `point_collection` tables.
#[derive(Clone)]
pub struct PgPointStore {
    pool: PgPool,
}

impl PgPointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Compile a filter into a SQL fragment over `payload`.
///
/// `param_offset` is the number of parameters already bound; the returned
/// values bind as `$param_offset+1 ..` in order.
pub(crate) fn filter_clause(filter: &Filter, param_offset: usize) -> (String, Vec<JsonValue>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if !filter.must.is_empty() {
        let mut obj = Map::new();
        for c in &filter.must {
            obj.insert(c.key.clone(), c.value.clone());
        }
        params.push(JsonValue::Object(obj));
        clauses.push(format!("payload @> ${}::jsonb", param_offset + params.len()));
    }

    for c in &filter.must_not {
        let mut obj = Map::new();
        obj.insert(c.key.clone(), c.value.clone());
        params.push(JsonValue::Object(obj));
        clauses.push(format!(
            "NOT (payload @> ${}::jsonb)",
            param_offset + params.len()
        ));
    }

    if clauses.is_empty() {
        ("TRUE".to_string(), params)
    } else {
        (clauses.join(" AND "), params)
    }
}

fn payload_from_json(value: JsonValue) -> Payload {
    match value {
        JsonValue::Object(map) => map,
        _ => Payload::new(),
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    validate_payload_key(name).map_err(|_| Error::Store(format!("Invalid collection name: {}", name)))
}

#[async_trait]
impl PointStore for PgPointStore {
    #[instrument(skip(self, spec), fields(subsystem = "db", component = "points", op = "ensure_collection", collection = spec.name))]
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        validate_identifier(spec.name)?;
        let slots: Vec<String> = spec.slots.iter().map(|s| s.as_str().to_string()).collect();

        sqlx::query(
            r#"INSERT INTO point_collection (name, slots, dimension)
               VALUES ($1, $2, $3)
               ON CONFLICT (name) DO NOTHING"#,
        )
        .bind(spec.name)
        .bind(&slots)
        .bind(spec.dimension as i32)
        .execute(&self.pool)
        .await?;

        let existing: i32 =
            sqlx::query_scalar("SELECT dimension FROM point_collection WHERE name = $1")
                .bind(spec.name)
                .fetch_one(&self.pool)
                .await?;
        if existing as usize != spec.dimension {
            return Err(Error::Store(format!(
                "Collection {} has dimension {}, expected {}",
                spec.name, existing, spec.dimension
            )));
        }

        for field in spec.indexed_fields {
            validate_payload_key(field)?;
            // Both names were validated as plain identifiers above.
            let sql = format!(
                "CREATE INDEX IF NOT EXISTS idx_point_{coll}_{field} ON point ((payload->>'{field}')) WHERE collection = '{coll}'",
                coll = spec.name,
                field = field
            );
            sqlx::query(&sql).execute(&self.pool).await?;
        }

        debug!(slots = ?slots, dimension = spec.dimension, "Collection ready");
        Ok(())
    }

    #[instrument(skip(self, points), fields(subsystem = "db", component = "points", op = "upsert", result_count = points.len()))]
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;
        for point in points {
            sqlx::query(
                r#"INSERT INTO point (collection, id, payload, image_vector, text_vector, updated_at)
                   VALUES ($1, $2, $3, $4, $5, now())
                   ON CONFLICT (collection, id) DO UPDATE
                   SET payload = EXCLUDED.payload,
                       image_vector = EXCLUDED.image_vector,
                       text_vector = EXCLUDED.text_vector,
                       updated_at = now()"#,
            )
            .bind(collection)
            .bind(point.id)
            .bind(JsonValue::Object(point.payload))
            .bind(point.vectors.image.map(Vector::from))
            .bind(point.vectors.text.map(Vector::from))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(duration_ms = start.elapsed().as_millis() as u64, "Points upserted");
        Ok(())
    }

    #[instrument(skip(self, ids), fields(subsystem = "db", component = "points", op = "retrieve"))]
    async fn retrieve(
        &self,
        collection: &str,
        ids: &[Uuid],
        with_vectors: bool,
    ) -> Result<Vec<Point>> {
        let sql = if with_vectors {
            "SELECT id, payload, image_vector, text_vector FROM point WHERE collection = $1 AND id = ANY($2)"
        } else {
            "SELECT id, payload, NULL::vector AS image_vector, NULL::vector AS text_vector FROM point WHERE collection = $1 AND id = ANY($2)"
        };
        let rows = sqlx::query(sql)
            .bind(collection)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<Point> {
                let image: Option<Vector> = row.try_get("image_vector")?;
                let text: Option<Vector> = row.try_get("text_vector")?;
                Ok(Point {
                    id: row.try_get("id")?,
                    payload: payload_from_json(row.try_get("payload")?),
                    vectors: NamedVectors {
                        image: image.map(|v| v.to_vec()),
                        text: text.map(|v| v.to_vec()),
                    },
                })
            })
            .collect()
    }

    #[instrument(skip(self, vector, filter), fields(subsystem = "db", component = "points", op = "search", slot = %slot))]
    async fn search(
        &self,
        collection: &str,
        slot: VectorSlot,
        vector: &[f32],
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let empty = Filter::new();
        let filter = filter.unwrap_or(&empty);
        filter.validate()?;

        // $1 vector, $2 collection, $3 limit; filter params follow.
        let (clause, params) = filter_clause(filter, 3);
        let column = slot.as_str();
        let sql = format!(
            r#"SELECT id, payload, 1.0 - ({column} <=> $1::vector) AS score
               FROM point
               WHERE collection = $2 AND {column} IS NOT NULL AND {clause}
               ORDER BY {column} <=> $1::vector
               LIMIT $3"#,
        );

        let mut query = sqlx::query(&sql)
            .bind(Vector::from(vector.to_vec()))
            .bind(collection)
            .bind(limit as i64);
        for p in params {
            query = query.bind(p);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let hits = rows
            .into_iter()
            .map(|row| -> Result<ScoredPoint> {
                Ok(ScoredPoint {
                    id: row.try_get("id")?,
                    score: row.try_get::<f64, _>("score")? as f32,
                    payload: payload_from_json(row.try_get("payload")?),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        trace!(result_count = hits.len(), "Vector search complete");
        Ok(hits)
    }

    #[instrument(skip(self, filter), fields(subsystem = "db", component = "points", op = "scroll"))]
    async fn scroll(&self, collection: &str, filter: &Filter, limit: usize) -> Result<Vec<Point>> {
        filter.validate()?;
        let (clause, params) = filter_clause(filter, 2);
        let sql = format!(
            "SELECT id, payload FROM point WHERE collection = $1 AND {clause} ORDER BY id LIMIT $2"
        );
        let mut query = sqlx::query(&sql).bind(collection).bind(limit as i64);
        for p in params {
            query = query.bind(p);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|row| -> Result<Point> {
                Ok(Point {
                    id: row.try_get("id")?,
                    payload: payload_from_json(row.try_get("payload")?),
                    vectors: NamedVectors::default(),
                })
            })
            .collect()
    }

    #[instrument(skip(self, ids, fields), fields(subsystem = "db", component = "points", op = "set_payload"))]
    async fn set_payload(&self, collection: &str, ids: &[Uuid], fields: Payload) -> Result<()> {
        sqlx::query(
            r#"UPDATE point SET payload = payload || $3::jsonb, updated_at = now()
               WHERE collection = $1 AND id = ANY($2)"#,
        )
        .bind(collection)
        .bind(ids)
        .bind(JsonValue::Object(fields))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, ids), fields(subsystem = "db", component = "points", op = "delete"))]
    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<()> {
        sqlx::query("DELETE FROM point WHERE collection = $1 AND id = ANY($2)")
            .bind(collection)
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_clause_empty() {
        let (sql, params) = filter_clause(&Filter::new(), 2);
        assert_eq!(sql, "TRUE");
        assert!(params.is_empty());
    }

    #[test]
    fn test_filter_clause_must_is_single_containment() {
        let f = Filter::new()
            .must_eq("patient_id", "p1")
            .must_eq("parent_path", "");
        let (sql, params) = filter_clause(&f, 3);
        assert_eq!(sql, "payload @> $4::jsonb");
        assert_eq!(params, vec![json!({"patient_id": "p1", "parent_path": ""})]);
    }

    #[test]
    fn test_filter_clause_must_not_numbering() {
        let f = Filter::new()
            .must_eq("patient_id", "p1")
            .must_not_eq("scan_id", "s1");
        let (sql, params) = filter_clause(&f, 3);
        assert_eq!(sql, "payload @> $4::jsonb AND NOT (payload @> $5::jsonb)");
        assert_eq!(params[1], json!({"scan_id": "s1"}));
    }

    #[test]
    fn test_invalid_collection_name() {
        assert!(validate_identifier("patient_uploads").is_ok());
        assert!(validate_identifier("x; DROP TABLE point").is_err());
    }
}
