//! Typed collection over the raw point store.
//!
//! [`Records<R>`] encodes a [`Record`] into a point payload and decodes it
//! back, and refuses writes that are missing any of the record's required
//! vector slots.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

use radmem_core::{
    CollectionSpec, Error, Filter, NamedVectors, Payload, Point, PointStore, Record, Result,
    VectorSlot,
};

/// A decoded record together with its stored vectors.
#[derive(Debug, Clone)]
pub struct Stored<R> {
    pub record: R,
    pub vectors: NamedVectors,
}

/// A decoded record with its similarity score.
#[derive(Debug, Clone)]
pub struct Scored<R> {
    pub record: R,
    pub score: f32,
}

/// Typed view of one collection.
pub struct Records<R: Record> {
    store: Arc<dyn PointStore>,
    dimension: usize,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for Records<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            dimension: self.dimension,
            _marker: PhantomData,
        }
    }
}

impl<R: Record> Records<R> {
    pub fn new(store: Arc<dyn PointStore>, dimension: usize) -> Self {
        Self {
            store,
            dimension,
            _marker: PhantomData,
        }
    }

    /// Collection layout for this record type.
    pub fn spec(&self) -> CollectionSpec {
        CollectionSpec {
            name: R::COLLECTION,
            slots: R::SLOTS,
            dimension: self.dimension,
            indexed_fields: R::INDEXED_FIELDS,
        }
    }

    pub async fn ensure_collection(&self) -> Result<()> {
        self.store.ensure_collection(&self.spec()).await
    }

    /// Insert or replace a record. Every slot in `R::SLOTS` must be present.
    pub async fn upsert(&self, record: &R, vectors: NamedVectors) -> Result<()> {
        for slot in R::SLOTS {
            match vectors.get(*slot) {
                None => {
                    return Err(Error::Store(format!(
                        "{} record {} is missing its {}",
                        R::COLLECTION,
                        record.point_id(),
                        slot
                    )))
                }
                Some(v) if v.len() != self.dimension => {
                    return Err(Error::Store(format!(
                        "{} has dimension {}, expected {}",
                        slot,
                        v.len(),
                        self.dimension
                    )))
                }
                Some(_) => {}
            }
        }

        let payload = encode(record)?;
        self.store
            .upsert(
                R::COLLECTION,
                vec![Point {
                    id: record.point_id(),
                    vectors,
                    payload,
                }],
            )
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<R>> {
        let mut points = self.store.retrieve(R::COLLECTION, &[id], false).await?;
        match points.pop() {
            Some(p) => Ok(Some(decode(p.id, p.payload)?)),
            None => Ok(None),
        }
    }

    pub async fn get_with_vectors(&self, id: Uuid) -> Result<Option<Stored<R>>> {
        let mut points = self.store.retrieve(R::COLLECTION, &[id], true).await?;
        match points.pop() {
            Some(p) => Ok(Some(Stored {
                record: decode(p.id, p.payload)?,
                vectors: p.vectors,
            })),
            None => Ok(None),
        }
    }

    /// Similarity search. Hits whose payload no longer decodes are skipped
    /// with a warning.
    pub async fn search(
        &self,
        slot: VectorSlot,
        vector: &[f32],
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<Scored<R>>> {
        let hits = self
            .store
            .search(R::COLLECTION, slot, vector, filter, limit)
            .await?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| match decode::<R>(hit.id, hit.payload) {
                Ok(record) => Some(Scored {
                    record,
                    score: hit.score,
                }),
                Err(e) => {
                    warn!(subsystem = "db", component = "records", collection = R::COLLECTION, id = %hit.id, error = %e, "Skipping undecodable hit");
                    None
                }
            })
            .collect())
    }

    pub async fn scroll(&self, filter: &Filter, limit: usize) -> Result<Vec<R>> {
        let points = self.store.scroll(R::COLLECTION, filter, limit).await?;
        points
            .into_iter()
            .map(|p| decode(p.id, p.payload))
            .collect()
    }

    /// Merge individual payload fields; other fields are untouched.
    pub async fn set_fields(&self, id: Uuid, fields: Payload) -> Result<()> {
        self.store.set_payload(R::COLLECTION, &[id], fields).await
    }

    pub async fn delete(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store.delete(R::COLLECTION, ids).await
    }
}

fn encode<R: Record>(record: &R) -> Result<Payload> {
    match serde_json::to_value(record)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(Error::Serialization(format!(
            "{} record encoded as non-object: {}",
            R::COLLECTION,
            other
        ))),
    }
}

fn decode<R: Record>(id: Uuid, payload: Payload) -> Result<R> {
    let mut record: R = serde_json::from_value(JsonValue::Object(payload)).map_err(|e| {
        Error::Serialization(format!("{} point {}: {}", R::COLLECTION, id, e))
    })?;
    record.assign_point_id(id);
    Ok(record)
}
