//! In-process [`PointStore`] with brute-force cosine search.
//!
//! Used for tests and `STORE_BACKEND=memory` development runs. Semantics
//! match [`crate::PgPointStore`]: collections must be ensured first, vectors
//! must fit the collection's slots and dimension, filters are exact-match.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use radmem_core::{
    CollectionSpec, Error, Filter, NamedVectors, Payload, Point, PointStore, Result, ScoredPoint,
    VectorSlot,
};

struct Collection {
    spec: CollectionSpec,
    points: HashMap<Uuid, Point>,
}

/// Point store held entirely in memory.
#[derive(Default)]
pub struct MemoryPointStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points in a collection (0 when it does not exist).
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0)
    }
}

/// Cosine similarity; 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

fn check_vectors(spec: &CollectionSpec, vectors: &NamedVectors) -> Result<()> {
    for slot in [VectorSlot::Image, VectorSlot::Text] {
        if let Some(v) = vectors.get(slot) {
            if !spec.has_slot(slot) {
                return Err(Error::Store(format!(
                    "Collection {} has no {} slot",
                    spec.name, slot
                )));
            }
            if v.len() != spec.dimension {
                return Err(Error::Store(format!(
                    "Vector {} has dimension {}, expected {}",
                    slot,
                    v.len(),
                    spec.dimension
                )));
            }
        }
    }
    Ok(())
}

fn missing(collection: &str) -> Error {
    Error::Store(format!("Collection not found: {}", collection))
}

#[async_trait]
impl PointStore for MemoryPointStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections.get(spec.name) {
            Some(existing) if existing.spec.dimension != spec.dimension => Err(Error::Store(
                format!(
                    "Collection {} has dimension {}, expected {}",
                    spec.name, existing.spec.dimension, spec.dimension
                ),
            )),
            Some(_) => Ok(()),
            None => {
                collections.insert(
                    spec.name.to_string(),
                    Collection {
                        spec: spec.clone(),
                        points: HashMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        for point in &points {
            check_vectors(&coll.spec, &point.vectors)?;
        }
        for point in points {
            coll.points.insert(point.id, point);
        }
        Ok(())
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[Uuid],
        with_vectors: bool,
    ) -> Result<Vec<Point>> {
        let collections = self.collections.read().await;
        let coll = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(ids
            .iter()
            .filter_map(|id| coll.points.get(id))
            .map(|p| Point {
                id: p.id,
                payload: p.payload.clone(),
                vectors: if with_vectors {
                    p.vectors.clone()
                } else {
                    NamedVectors::default()
                },
            })
            .collect())
    }

    async fn search(
        &self,
        collection: &str,
        slot: VectorSlot,
        vector: &[f32],
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let coll = collections.get(collection).ok_or_else(|| missing(collection))?;
        if vector.len() != coll.spec.dimension {
            return Err(Error::Store(format!(
                "Query vector has dimension {}, expected {}",
                vector.len(),
                coll.spec.dimension
            )));
        }

        let mut hits: Vec<ScoredPoint> = coll
            .points
            .values()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .filter_map(|p| {
                p.vectors.get(slot).map(|v| ScoredPoint {
                    id: p.id,
                    score: cosine_similarity(vector, v),
                    payload: p.payload.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scroll(&self, collection: &str, filter: &Filter, limit: usize) -> Result<Vec<Point>> {
        let collections = self.collections.read().await;
        let coll = collections.get(collection).ok_or_else(|| missing(collection))?;
        let mut points: Vec<Point> = coll
            .points
            .values()
            .filter(|p| filter.matches(&p.payload))
            .map(|p| Point {
                id: p.id,
                payload: p.payload.clone(),
                vectors: NamedVectors::default(),
            })
            .collect();
        points.sort_by_key(|p| p.id);
        points.truncate(limit);
        Ok(points)
    }

    async fn set_payload(&self, collection: &str, ids: &[Uuid], fields: Payload) -> Result<()> {
        let mut collections = self.collections.write().await;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        for id in ids {
            if let Some(point) = coll.points.get_mut(id) {
                for (k, v) in &fields {
                    point.payload.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        for id in ids {
            coll.points.remove(id);
        }
        Ok(())
    }
}
