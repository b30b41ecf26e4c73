//! # radmem-db
//!
//! Storage layer for radmem.
//!
//! This crate provides:
//! - Connection pool management
//! - A named-vector point store on PostgreSQL + pgvector ([`PgPointStore`])
//!   and an in-memory equivalent ([`MemoryPointStore`])
//! - Typed collections ([`Records`]) and per-entity repositories
//! - Filesystem storage for uploaded bytes
//!
//! ## Example
//!
//! ```rust,ignore
//! use radmem_db::{Database, PoolConfig};
//!
//! let db = Database::connect("postgres://localhost/radmem", 512, &PoolConfig::default()).await?;
//! db.migrate().await?;
//! db.ensure_collections().await?;
//! let scans = db.scans.list_for_patient("patient-1").await?;
//! ```
pub mod chat_sessions;
pub mod file_storage;
pub mod knowledge;
pub mod medical_history;
pub mod memory;
pub mod patients;
pub mod points;
pub mod pool;
pub mod records;
pub mod scans;

use std::sync::Arc;

// Re-export core types
pub use radmem_core::*;

pub use chat_sessions::ChatSessionRepository;
pub use file_storage::{
    compute_content_hash, generate_storage_path, FilesystemBackend, StorageBackend,
};
pub use knowledge::{KnowledgeRepository, PLACEHOLDER_REPORTS};
pub use medical_history::MedicalHistoryRepository;
pub use memory::{cosine_similarity, MemoryPointStore};
pub use patients::PatientRepository;
pub use points::PgPointStore;
pub use pool::{open_pool, PoolConfig};
pub use records::{Records, Scored, Stored};
pub use scans::{ScanRepository, ScanUpdate};

/// Combined storage context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// Connection pool when backed by PostgreSQL.
    pub pool: Option<sqlx::PgPool>,
    /// The underlying point store.
    pub store: Arc<dyn PointStore>,
    /// Patient scans.
    pub scans: ScanRepository,
    /// Verified reference cases.
    pub knowledge: KnowledgeRepository,
    /// Saved chat transcripts.
    pub chat_sessions: ChatSessionRepository,
    /// Medical-history files and folders.
    pub history: MedicalHistoryRepository,
    /// E-mail identity registry.
    pub patients: PatientRepository,
    dimension: usize,
}

impl Database {
    /// Build repositories over any point store.
    pub fn new(store: Arc<dyn PointStore>, dimension: usize) -> Self {
        Self {
            pool: None,
            scans: ScanRepository::new(Records::new(store.clone(), dimension)),
            knowledge: KnowledgeRepository::new(Records::new(store.clone(), dimension)),
            chat_sessions: ChatSessionRepository::new(Records::new(store.clone(), dimension)),
            history: MedicalHistoryRepository::new(Records::new(store.clone(), dimension)),
            patients: PatientRepository::new(Records::new(store.clone(), dimension)),
            store,
            dimension,
        }
    }

    /// Repositories over a fresh in-memory store.
    pub fn in_memory(dimension: usize) -> Self {
        Self::new(Arc::new(MemoryPointStore::new()), dimension)
    }

    /// Connect to PostgreSQL and build repositories over [`PgPointStore`].
    pub async fn connect(url: &str, dimension: usize, config: &PoolConfig) -> Result<Self> {
        let pool = open_pool(url, config).await?;
        let mut db = Self::new(Arc::new(PgPointStore::new(pool.clone())), dimension);
        db.pool = Some(pool);
        Ok(db)
    }

    /// Run pending migrations. No-op for the in-memory store.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        if let Some(pool) = &self.pool {
            sqlx::migrate!("../../migrations")
                .run(pool)
                .await
                .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        }
        Ok(())
    }

    /// Create every collection radmem uses. Idempotent.
    pub async fn ensure_collections(&self) -> Result<()> {
        let d = self.dimension;
        self.store
            .ensure_collection(&Records::<ScanRecord>::new(self.store.clone(), d).spec())
            .await?;
        self.store
            .ensure_collection(&Records::<KnowledgeRecord>::new(self.store.clone(), d).spec())
            .await?;
        self.store
            .ensure_collection(&Records::<ChatSession>::new(self.store.clone(), d).spec())
            .await?;
        self.store
            .ensure_collection(&Records::<HistoryEntry>::new(self.store.clone(), d).spec())
            .await?;
        self.store
            .ensure_collection(&Records::<PatientProfile>::new(self.store.clone(), d).spec())
            .await?;
        Ok(())
    }

    /// Embedding dimension every collection was created with.
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}
