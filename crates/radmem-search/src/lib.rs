//! # radmem-search
//!
//! Intent-routed retrieval for radmem.
//!
//! This crate provides:
//! - A deterministic keyword intent classifier
//! - Diagnose, fetch and compare retrieval strategies
//! - A response composer that fails open when generation is unavailable
//! - Scan analysis against the reference case base
//!
//! ## Example
//!
//! ```ignore
//! use radmem_search::{ChatContext, ChatPipeline};
//!
//! let pipeline = ChatPipeline::new(db, embedder, generator);
//! let reply = pipeline
//!     .handle(&ChatContext::new("patient-1", "compare with my previous scan").with_current_scan(scan_id))
//!     .await;
//! ```

pub mod analyze;
pub mod compare;
pub mod composer;
pub mod diagnose;
pub mod fetch;
pub mod intent;
pub mod pipeline;
pub mod prompts;
pub mod strategy;

// Re-export core types
pub use radmem_core::*;

pub use analyze::{ScanAnalysis, ScanAnalyzer, SimilarCase};
pub use compare::CompareStrategy;
pub use composer::ResponseComposer;
pub use diagnose::DiagnoseStrategy;
pub use fetch::FetchStrategy;
pub use intent::classify;
pub use pipeline::ChatPipeline;
pub use strategy::{
    ChatContext, Evidence, EvidenceBody, Prompt, RetrievalConfig, RetrievalStrategy,
    StrategyOutcome,
};
