//! Service layer for radmem-api.
//!
//! Services own the multi-step workflows behind the handlers and undo
//! partial work when a later step fails.

pub mod history;
pub mod ingestion;
pub mod scans;

pub use history::{HistoryDownload, HistoryFileUpload, HistoryListing, HistoryService};
pub use ingestion::{IngestionService, ScanUpload, ServedFile};
pub use scans::{ScanService, TimelineEntry};
