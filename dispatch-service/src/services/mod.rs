//! Services module for dispatch-service.

pub mod database;
pub mod mapping;
pub mod metrics;
pub mod narration;
pub mod release;
pub mod sessions;
pub mod status;
pub mod sync;
pub mod upstream;
pub mod voucher;

pub use database::Database;
pub use mapping::map_unmapped;
pub use metrics::{get_metrics, init_metrics};
pub use release::ReleaseCoordinator;
pub use sessions::Sessions;
pub use sync::{CycleOutcome, CycleSummary, SyncEngine};
pub use upstream::{ConnectionMethod, SourceRouter};
