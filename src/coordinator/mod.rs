//! Opening detail pages in side contexts and extracting them in batches

pub mod batch;
pub mod policy;

pub use batch::{BatchCoordinator, BatchOutcome};
pub use policy::BatchPolicy;
