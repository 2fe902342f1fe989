//! Resource governance
//!
//! Two independent policies bound what the service keeps on hand:
//! - Admission: inputs over the size ceiling are refused before any decode
//! - Retention: a background sweep deletes transient artifacts older than
//!   the retention window
//!
//! The sweep shares nothing with requests except the transient directory.

pub mod admission;
pub mod retention;
pub mod storage;

pub use admission::AdmissionPolicy;
pub use retention::{sweep_expired, RetentionSweeper, SweepHandle, SweepReport};
pub use storage::{TransientArtifact, TransientStore};
