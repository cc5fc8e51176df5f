//! cs-core: stable foundation for cyclesim.
//!
//! Contains:
//! - units (uom SI types + engine-oriented constructors)
//! - numeric (Real + finiteness and sign checks)
//! - ids (compact 1-based IDs derived from construction indices)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
