//! Filing workflow: upload normalization, per-period recalculation and
//! background jobs

pub mod compliance;
pub mod core;
pub mod jobs;
pub mod normalizer;

pub use compliance::*;
pub use self::core::*;
pub use jobs::*;
pub use normalizer::*;
