//! # GST Core
//!
//! GST liability computation for Indian businesses: invoice normalization,
//! CGST/SGST/IGST computation, period aggregation by rate slab, input tax
//! credit reconciliation and GSTR-1/GSTR-3B report generation.
//!
//! ## Features
//!
//! - **Normalization**: raw OCR/upload records validated into invoices
//! - **Tax computation**: intra/inter-state split with paisa-exact rounding
//! - **Aggregation**: slab-wise period totals with consistency checks
//! - **ITC reconciliation**: matching against vendor-reported GSTR-2A/2B data
//! - **Reports**: GSTR-1 tables and GSTR-3B with credit set-off
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use gst_core::{FilingPeriod, GstCalculation, GstRateSlab, SupplyType};
//! use bigdecimal::BigDecimal;
//!
//! let calc = GstCalculation::calculate(
//!     BigDecimal::from(100000),
//!     GstRateSlab::Eighteen,
//!     SupplyType::IntraState,
//! );
//! assert_eq!(calc.cgst_amount, BigDecimal::from(9000));
//!
//! let period: FilingPeriod = "2026-01".parse().unwrap();
//! assert_eq!(period.return_period(), "012026");
//! ```

pub mod config;
pub mod filing;
pub mod reconciliation;
pub mod reports;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::EngineConfig;
pub use filing::*;
pub use reconciliation::*;
pub use reports::*;
pub use tax::*;
pub use traits::*;
pub use types::*;
