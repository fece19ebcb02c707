//! Input tax credit reconciliation against vendor-reported data
//!
//! Inward invoices become ITC claims. Each claim is looked up in the
//! supplier-reported statement (GSTR-2A/2B) by supplier GSTIN and invoice
//! number and marked matched, partial, mismatched or pending. Claims in a
//! blocked category never count towards eligible credit.

pub mod itc;
pub mod statement;

pub use itc::*;
pub use statement::*;
