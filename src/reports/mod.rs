//! Return reports built from a period aggregate

pub mod gstr1;
pub mod gstr3b;

pub use gstr1::*;
pub use gstr3b::*;
