//! Tax computation: jurisdiction rules, per-invoice GST, period aggregation and ITC set-off

pub mod gst;
pub mod jurisdiction;
pub mod setoff;

pub use gst::*;
pub use jurisdiction::*;
pub use setoff::*;
