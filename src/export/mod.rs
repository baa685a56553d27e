//! Report output.

pub mod report;
