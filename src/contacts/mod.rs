//! Contact aggregation: deny-list, signature mining, name handling, and
//! the aggregator that ties them together.

pub mod aggregator;
pub mod denylist;
pub mod names;
pub mod signature;
