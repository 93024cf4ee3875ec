//! Real-time preview driver.

pub(crate) mod synchronizer;
