//! Effect evaluation and the pixel filters it drives.

pub(crate) mod evaluator;
pub(crate) mod filter;
