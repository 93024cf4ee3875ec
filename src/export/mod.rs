//! Frame-exact offline export driver.

pub(crate) mod cancel;
pub(crate) mod encoder;
pub(crate) mod preset;
pub(crate) mod progress;
pub(crate) mod reorder;
