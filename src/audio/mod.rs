//! Audio routing, mixing and PCM helpers.

pub(crate) mod dynamics;
pub(crate) mod graph;
pub(crate) mod pcm;
