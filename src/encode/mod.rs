//! Frame sinks consuming export output in timeline order.

pub(crate) mod ffmpeg;
pub(crate) mod sink;
