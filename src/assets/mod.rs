//! Decodable media: loaders, decoded handles, playheads and the shared resource cache.

pub(crate) mod cache;
pub(crate) mod decode;
pub(crate) mod loader;
pub(crate) mod media;
pub(crate) mod playhead;
pub(crate) mod resource;
