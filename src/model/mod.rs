//! Timeline data model: media records, items, tracks and the volume table.

pub(crate) mod media;
pub(crate) mod project;
pub(crate) mod timeline;
pub(crate) mod volume;
