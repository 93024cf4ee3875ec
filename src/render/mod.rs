//! Frame rendering: surfaces, layer layout, compositing and the shared frame compositor.

pub(crate) mod backend;
pub(crate) mod composite;
pub(crate) mod compositor;
pub(crate) mod layout;
