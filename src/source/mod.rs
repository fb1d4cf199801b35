//! Backing stores that materialize resources, and the capabilities the manager needs from them.
mod source;
mod memory;
mod file;
mod loader;

pub use source::*;
pub use memory::*;
pub use file::*;
pub use loader::*;
