//! Manifest data and the lookup from logical asset paths to backing stores.
mod manifest;
mod path_parts;
mod resolver;

pub use manifest::*;
pub use path_parts::*;
pub use resolver::*;
