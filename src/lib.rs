mod util;
mod config;
mod asset;
mod manifest;
mod source;

pub use util::*;
pub use config::*;
pub use asset::*;
pub use manifest::*;
pub use source::*;
