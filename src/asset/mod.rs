mod asset;
mod bundles;
mod request;
mod manager;

pub use asset::*;
pub use bundles::*;
pub use request::*;
pub use manager::*;
