pub mod contract;
pub mod mirrored;
pub mod repo;
pub mod types;

pub use mirrored::*;
pub use repo::*;
pub use types::*;
