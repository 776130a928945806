pub mod filter;
pub mod registry;

pub use filter::*;
pub use registry::*;
