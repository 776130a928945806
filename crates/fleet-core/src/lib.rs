pub mod ids;
pub mod model;
pub mod priority;

pub use ids::*;
pub use model::*;
pub use priority::*;
