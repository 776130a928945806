pub mod config;
pub mod controller;
pub mod executor;
pub mod inventory;

pub use config::*;
pub use controller::*;
pub use executor::*;
pub use inventory::*;
